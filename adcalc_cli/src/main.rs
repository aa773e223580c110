//! # adcalc CLI
//!
//! Runs the estimating engine on a project intake file and prints the
//! result documents as JSON on stdout. Logs go to stderr; set `RUST_LOG`
//! or pass `--verbose` for stage-level detail.
//!
//! ```text
//! adcalc run inputs.json
//! adcalc --config site.toml capex inputs.json
//! adcalc match-profile "post-consumer food scraps"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use adcalc_core::calculations::{capex, mass_balance, opex};
use adcalc_core::library::ProfileKind;
use adcalc_core::{CalcError, CalcResult, EngineConfig, ProjectInputs, ReferenceLibrary};

#[derive(Parser)]
#[command(name = "adcalc")]
#[command(about = "Anaerobic digestion and RNG project estimating engine", long_about = None)]
struct Cli {
    /// TOML file overriding design criteria and cost rates
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Blend feedstocks and run the stage pipeline
    MassBalance {
        /// Path to the project inputs JSON file
        inputs: PathBuf,
    },
    /// Mass balance followed by the capital cost estimate
    Capex {
        /// Path to the project inputs JSON file
        inputs: PathBuf,
    },
    /// Mass balance, capital cost, then operating cost
    Opex {
        /// Path to the project inputs JSON file
        inputs: PathBuf,
    },
    /// All three calculators; prints every document
    Run {
        /// Path to the project inputs JSON file
        inputs: PathBuf,
    },
    /// Show which library profile a free-text description matches
    MatchProfile {
        /// Feedstock or gas source description
        text: String,
    },
    /// Print the built-in configuration as TOML
    Defaults,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> CalcResult<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| CalcError::invalid_input("--config", path.display().to_string(), e.to_string()))?;
    let config = toml::from_str(&text).map_err(|e| CalcError::parse_error(path.display().to_string(), e.to_string()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn load_inputs(path: &Path) -> CalcResult<ProjectInputs> {
    let text = fs::read_to_string(path)
        .map_err(|e| CalcError::invalid_input("inputs", path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&text).map_err(CalcError::serialization)
}

fn print_json<T: Serialize>(value: &T) -> CalcResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(CalcError::serialization)?;
    println!("{}", text);
    Ok(())
}

fn cmd_mass_balance(inputs: &Path, config: &EngineConfig) -> CalcResult<()> {
    let inputs = load_inputs(inputs)?;
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design)?;
    print_json(&mb)
}

fn cmd_capex(inputs: &Path, config: &EngineConfig) -> CalcResult<()> {
    let inputs = load_inputs(inputs)?;
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design)?;
    let cx = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex)?;
    print_json(&cx)
}

fn cmd_opex(inputs: &Path, config: &EngineConfig) -> CalcResult<()> {
    let inputs = load_inputs(inputs)?;
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design)?;
    let cx = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex)?;
    let ox = opex::calculate(&mb, &cx, &config.opex)?;
    print_json(&ox)
}

fn cmd_run(inputs: &Path, config: &EngineConfig) -> CalcResult<()> {
    let inputs = load_inputs(inputs)?;
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design)?;
    let cx = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex)?;
    let ox = opex::calculate(&mb, &cx, &config.opex)?;

    eprintln!("Project type:        {}", mb.project_type);
    eprintln!("Stages:              {}", mb.stages.len());
    eprintln!("Equipment items:     {}", mb.equipment.len());
    eprintln!("Biogas:              {:.1} SCFM", cx.sizing_driver.value);
    eprintln!("Total project cost:  ${:.0}", cx.summary.total_project_cost);
    eprintln!("Net annual opex:     ${:.0}", ox.summary.net_annual_opex);
    eprintln!("Warnings:            {}", mb.warnings.len() + cx.warnings.len() + ox.warnings.len());

    print_json(&json!({
        "massBalance": mb,
        "capex": cx,
        "opex": ox,
    }))
}

fn cmd_match_profile(text: &str) -> CalcResult<()> {
    let library = ReferenceLibrary::builtin();
    let matches: Vec<_> = [ProfileKind::Feedstock, ProfileKind::BiogasSource, ProfileKind::OutputSpec]
        .into_iter()
        .filter_map(|kind| library.match_kind(text, kind))
        .map(|p| json!({ "kind": p.kind, "name": p.name, "description": p.description }))
        .collect();
    if matches.is_empty() {
        return Err(CalcError::profile_not_found(text));
    }
    print_json(&matches)
}

fn cmd_defaults() -> CalcResult<()> {
    let text = toml::to_string_pretty(&EngineConfig::default()).map_err(CalcError::serialization)?;
    println!("{}", text);
    Ok(())
}

fn execute(cli: Cli) -> CalcResult<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::MassBalance { inputs } => cmd_mass_balance(&inputs, &config),
        Commands::Capex { inputs } => cmd_capex(&inputs, &config),
        Commands::Opex { inputs } => cmd_opex(&inputs, &config),
        Commands::Run { inputs } => cmd_run(&inputs, &config),
        Commands::MatchProfile { text } => cmd_match_profile(&text),
        Commands::Defaults => cmd_defaults(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(details) = serde_json::to_string(&e) {
                eprintln!("{}", details);
            }
            ExitCode::FAILURE
        }
    }
}
