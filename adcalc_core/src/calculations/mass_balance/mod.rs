//! # Mass Balance
//!
//! Blends the confirmed feedstocks into one stream and pushes it through the
//! fixed stage sequence:
//!
//! ```text
//! receiving → [depackaging] → preparation → equalization → digestion
//!     → solids separation → liquid polishing
//!     → gas conditioning → gas upgrading
//! ```
//!
//! Bolt-on projects (type C) skip straight to the gas stages with the
//! blended existing biogas. Wastewater projects (type A) are not modeled.
//!
//! The pipeline is a single forward pass. The DAF float recycle is reported
//! in `recycleStreams` but not fed back, so `convergenceAchieved` is always
//! true after one iteration.
//!
//! A feed with no usable flow is not an error: the result is empty and
//! carries one error-severity warning.
//!
//! ## Example
//!
//! ```rust
//! use adcalc_core::calculations::mass_balance::calculate;
//! use adcalc_core::config::DesignCriteria;
//! use adcalc_core::library::{PropertySpec, ReferenceLibrary};
//! use adcalc_core::project::{FeedstockEntry, ProjectInputs, ProjectType};
//!
//! let inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(
//!     FeedstockEntry::new("Food Waste", "100", "tons/day")
//!         .with_property("Total Solids", PropertySpec::number(15.0, "%"))
//!         .with_property("VS/TS", PropertySpec::number(80.0, "%")),
//! );
//!
//! let result = calculate(&inputs, ReferenceLibrary::builtin(), &DesignCriteria::default()).unwrap();
//! assert_eq!(result.summary_value("tsLoadLbPerDay"), Some(30_000.0));
//! assert_eq!(result.summary_value("vsLoadLbPerDay"), Some(24_000.0));
//! ```

pub mod blend;
pub mod equipment;
pub mod stages;
pub mod stream;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use blend::FeedstockContribution;
pub use equipment::EquipmentItem;
pub use stages::{ProcessStage, RecycleStream, StageType};
pub use stream::{StreamParameter, StreamParameters};

use self::stream::GasStream;
use crate::calculations::{ensure_supported, Assumption};
use crate::config::DesignCriteria;
use crate::errors::{CalcError, CalcResult, CalcWarning};
use crate::library::output_specs::{CAKE_SPEC, EFFLUENT_SPEC};
use crate::library::{Profile, ProfileKind, ReferenceLibrary};
use crate::project::{ProjectInputs, ProjectType};
use crate::units::QuantityKind;

/// Complete mass balance document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassBalanceResult {
    pub project_type: ProjectType,
    pub output_spec: String,
    pub feedstocks: Vec<FeedstockContribution>,
    pub stages: Vec<ProcessStage>,
    pub recycle_streams: Vec<RecycleStream>,
    pub equipment: Vec<EquipmentItem>,
    pub assumptions: Vec<Assumption>,
    pub warnings: Vec<CalcWarning>,
    /// Flat named quantities read by the cost calculators
    pub summary: BTreeMap<String, StreamParameter>,
    pub convergence_achieved: bool,
    pub convergence_iterations: u32,
}

impl MassBalanceResult {
    fn new(project_type: ProjectType, output_spec: &str) -> Self {
        MassBalanceResult {
            project_type,
            output_spec: output_spec.to_string(),
            feedstocks: Vec::new(),
            stages: Vec::new(),
            recycle_streams: Vec::new(),
            equipment: Vec::new(),
            assumptions: Vec::new(),
            warnings: Vec::new(),
            summary: BTreeMap::new(),
            convergence_achieved: true,
            convergence_iterations: 1,
        }
    }

    pub fn summary_value(&self, key: &str) -> Option<f64> {
        self.summary.get(key).map(|p| p.value)
    }

    /// No stage was run (zero usable feed)
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn has_fatal_warning(&self) -> bool {
        self.warnings.iter().any(CalcWarning::is_fatal)
    }

    pub fn stage(&self, stage_type: StageType) -> Option<&ProcessStage> {
        self.stages.iter().find(|s| s.stage_type == stage_type)
    }

    fn push(&mut self, stage: ProcessStage, equipment: Vec<EquipmentItem>) {
        self.stages.push(stage);
        self.equipment.extend(equipment);
    }

    fn put(&mut self, key: &str, value: f64, unit: &str, kind: QuantityKind) {
        self.summary
            .insert(key.to_string(), StreamParameter::new(value, unit, kind));
    }

    fn degrade(mut self, message: &str) -> Self {
        warn!(project_type = %self.project_type, "{}", message);
        self.warnings.push(CalcWarning::error("feedstocks", message));
        self
    }
}

fn output_spec<'a>(library: &'a ReferenceLibrary, name: &str) -> CalcResult<&'a Profile> {
    library
        .profile(name)
        .filter(|p| p.kind == ProfileKind::OutputSpec)
        .ok_or_else(|| CalcError::profile_not_found(name))
}

/// Run the mass balance for a confirmed intake record.
///
/// # Errors
///
/// - `UnsupportedProjectType` for wastewater (type A) projects
/// - `ProfileNotFound` when the named output spec is not in `library`
pub fn calculate(
    inputs: &ProjectInputs,
    library: &ReferenceLibrary,
    criteria: &DesignCriteria,
) -> CalcResult<MassBalanceResult> {
    ensure_supported(inputs.project_type, "Mass balance", "AI-based wastewater mass balance")?;
    let spec = output_spec(library, inputs.output_spec_name())?;
    let result = MassBalanceResult::new(inputs.project_type, &spec.name);

    let result = if inputs.project_type.is_gas_only() {
        gas_pipeline(result, inputs, library, criteria, spec)
    } else {
        organic_pipeline(result, inputs, library, criteria, spec)?
    };

    info!(
        project_type = %result.project_type,
        stages = result.stages.len(),
        equipment = result.equipment.len(),
        warnings = result.warnings.len(),
        biogas_scfm = result.summary_value("biogasFlowScfm").unwrap_or(0.0),
        "mass balance complete"
    );
    Ok(result)
}

fn organic_pipeline(
    mut result: MassBalanceResult,
    inputs: &ProjectInputs,
    library: &ReferenceLibrary,
    criteria: &DesignCriteria,
    spec: &Profile,
) -> CalcResult<MassBalanceResult> {
    let feed = blend::blend_feedstocks(
        &inputs.feedstocks,
        library,
        criteria,
        &mut result.warnings,
        &mut result.assumptions,
    );
    if feed.is_empty() {
        return Ok(result.degrade("No feedstock with a usable flow; mass balance not computed"));
    }

    if feed.c_n_ratio < criteria.c_n_min || feed.c_n_ratio > criteria.c_n_max {
        result.warnings.push(CalcWarning::warning(
            "blend.cNRatio",
            format!(
                "Blended C:N ratio {:.1} is outside the typical {:.0}-{:.0} range",
                feed.c_n_ratio, criteria.c_n_min, criteria.c_n_max
            ),
        ));
    }

    let btu = criteria.btu_per_scf_per_pct_ch4;
    let received = stages::receiving(&feed.stream, &criteria.receiving);
    result.push(received.stage, equipment::receiving(&received.sizing));
    let mut slurry = received.product;

    let mut rejects_tpd = 0.0;
    if feed.packaged.flow.0 > 0.0 {
        let depack = stages::depackaging(&slurry, &feed.packaged, &criteria.receiving);
        result.push(depack.stage, equipment::depackaging(&depack.sizing));
        rejects_tpd = depack.product.rejects.wet.0;
        slurry = depack.product.feed;
    }

    let prepared = stages::preparation(&slurry, &criteria.preparation);
    result.push(prepared.stage, equipment::preparation(&prepared.sizing));
    let dilution_gpd = prepared.sizing.dilution_water.0;

    let equalized = stages::equalization(&prepared.product, &criteria.equalization);
    result.push(equalized.stage, equipment::equalization(&equalized.sizing));

    let digested = stages::digestion(&equalized.product, &criteria.digestion, btu);
    result.push(digested.stage, equipment::digestion(&digested.sizing));
    let digester = &digested.sizing;
    let digestate = digested.product.digestate;
    let biogas = digested.product.biogas;

    let separated = stages::solids_separation(&digestate, &criteria.solids_separation);
    result.push(separated.stage, equipment::solids_separation(&separated.sizing));
    let cake = separated.product.cake;
    let polymer_lb_per_day = separated.sizing.polymer_lb_per_day;
    if let Ok(cake_spec) = output_spec(library, CAKE_SPEC) {
        stages::check_limits(cake_spec, &[("total_solids", cake.ts_pct())], "cake", &mut result.warnings);
    }

    let polished = stages::liquid_polishing(&separated.product.centrate, &criteria.liquid_polishing);
    result.push(polished.stage, equipment::liquid_polishing(&polished.sizing));
    let effluent = polished.product.effluent;
    result.recycle_streams.push(polished.product.recycle.clone());
    if let Ok(effluent_spec) = output_spec(library, EFFLUENT_SPEC) {
        stages::check_limits(
            effluent_spec,
            &[("cod", effluent.cod_mg_l()), ("tss", effluent.tss_mg_l())],
            "effluent",
            &mut result.warnings,
        );
    }

    let rng = run_gas_stages(&mut result, &biogas, criteria, spec);

    result.assumptions.push(Assumption::new(
        "Recycle streams",
        "DAF float reported, not iterated through digestion",
        "Single-pass mass balance",
    ));

    result.put("totalFeedTpd", feed.total_tpd, "tons/day", QuantityKind::MassFlowTpd);
    result.put("tippingFeedTpd", feed.tipping_tpd, "tons/day", QuantityKind::MassFlowTpd);
    result.put("blendedTsPct", feed.ts_pct, "%", QuantityKind::Percent);
    result.put("blendedVsPctOfTs", feed.vs_pct_of_ts, "% of TS", QuantityKind::Percent);
    result.put("blendedBmp", feed.bmp, "m3 CH4/kg VS", QuantityKind::Ratio);
    result.put("blendedCnRatio", feed.c_n_ratio, "ratio", QuantityKind::Ratio);
    result.put("blendedCodMgL", feed.cod_mg_l, "mg/L", QuantityKind::Concentration);
    result.put("blendedTknMgL", feed.tkn_mg_l, "mg/L", QuantityKind::Concentration);
    result.put("blendedTpMgL", feed.tp_mg_l, "mg/L", QuantityKind::Concentration);
    result.put("tsLoadLbPerDay", feed.stream.total_solids.0, "lb/day", QuantityKind::MassLbPerDay);
    result.put("vsLoadLbPerDay", feed.stream.volatile_solids.0, "lb/day", QuantityKind::MassLbPerDay);
    result.put("rejectsTpd", rejects_tpd, "tons/day", QuantityKind::MassFlowTpd);
    result.put("dilutionWaterGpd", dilution_gpd, "gal/day", QuantityKind::LiquidFlow);
    result.put("digesterVsLoadLbPerDay", equalized.product.volatile_solids.0, "lb/day", QuantityKind::MassLbPerDay);
    result.put("vsDestroyedLbPerDay", digester.vs_destroyed.0, "lb/day", QuantityKind::MassLbPerDay);
    result.put("digestateVsLbPerDay", digestate.volatile_solids.0, "lb/day", QuantityKind::MassLbPerDay);
    result.put("digesterCount", f64::from(digester.unit_count), "units", QuantityKind::Count);
    result.put("digesterVolumeGal", digester.total_volume.0, "gal", QuantityKind::Volume);
    result.put("cakeWetTpd", cake.wet.0, "tons/day", QuantityKind::MassFlowTpd);
    result.put("cakeTsPct", cake.ts_pct(), "%", QuantityKind::Percent);
    result.put("polymerLbPerDay", polymer_lb_per_day, "lb/day", QuantityKind::MassLbPerDay);
    result.put("effluentFlowGpd", effluent.flow.0, "gal/day", QuantityKind::LiquidFlow);
    result.put("effluentCodMgL", effluent.cod_mg_l(), "mg/L", QuantityKind::Concentration);
    result.put("effluentTssMgL", effluent.tss_mg_l(), "mg/L", QuantityKind::Concentration);
    result.put("recycleFlowGpd", polished.product.recycle.flow_gpd, "gal/day", QuantityKind::LiquidFlow);
    put_gas_summary(&mut result, &biogas, &rng);

    result.feedstocks = feed.contributions;
    Ok(result)
}

fn gas_pipeline(
    mut result: MassBalanceResult,
    inputs: &ProjectInputs,
    library: &ReferenceLibrary,
    criteria: &DesignCriteria,
    spec: &Profile,
) -> MassBalanceResult {
    let blended = blend::blend_biogas(
        &inputs.feedstocks,
        library,
        criteria,
        &mut result.warnings,
        &mut result.assumptions,
    );
    if blended.is_empty() {
        return result.degrade("No biogas source with a usable flow; mass balance not computed");
    }

    let raw = blended.stream;
    let rng = run_gas_stages(&mut result, &raw, criteria, spec);
    put_gas_summary(&mut result, &raw, &rng);
    result.put("sourceCount", blended.sources.len() as f64, "sources", QuantityKind::Count);
    result
}

/// Gas conditioning then upgrading; returns the product gas.
fn run_gas_stages(
    result: &mut MassBalanceResult,
    raw: &GasStream,
    criteria: &DesignCriteria,
    spec: &Profile,
) -> GasStream {
    let btu = criteria.btu_per_scf_per_pct_ch4;
    let conditioned = stages::gas_conditioning(raw, &criteria.gas_conditioning, btu);
    result.push(conditioned.stage, equipment::gas_conditioning(&conditioned.sizing));
    result.put(
        "h2sRemovedLbPerDay",
        conditioned.sizing.h2s_removed.0,
        "lb/day",
        QuantityKind::MassLbPerDay,
    );

    let upgraded = stages::gas_upgrading(&conditioned.product, &criteria.gas_upgrading, btu);
    result.push(upgraded.stage, equipment::gas_upgrading(&upgraded.sizing));
    result.put("tailGasFlowScfm", upgraded.product.tail_gas.flow.0, "SCFM", QuantityKind::GasFlow);

    let rng = upgraded.product.rng;
    let c = &rng.composition;
    stages::check_limits(
        spec,
        &[
            ("ch4", c.ch4_pct),
            ("co2", c.co2_pct),
            ("h2s", c.h2s_ppmv),
            ("n2", c.n2_pct),
            ("o2", c.o2_pct),
            ("heating_value", rng.btu_per_scf),
        ],
        "rng",
        &mut result.warnings,
    );
    rng
}

fn put_gas_summary(result: &mut MassBalanceResult, raw: &GasStream, rng: &GasStream) {
    result.put("biogasFlowScfm", raw.flow.0, "SCFM", QuantityKind::GasFlow);
    result.put("biogasCh4Pct", raw.composition.ch4_pct, "%", QuantityKind::Percent);
    result.put("biogasH2sPpmv", raw.composition.h2s_ppmv, "ppmv", QuantityKind::Concentration);
    result.put("biogasMmbtuPerDay", raw.energy().0, "MMBtu/day", QuantityKind::Energy);
    result.put("rngFlowScfm", rng.flow.0, "SCFM", QuantityKind::GasFlow);
    result.put("rngCh4Pct", rng.composition.ch4_pct, "%", QuantityKind::Percent);
    result.put("rngHeatingValue", rng.btu_per_scf, "Btu/scf", QuantityKind::HeatingValue);
    result.put("rngMmbtuPerDay", rng.energy().0, "MMBtu/day", QuantityKind::Energy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Severity;
    use crate::library::PropertySpec;
    use crate::project::FeedstockEntry;

    fn run(inputs: &ProjectInputs) -> CalcResult<MassBalanceResult> {
        calculate(inputs, ReferenceLibrary::builtin(), &DesignCriteria::default())
    }

    fn food_waste(tpd: &str) -> FeedstockEntry {
        FeedstockEntry::new("Food Waste", tpd, "tons/day")
            .with_property("Total Solids", PropertySpec::number(15.0, "%"))
            .with_property("VS/TS", PropertySpec::number(80.0, "%"))
    }

    #[test]
    fn test_single_feedstock_example() {
        let inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(food_waste("100"));
        let result = run(&inputs).unwrap();
        assert_eq!(result.summary_value("tsLoadLbPerDay"), Some(30_000.0));
        assert_eq!(result.summary_value("vsLoadLbPerDay"), Some(24_000.0));
        assert_eq!(result.summary_value("vsDestroyedLbPerDay"), Some(14_400.0));
        assert_eq!(result.summary_value("digestateVsLbPerDay"), Some(9_600.0));
        assert!(result.convergence_achieved);
        assert_eq!(result.convergence_iterations, 1);
    }

    #[test]
    fn test_stage_order() {
        let inputs = ProjectInputs::new(ProjectType::Hybrid).with_feedstock(food_waste("100"));
        let order: Vec<StageType> = run(&inputs).unwrap().stages.iter().map(|s| s.stage_type).collect();
        assert_eq!(
            order,
            vec![
                StageType::Receiving,
                StageType::Preparation,
                StageType::Equalization,
                StageType::Digestion,
                StageType::SolidsSeparation,
                StageType::LiquidPolishing,
                StageType::GasConditioning,
                StageType::GasUpgrading,
            ]
        );
    }

    #[test]
    fn test_packaged_feed_adds_depackaging() {
        let inputs = ProjectInputs::new(ProjectType::Greenfield)
            .with_feedstock(food_waste("80"))
            .with_feedstock(FeedstockEntry::new("Expired product", "20", "tons/day").with_type("packaged food"));
        let result = run(&inputs).unwrap();
        assert!(result.stage(StageType::Depackaging).is_some());
        assert_eq!(result.summary_value("rejectsTpd"), Some(4.0));
        assert!(result.equipment.iter().any(|e| e.equipment_type == "Depackaging Unit"));
    }

    #[test]
    fn test_zero_feed_degrades_to_empty_result() {
        let inputs = ProjectInputs::new(ProjectType::Greenfield)
            .with_feedstock(FeedstockEntry::new("Food Waste", "0", "tons/day"));
        let result = run(&inputs).unwrap();
        assert!(result.is_empty());
        assert!(result.has_fatal_warning());
        assert!(result.summary.is_empty());
        // one exclusion warning plus the fatal one
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[1].severity, Severity::Error);
    }

    #[test]
    fn test_wastewater_is_unsupported() {
        let inputs = ProjectInputs::new(ProjectType::WastewaterTreatment).with_feedstock(food_waste("100"));
        let err = run(&inputs).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_PROJECT_TYPE");
    }

    #[test]
    fn test_unknown_output_spec() {
        let mut inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(food_waste("100"));
        inputs.output_spec = Some("Hydrogen".to_string());
        let err = run(&inputs).unwrap_err();
        assert_eq!(err.error_code(), "PROFILE_NOT_FOUND");
    }

    #[test]
    fn test_low_cn_ratio_warns_without_changing_result() {
        let swine = FeedstockEntry::new("Swine Manure", "200", "tons/day");
        let inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(swine);
        let result = run(&inputs).unwrap();
        assert!(result.warnings.iter().any(|w| w.field == "blend.cNRatio"));
        assert!(!result.is_empty());
    }

    #[test]
    fn test_bolt_on_gas_only_pipeline() {
        let inputs = ProjectInputs::new(ProjectType::BoltOn)
            .with_feedstock(FeedstockEntry::new("Dairy Digester Gas", "700", "scfm"));
        let result = run(&inputs).unwrap();
        assert_eq!(result.stages.len(), 2);
        assert_eq!(result.stages[0].stage_type, StageType::GasConditioning);
        assert_eq!(result.summary_value("biogasFlowScfm"), Some(700.0));
        assert!(result.summary_value("rngFlowScfm").unwrap() > 0.0);
        assert!(result.summary_value("totalFeedTpd").is_none());
    }

    #[test]
    fn test_equipment_ids_unique() {
        let inputs = ProjectInputs::new(ProjectType::Greenfield)
            .with_feedstock(food_waste("80"))
            .with_feedstock(FeedstockEntry::new("Expired product", "20", "tons/day").with_type("packaged food"));
        let result = run(&inputs).unwrap();
        let mut ids: Vec<&str> = result.equipment.iter().map(|e| e.id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(food_waste("100"));
        let json = serde_json::to_value(run(&inputs).unwrap()).unwrap();
        assert!(json.get("recycleStreams").is_some());
        assert!(json.get("convergenceAchieved").is_some());
        assert_eq!(json["projectType"], "B");
        assert!(json["equipment"][0].get("isLocked").is_some());
    }
}
