//! # Project Data Structures
//!
//! The `Project` struct is the root container for estimation data. A project
//! holds one or more scenarios; each scenario owns its confirmed intake
//! record (UPIF) and the stored result documents computed from it.
//!
//! ## Structure
//!
//! ```text
//! Project
//! ├── meta: ProjectMetadata (version, engineer, job info, timestamps)
//! ├── settings: GlobalSettings (default output spec)
//! └── scenarios: HashMap<Uuid, Scenario>
//!     ├── inputs: ProjectInputs (project type, feedstocks, interconnect)
//!     ├── mass_balance: Option<StoredResult<MassBalanceResult>>
//!     ├── capex: Option<StoredResult<CapexResult>>
//!     └── opex: Option<StoredResult<OpexResult>>
//! ```
//!
//! Result documents are replaced wholesale on every recalculation. The
//! override set stored next to each one survives and is re-applied. A
//! document the last recalculation could not reproduce is kept, with its
//! overrides, but marked stale.
//!
//! ## Example
//!
//! ```rust
//! use adcalc_core::project::{FeedstockEntry, Project, ProjectInputs, ProjectType, Scenario};
//!
//! let mut project = Project::new("Jane Engineer", "25-042", "County Organics");
//! let inputs = ProjectInputs::new(ProjectType::Greenfield)
//!     .with_feedstock(FeedstockEntry::new("Food Waste", "100", "tons/day"));
//! let id = project.add_scenario(Scenario::new("Base case", inputs));
//! assert!(project.scenario(&id).is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculations::{capex, mass_balance, opex, CapexResult, MassBalanceResult, OpexResult};
use crate::config::EngineConfig;
use crate::errors::{CalcError, CalcResult};
use crate::library::output_specs::DEFAULT_GAS_SPEC;
use crate::library::{PropertySpec, ReferenceLibrary};
use crate::overrides::{regenerate, OverrideSet, RecomputableResult};

/// Current schema version for saved project documents
pub const SCHEMA_VERSION: &str = "0.1.0";

// ============================================================================
// Project Type
// ============================================================================

/// Project type tag carried by the intake record.
///
/// Serialized as its single-letter code; parsing accepts the code or a
/// descriptive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProjectType {
    /// Type A: municipal wastewater treatment
    WastewaterTreatment,
    /// Type B: greenfield RNG from organic feedstocks
    Greenfield,
    /// Type C: RNG upgrading bolted onto an existing biogas source
    BoltOn,
    /// Type D: hybrid co-digestion at an existing facility
    Hybrid,
}

impl ProjectType {
    pub const ALL: [ProjectType; 4] = [
        ProjectType::WastewaterTreatment,
        ProjectType::Greenfield,
        ProjectType::BoltOn,
        ProjectType::Hybrid,
    ];

    /// Single-letter code
    pub fn code(&self) -> &'static str {
        match self {
            ProjectType::WastewaterTreatment => "A",
            ProjectType::Greenfield => "B",
            ProjectType::BoltOn => "C",
            ProjectType::Hybrid => "D",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProjectType::WastewaterTreatment => "Wastewater Treatment",
            ProjectType::Greenfield => "Greenfield RNG",
            ProjectType::BoltOn => "RNG Bolt-On",
            ProjectType::Hybrid => "Hybrid Co-Digestion",
        }
    }

    /// Feed is existing biogas rather than organic solids
    pub fn is_gas_only(&self) -> bool {
        matches!(self, ProjectType::BoltOn)
    }

    /// Parse from a code or common name (case-insensitive)
    pub fn from_str_flexible(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match normalized.as_str() {
            "a" | "typea" | "wastewater" | "wastewatertreatment" | "wwtp" => Some(ProjectType::WastewaterTreatment),
            "b" | "typeb" | "greenfield" | "greenfieldrng" => Some(ProjectType::Greenfield),
            "c" | "typec" | "bolton" | "rngbolton" | "upgrading" => Some(ProjectType::BoltOn),
            "d" | "typed" | "hybrid" | "codigestion" | "hybridcodigestion" => Some(ProjectType::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type {} ({})", self.code(), self.display_name())
    }
}

impl TryFrom<String> for ProjectType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProjectType::from_str_flexible(&value).ok_or_else(|| format!("unknown project type '{}'", value))
    }
}

impl From<ProjectType> for String {
    fn from(value: ProjectType) -> Self {
        value.code().to_string()
    }
}

// ============================================================================
// Intake Record (UPIF)
// ============================================================================

/// One confirmed feedstock (or, for bolt-on projects, biogas source).
///
/// ## JSON Example
///
/// ```json
/// {
///   "name": "County food scraps",
///   "feedstock_type": "post-consumer food waste",
///   "quantity": "350 tons/week",
///   "unit": "",
///   "properties": {
///     "Total Solids (%)": { "value": 22.0, "unit": "%" }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedstockEntry {
    pub name: String,

    /// Free-text material type used to match a library profile
    #[serde(default)]
    pub feedstock_type: String,

    /// Quantity string; may carry its own unit ("50 tons/week")
    pub quantity: String,

    #[serde(default)]
    pub unit: String,

    /// User- or AI-supplied properties keyed by their original labels
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
}

impl FeedstockEntry {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>, unit: impl Into<String>) -> Self {
        FeedstockEntry {
            name: name.into(),
            feedstock_type: String::new(),
            quantity: quantity.into(),
            unit: unit.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, feedstock_type: impl Into<String>) -> Self {
        self.feedstock_type = feedstock_type.into();
        self
    }

    pub fn with_property(mut self, label: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(label.into(), spec);
        self
    }

    /// Text used for profile matching: the type when given, else the name
    pub fn match_text(&self) -> &str {
        if self.feedstock_type.trim().is_empty() {
            &self.name
        } else {
            &self.feedstock_type
        }
    }
}

/// Confirmed project intake record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInputs {
    pub project_type: ProjectType,

    #[serde(default)]
    pub feedstocks: Vec<FeedstockEntry>,

    /// Pipeline lateral length to the utility interconnect
    #[serde(default)]
    pub interconnect_distance_miles: Option<f64>,

    /// Output spec name; defaults to pipeline RNG
    #[serde(default)]
    pub output_spec: Option<String>,
}

impl ProjectInputs {
    pub fn new(project_type: ProjectType) -> Self {
        ProjectInputs {
            project_type,
            feedstocks: Vec::new(),
            interconnect_distance_miles: None,
            output_spec: None,
        }
    }

    pub fn with_feedstock(mut self, entry: FeedstockEntry) -> Self {
        self.feedstocks.push(entry);
        self
    }

    pub fn output_spec_name(&self) -> &str {
        self.output_spec.as_deref().unwrap_or(DEFAULT_GAS_SPEC)
    }

    /// Name `spec` as the output spec unless one is already named
    pub fn or_output_spec(mut self, spec: &str) -> Self {
        if self.output_spec.is_none() {
            self.output_spec = Some(spec.to_string());
        }
        self
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// A result document with the user overrides that apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult<T> {
    pub result: T,
    #[serde(default)]
    pub overrides: OverrideSet,
    /// Computed from inputs that have since changed; a recalculation failed
    /// before this document could be replaced
    #[serde(default)]
    pub stale: bool,
}

impl<T> StoredResult<T> {
    pub fn new(result: T) -> Self {
        StoredResult {
            result,
            overrides: OverrideSet::default(),
            stale: false,
        }
    }

    /// The result, unless it is stale
    pub fn current(&self) -> Option<&T> {
        (!self.stale).then_some(&self.result)
    }
}

/// Store a freshly computed result, re-applying any locked overrides.
///
/// The slot is untouched when regeneration fails.
fn store_regenerated<T: RecomputableResult>(slot: &mut Option<StoredResult<T>>, fresh: T) -> CalcResult<&T> {
    let mut overrides = slot.as_ref().map(|s| s.overrides.clone()).unwrap_or_default();
    let result = regenerate(fresh, &mut overrides)?;
    let stored = slot.insert(StoredResult {
        result,
        overrides,
        stale: false,
    });
    Ok(&stored.result)
}

fn mark_stale<T>(slot: &mut Option<StoredResult<T>>) {
    if let Some(stored) = slot {
        stored.stale = true;
    }
}

/// One estimation scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    pub inputs: ProjectInputs,
    #[serde(default)]
    pub mass_balance: Option<StoredResult<MassBalanceResult>>,
    #[serde(default)]
    pub capex: Option<StoredResult<CapexResult>>,
    #[serde(default)]
    pub opex: Option<StoredResult<OpexResult>>,
}

impl Scenario {
    pub fn new(label: impl Into<String>, inputs: ProjectInputs) -> Self {
        Scenario {
            label: label.into(),
            inputs,
            mass_balance: None,
            capex: None,
            opex: None,
        }
    }

    /// Recompute mass balance, capital cost and operating cost in order.
    ///
    /// Each downstream calculator reads the upstream result after its locked
    /// overrides are re-applied. On failure, results already recomputed in
    /// this call are kept and every later one is marked stale.
    pub fn recalculate(&mut self, library: &ReferenceLibrary, config: &EngineConfig) -> CalcResult<()> {
        let inputs = self.inputs.clone();
        self.recalculate_from(&inputs, library, config)
    }

    fn recalculate_from(
        &mut self,
        inputs: &ProjectInputs,
        library: &ReferenceLibrary,
        config: &EngineConfig,
    ) -> CalcResult<()> {
        mark_stale(&mut self.mass_balance);
        mark_stale(&mut self.capex);
        mark_stale(&mut self.opex);

        let outcome = self.run_calculators(inputs, library, config);
        if let Err(e) = &outcome {
            warn!(scenario = %self.label, error = %e, "recalculation failed; later results marked stale");
        }
        outcome
    }

    fn run_calculators(
        &mut self,
        inputs: &ProjectInputs,
        library: &ReferenceLibrary,
        config: &EngineConfig,
    ) -> CalcResult<()> {
        let fresh = mass_balance::calculate(inputs, library, &config.design)?;
        let mb = store_regenerated(&mut self.mass_balance, fresh)?.clone();

        let fresh = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex)?;
        let cx = store_regenerated(&mut self.capex, fresh)?.clone();

        let fresh = opex::calculate(&mb, &cx, &config.opex)?;
        let ox = store_regenerated(&mut self.opex, fresh)?;

        info!(
            scenario = %self.label,
            total_project_cost = cx.summary.total_project_cost,
            net_annual_opex = ox.summary.net_annual_opex,
            "scenario recalculated"
        );
        Ok(())
    }

    pub fn current_mass_balance(&self) -> Option<&MassBalanceResult> {
        self.mass_balance.as_ref().and_then(StoredResult::current)
    }

    pub fn current_capex(&self) -> Option<&CapexResult> {
        self.capex.as_ref().and_then(StoredResult::current)
    }

    pub fn current_opex(&self) -> Option<&OpexResult> {
        self.opex.as_ref().and_then(StoredResult::current)
    }
}

// ============================================================================
// Project
// ============================================================================

/// Root project container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub meta: ProjectMetadata,
    pub settings: GlobalSettings,
    /// Scenarios keyed by UUID
    pub scenarios: HashMap<Uuid, Scenario>,
}

impl Project {
    /// Create a new empty project.
    ///
    /// ```rust
    /// use adcalc_core::project::Project;
    ///
    /// let project = Project::new("John Doe", "25-001", "Client Corp");
    /// assert_eq!(project.meta.engineer, "John Doe");
    /// ```
    pub fn new(engineer: impl Into<String>, job_id: impl Into<String>, client: impl Into<String>) -> Self {
        let now = Utc::now();
        Project {
            meta: ProjectMetadata {
                version: SCHEMA_VERSION.to_string(),
                engineer: engineer.into(),
                job_id: job_id.into(),
                client: client.into(),
                created: now,
                modified: now,
            },
            settings: GlobalSettings::default(),
            scenarios: HashMap::new(),
        }
    }

    /// Add a scenario and return its id.
    pub fn add_scenario(&mut self, scenario: Scenario) -> Uuid {
        let id = Uuid::new_v4();
        self.scenarios.insert(id, scenario);
        self.touch();
        id
    }

    pub fn remove_scenario(&mut self, id: &Uuid) -> Option<Scenario> {
        let scenario = self.scenarios.remove(id);
        if scenario.is_some() {
            self.touch();
        }
        scenario
    }

    pub fn scenario(&self, id: &Uuid) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    /// Mutable access marks the project as modified.
    pub fn scenario_mut(&mut self, id: &Uuid) -> Option<&mut Scenario> {
        if self.scenarios.contains_key(id) {
            self.meta.modified = Utc::now();
            self.scenarios.get_mut(id)
        } else {
            None
        }
    }

    /// Recalculate one scenario; a scenario that names no output spec uses
    /// the project's default.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an unknown id, otherwise whatever
    /// [`Scenario::recalculate`] returns.
    pub fn recalculate_scenario(
        &mut self,
        id: &Uuid,
        library: &ReferenceLibrary,
        config: &EngineConfig,
    ) -> CalcResult<()> {
        let default_spec = self.settings.default_output_spec.clone();
        let scenario = self
            .scenario_mut(id)
            .ok_or_else(|| CalcError::invalid_input("scenario", id.to_string(), "no such scenario"))?;
        let inputs = scenario.inputs.clone().or_output_spec(&default_spec);
        scenario.recalculate_from(&inputs, library, config)
    }

    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }

    pub fn scenario_count(&self) -> usize {
        self.scenarios.len()
    }
}

impl Default for Project {
    fn default() -> Self {
        Project::new("", "", "")
    }
}

/// Project metadata stored in the document header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,
    pub engineer: String,
    pub job_id: String,
    pub client: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Global project settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Output spec applied by [`Project::recalculate_scenario`] when a
    /// scenario does not name one
    pub default_output_spec: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            default_output_spec: DEFAULT_GAS_SPEC.to_string(),
        }
    }
}
