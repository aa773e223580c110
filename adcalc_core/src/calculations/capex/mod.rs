//! # Capital Cost
//!
//! Tiered capital cost estimate sized on raw biogas flow.
//!
//! ## Method
//!
//! 1. Extract the sizing driver (SCFM) from the mass balance summary
//! 2. Select the cost tier, interpolating linearly between breakpoints
//! 3. Layer costs, each on the running subtotal before it:
//!
//! ```text
//! major equipment
//!   + construction directs (+ general requirements)
//!   + construction management (conditions, permits, insurance, EPC profit)
//!   + interconnect (facility + lateral miles)
//!   = EPC
//!   + commercial (fixed owner fees + % of EPC fees incl. contingency)
//!   + CPI escalation on equipment and construction directs
//!   = total project cost
//! ```
//!
//! Category subtotals always sum to `totalProjectCost`. ITC-eligible cost
//! excludes the utility fee, construction-period operations, fixtures and
//! interconnect.

pub mod driver;
pub mod tiers;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use driver::{extract_sizing_driver, SizingDriver};
pub use tiers::{select_tier, TierPosition, TierSelection};

use crate::calculations::mass_balance::MassBalanceResult;
use crate::calculations::{ensure_supported, slug_id, Assumption};
use crate::config::CapexConfig;
use crate::errors::{CalcResult, CalcWarning};
use crate::project::ProjectType;

const COST_CURVE_SOURCE: &str = "Tiered RNG facility cost curve";

// ============================================================================
// Line Items
// ============================================================================

/// Capital cost category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexCategory {
    Equipment,
    ConstructionDirects,
    ConstructionManagement,
    Interconnect,
    Commercial,
    Escalation,
}

impl CapexCategory {
    pub const ALL: [CapexCategory; 6] = [
        CapexCategory::Equipment,
        CapexCategory::ConstructionDirects,
        CapexCategory::ConstructionManagement,
        CapexCategory::Interconnect,
        CapexCategory::Commercial,
        CapexCategory::Escalation,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            CapexCategory::Equipment => "Equipment",
            CapexCategory::ConstructionDirects => "Construction Directs",
            CapexCategory::ConstructionManagement => "Construction Management",
            CapexCategory::Interconnect => "Interconnect",
            CapexCategory::Commercial => "Commercial",
            CapexCategory::Escalation => "Escalation",
        }
    }

    /// Part of the EPC contract price
    pub fn is_epc(&self) -> bool {
        !matches!(self, CapexCategory::Commercial | CapexCategory::Escalation)
    }
}

impl fmt::Display for CapexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One capital cost entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapexLineItem {
    pub id: String,
    pub category: CapexCategory,
    pub description: String,
    pub base_cost: f64,
    pub installation_factor: f64,
    pub contingency: f64,
    /// [`CapexLineItem::derived_total`] unless edited directly; the only
    /// field the summary reads
    pub total_cost: f64,
    pub basis: String,
    pub source: String,
    pub itc_eligible: bool,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub is_locked: bool,
}

impl CapexLineItem {
    fn new(category: CapexCategory, description: &str, cost: f64, basis: impl Into<String>) -> Self {
        CapexLineItem {
            id: slug_id(category.display_name(), description),
            category,
            description: description.to_string(),
            base_cost: cost,
            installation_factor: 1.0,
            contingency: 0.0,
            total_cost: cost,
            basis: basis.into(),
            source: COST_CURVE_SOURCE.to_string(),
            itc_eligible: true,
            is_overridden: false,
            is_locked: false,
        }
    }

    /// base_cost × installation_factor + contingency
    pub fn derived_total(&self) -> f64 {
        self.base_cost * self.installation_factor + self.contingency
    }

    fn not_itc_eligible(mut self) -> Self {
        self.itc_eligible = false;
        self
    }

    fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

// ============================================================================
// Result
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapexSummary {
    pub total_equipment_cost: f64,
    pub total_construction_directs: f64,
    pub total_construction_management: f64,
    pub total_interconnect: f64,
    pub total_epc_cost: f64,
    pub total_commercial_cost: f64,
    pub escalation_cost: f64,
    pub total_project_cost: f64,
    pub itc_eligible_cost: f64,
    pub cost_per_scfm: f64,
    pub cost_per_unit_basis: String,
    /// Category display name → total
    pub subtotals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapexResult {
    pub project_type: ProjectType,
    pub sizing_driver: SizingDriver,
    pub tier_position: TierPosition,
    pub line_items: Vec<CapexLineItem>,
    pub summary: CapexSummary,
    pub assumptions: Vec<Assumption>,
    pub warnings: Vec<CalcWarning>,
    pub cost_year: i32,
    pub currency: String,
    pub methodology: String,
}

impl CapexResult {
    pub fn line_item(&self, id: &str) -> Option<&CapexLineItem> {
        self.line_items.iter().find(|i| i.id == id)
    }

    pub fn category_total(&self, category: CapexCategory) -> f64 {
        self.line_items
            .iter()
            .filter(|i| i.category == category)
            .map(|i| i.total_cost)
            .sum()
    }
}

/// Re-derive every summary figure from the current line items.
///
/// Percentage layers are not re-applied; an edited line item changes the
/// totals by exactly its own delta.
pub fn recompute_summary(result: &mut CapexResult) {
    let total_of = |c: CapexCategory| result.category_total(c);
    let total_project_cost: f64 = result.line_items.iter().map(|i| i.total_cost).sum();
    let itc_eligible_cost = result
        .line_items
        .iter()
        .filter(|i| i.itc_eligible)
        .map(|i| i.total_cost)
        .sum();
    let total_epc_cost = result
        .line_items
        .iter()
        .filter(|i| i.category.is_epc())
        .map(|i| i.total_cost)
        .sum();
    let subtotals = CapexCategory::ALL
        .iter()
        .map(|c| (c.display_name().to_string(), total_of(*c)))
        .collect();

    let scfm = result.sizing_driver.value;
    let cost_per_scfm = if scfm > 0.0 { total_project_cost / scfm } else { 0.0 };

    let summary = CapexSummary {
        total_equipment_cost: total_of(CapexCategory::Equipment),
        total_construction_directs: total_of(CapexCategory::ConstructionDirects),
        total_construction_management: total_of(CapexCategory::ConstructionManagement),
        total_interconnect: total_of(CapexCategory::Interconnect),
        total_epc_cost,
        total_commercial_cost: total_of(CapexCategory::Commercial),
        escalation_cost: total_of(CapexCategory::Escalation),
        total_project_cost,
        itc_eligible_cost,
        cost_per_scfm,
        cost_per_unit_basis: format!(
            "${:.0} per SCFM of raw biogas capacity ({:.1} SCFM)",
            cost_per_scfm, scfm
        ),
        subtotals,
    };
    result.summary = summary;
}

// ============================================================================
// Calculation
// ============================================================================

/// Estimate capital cost from a mass balance.
///
/// # Errors
///
/// - `UnsupportedProjectType` for wastewater (type A) projects
/// - `SizingDriverNotFound` when the summary has no biogas flow
/// - `CapacityExceeded` above the largest cost tier
pub fn calculate(
    mass_balance: &MassBalanceResult,
    interconnect_miles: Option<f64>,
    config: &CapexConfig,
) -> CalcResult<CapexResult> {
    ensure_supported(
        mass_balance.project_type,
        "Capital cost estimate",
        "AI-based capital cost estimation",
    )?;
    let sizing_driver = extract_sizing_driver(&mass_balance.summary)?;
    let scfm = sizing_driver.value;
    let selection = select_tier(&config.tiers, scfm)?;
    let tier = &selection.tier;
    debug!(scfm, position = ?selection.position, "capex tier selected");

    let mut warnings = Vec::new();
    let mut assumptions = vec![Assumption::new(
        "Sizing driver",
        format!("{:.1} SCFM from '{}'", scfm, sizing_driver.key),
        "Mass balance summary",
    )];
    match selection.position {
        TierPosition::Exact => {}
        TierPosition::Interpolated { lower_scfm, upper_scfm } => warnings.push(CalcWarning::info(
            "sizingDriver",
            format!(
                "Costs interpolated between the {:.0} and {:.0} SCFM tiers for {:.1} SCFM",
                lower_scfm, upper_scfm, scfm
            ),
        )),
        TierPosition::BelowRange { min_scfm } => warnings.push(CalcWarning::info(
            "sizingDriver",
            format!(
                "{:.1} SCFM is below the smallest tier; {:.0} SCFM tier costs applied unscaled",
                scfm, min_scfm
            ),
        )),
    }

    let tier_basis = format!("{:.0} SCFM tier ({} USD)", tier.scfm, config.base_cost_year);
    let mut items = vec![CapexLineItem::new(
        CapexCategory::Equipment,
        "Major Equipment",
        tier.major_equipment,
        tier_basis.clone(),
    )];

    let directs = [
        ("Engineering", tier.engineering),
        ("Civil and Structural", tier.civil_structural),
        ("Process Piping", tier.process_piping),
        ("Electrical", tier.electrical),
        ("Instrumentation and Controls", tier.instrumentation_controls),
        ("Non-Process Buildings and Sitework", tier.non_process),
    ];
    for (name, cost) in directs {
        items.push(CapexLineItem::new(
            CapexCategory::ConstructionDirects,
            name,
            cost,
            tier_basis.clone(),
        ));
    }
    let construction_directs = tier.construction_directs();
    items.push(CapexLineItem::new(
        CapexCategory::ConstructionDirects,
        "General Requirements",
        construction_directs * config.general_requirements_rate,
        format!(
            "{:.1}% of construction directs",
            config.general_requirements_rate * 100.0
        ),
    ));

    let mut running: f64 = items.iter().map(|i| i.total_cost).sum();
    let escalation_base = running;
    let management = [
        ("General Conditions", config.general_conditions_rate),
        ("Permits", config.permits_rate),
        ("Insurance and Bonds", config.insurance_bonds_rate),
        ("EPC Profit", config.epc_profit_rate),
    ];
    for (name, rate) in management {
        let cost = running * rate;
        items.push(CapexLineItem::new(
            CapexCategory::ConstructionManagement,
            name,
            cost,
            format!("{:.1}% of running subtotal", rate * 100.0),
        ));
        running += cost;
    }

    let miles = match interconnect_miles {
        Some(miles) if miles.is_finite() && miles >= 0.0 => miles,
        _ => {
            assumptions.push(Assumption::new(
                "Interconnect distance",
                format!("{:.1} mile lateral", config.default_interconnect_miles),
                "Default when not provided",
            ));
            config.default_interconnect_miles
        }
    };
    items.push(
        CapexLineItem::new(
            CapexCategory::Interconnect,
            "Pipeline Interconnect Facility",
            config.interconnect_facility_usd,
            "Flat allowance for metering, compression and injection",
        )
        .not_itc_eligible(),
    );
    items.push(
        CapexLineItem::new(
            CapexCategory::Interconnect,
            "Pipeline Lateral",
            miles * config.interconnect_pipeline_usd_per_mile,
            format!(
                "{:.1} mi at ${:.0}/mi",
                miles, config.interconnect_pipeline_usd_per_mile
            ),
        )
        .not_itc_eligible(),
    );

    let epc: f64 = items.iter().map(|i| i.total_cost).sum();
    let fixed_owner = [
        ("Utility Connection Fee", config.utility_connection_fee_usd),
        ("Construction-Period Operations", config.construction_period_ops_usd),
        ("Fixtures, Furnishings and Spares", config.fixtures_spares_usd),
    ];
    for (name, cost) in fixed_owner {
        items.push(
            CapexLineItem::new(CapexCategory::Commercial, name, cost, "Fixed owner allowance")
                .not_itc_eligible()
                .source("Owner cost allowances"),
        );
    }
    let epc_fees = [
        ("Development Fee", config.development_fee_rate),
        ("Owner's Contingency", config.owner_contingency_rate),
        ("Financing and Legal", config.financing_legal_rate),
    ];
    for (name, rate) in epc_fees {
        items.push(
            CapexLineItem::new(
                CapexCategory::Commercial,
                name,
                epc * rate,
                format!("{:.1}% of EPC cost", rate * 100.0),
            )
            .source("Owner cost allowances"),
        );
    }

    let escalation = config.escalation_fraction();
    items.push(
        CapexLineItem::new(
            CapexCategory::Escalation,
            "CPI Escalation",
            escalation_base * escalation,
            format!(
                "{:.1}%/yr from {} to {} on equipment and construction directs",
                config.cpi_escalation_rate * 100.0,
                config.base_cost_year,
                config.cost_year
            ),
        )
        .source("Consumer Price Index"),
    );
    assumptions.push(Assumption::new(
        "Cost year",
        format!("{} {}", config.cost_year, config.currency),
        format!("Escalated from {} at {:.1}%/yr", config.base_cost_year, config.cpi_escalation_rate * 100.0),
    ));

    let mut result = CapexResult {
        project_type: mass_balance.project_type,
        sizing_driver,
        tier_position: selection.position,
        line_items: items,
        summary: CapexSummary::default(),
        assumptions,
        warnings,
        cost_year: config.cost_year,
        currency: config.currency.clone(),
        methodology: format!(
            "Tiered cost curve ({} USD) sized on raw biogas flow with percentage indirect layers and CPI escalation",
            config.base_cost_year
        ),
    };
    recompute_summary(&mut result);

    info!(
        project_type = %result.project_type,
        scfm,
        total_project_cost = result.summary.total_project_cost,
        "capex complete"
    );
    Ok(result)
}
