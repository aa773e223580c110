//! # Operating Cost
//!
//! Annual operating cost built from the mass balance summary and the capital
//! estimate. Every line item carries its quantity, unit and unit cost so an
//! edited rate can be traced back to the figure it produced.
//!
//! Revenue offsets (tipping fees) are negative line items. The summary keeps
//! them out of `totalAnnualOpex` and nets them in `netAnnualOpex`.
//!
//! Missing summary keys count as zero: a bolt-on project has no feed, cake
//! or polymer, so those items are simply not generated.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calculations::capex::CapexResult;
use crate::calculations::mass_balance::MassBalanceResult;
use crate::calculations::{ensure_supported, slug_id, Assumption};
use crate::config::OpexConfig;
use crate::errors::{CalcResult, CalcWarning};
use crate::project::ProjectType;
use crate::units::MINUTES_PER_DAY;

// ============================================================================
// Line Items
// ============================================================================

/// Operating cost category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpexCategory {
    Labor,
    Energy,
    Chemical,
    Maintenance,
    Disposal,
    RevenueOffset,
    Other,
}

impl OpexCategory {
    pub const ALL: [OpexCategory; 7] = [
        OpexCategory::Labor,
        OpexCategory::Energy,
        OpexCategory::Chemical,
        OpexCategory::Maintenance,
        OpexCategory::Disposal,
        OpexCategory::RevenueOffset,
        OpexCategory::Other,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            OpexCategory::Labor => "Labor",
            OpexCategory::Energy => "Energy",
            OpexCategory::Chemical => "Chemical",
            OpexCategory::Maintenance => "Maintenance",
            OpexCategory::Disposal => "Disposal",
            OpexCategory::RevenueOffset => "Revenue Offsets",
            OpexCategory::Other => "Other",
        }
    }

    pub fn is_offset(&self) -> bool {
        matches!(self, OpexCategory::RevenueOffset)
    }
}

impl fmt::Display for OpexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One annual operating cost entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpexLineItem {
    pub id: String,
    pub category: OpexCategory,
    pub description: String,
    /// USD/yr; negative for revenue offsets
    pub annual_cost: f64,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub basis: String,
    pub source: String,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub is_locked: bool,
}

impl OpexLineItem {
    fn new(category: OpexCategory, description: &str, quantity: f64, unit: &str, unit_cost: f64) -> Self {
        OpexLineItem {
            id: slug_id(category.display_name(), description),
            category,
            description: description.to_string(),
            annual_cost: quantity * unit_cost,
            quantity,
            unit: unit.to_string(),
            unit_cost,
            basis: String::new(),
            source: "Engine operating cost rates".to_string(),
            is_overridden: false,
            is_locked: false,
        }
    }

    /// quantity × unit_cost
    pub fn derived_annual_cost(&self) -> f64 {
        self.quantity * self.unit_cost
    }

    fn basis(mut self, basis: impl Into<String>) -> Self {
        self.basis = basis.into();
        self
    }
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpexSummary {
    /// Category display name → annual total
    pub category_totals: BTreeMap<String, f64>,
    /// Costs only, offsets excluded
    pub total_annual_opex: f64,
    /// Sum of offsets (zero or negative)
    pub total_revenue_offsets: f64,
    pub net_annual_opex: f64,
    pub annual_rng_mmbtu: f64,
    /// Net opex per MMBtu of RNG; zero without RNG production
    pub opex_per_mmbtu: f64,
}

/// Re-categorize and sum line items.
///
/// Reads nothing but `items` and `annual_rng_mmbtu`, so calling it twice
/// gives the same summary.
pub fn recompute_opex_summary(items: &[OpexLineItem], annual_rng_mmbtu: f64) -> OpexSummary {
    let mut category_totals: BTreeMap<String, f64> = OpexCategory::ALL
        .iter()
        .map(|c| (c.display_name().to_string(), 0.0))
        .collect();
    let mut total_annual_opex = 0.0;
    let mut total_revenue_offsets = 0.0;

    for item in items {
        *category_totals
            .entry(item.category.display_name().to_string())
            .or_insert(0.0) += item.annual_cost;
        if item.category.is_offset() {
            total_revenue_offsets += item.annual_cost;
        } else {
            total_annual_opex += item.annual_cost;
        }
    }

    let net_annual_opex = total_annual_opex + total_revenue_offsets;
    OpexSummary {
        category_totals,
        total_annual_opex,
        total_revenue_offsets,
        net_annual_opex,
        annual_rng_mmbtu,
        opex_per_mmbtu: if annual_rng_mmbtu > 0.0 {
            net_annual_opex / annual_rng_mmbtu
        } else {
            0.0
        },
    }
}

// ============================================================================
// Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpexResult {
    pub project_type: ProjectType,
    pub line_items: Vec<OpexLineItem>,
    pub summary: OpexSummary,
    pub assumptions: Vec<Assumption>,
    pub warnings: Vec<CalcWarning>,
    pub cost_year: i32,
    pub currency: String,
    pub methodology: String,
}

impl OpexResult {
    pub fn line_item(&self, id: &str) -> Option<&OpexLineItem> {
        self.line_items.iter().find(|i| i.id == id)
    }

    /// Recompute the summary in place from the current line items
    pub fn recompute_summary(&mut self) {
        self.summary = recompute_opex_summary(&self.line_items, self.summary.annual_rng_mmbtu);
    }
}

/// Estimate annual operating cost.
///
/// # Errors
///
/// - `UnsupportedProjectType` for wastewater (type A) projects
pub fn calculate(
    mass_balance: &MassBalanceResult,
    capex: &CapexResult,
    config: &OpexConfig,
) -> CalcResult<OpexResult> {
    ensure_supported(
        mass_balance.project_type,
        "Operating cost estimate",
        "AI-based operating cost estimation",
    )?;

    let value = |key: &str| mass_balance.summary_value(key).unwrap_or(0.0);
    let days = config.operating_days_per_year;
    let scfm = value("biogasFlowScfm");
    let feed_tpd = value("totalFeedTpd");
    let mut items = Vec::new();
    let mut assumptions = vec![Assumption::new(
        "Operating days",
        format!("{:.0} days/yr", days),
        "Continuous operation",
    )];

    // Labor
    let extra_fte = if config.operator_scfm_per_fte > 0.0 {
        (scfm / config.operator_scfm_per_fte).ceil()
    } else {
        0.0
    };
    let operators = config.operator_base_fte + extra_fte;
    items.push(
        OpexLineItem::new(OpexCategory::Labor, "Plant Operators", operators, "FTE", config.operator_loaded_wage_usd)
            .basis(format!(
                "{:.0} base + 1 per {:.0} SCFM at {:.1} SCFM",
                config.operator_base_fte, config.operator_scfm_per_fte, scfm
            )),
    );
    items.push(
        OpexLineItem::new(
            OpexCategory::Labor,
            "Plant Management",
            config.management_fte,
            "FTE",
            config.management_loaded_wage_usd,
        )
        .basis("Plant manager, loaded wage"),
    );

    // Energy
    let gas_kwh = config.gas_kwh_per_scf * scfm * MINUTES_PER_DAY * days;
    let feed_kwh = config.feed_kwh_per_ton * feed_tpd * days;
    items.push(
        OpexLineItem::new(
            OpexCategory::Energy,
            "Electricity",
            gas_kwh + feed_kwh,
            "kWh/yr",
            config.electricity_usd_per_kwh,
        )
        .basis(format!(
            "{:.4} kWh/scf raw biogas + {:.0} kWh/wet ton feed",
            config.gas_kwh_per_scf, config.feed_kwh_per_ton
        )),
    );

    // Chemicals
    let polymer_lb = value("polymerLbPerDay") * days;
    if polymer_lb > 0.0 {
        items.push(
            OpexLineItem::new(OpexCategory::Chemical, "Dewatering Polymer", polymer_lb, "lb/yr", config.polymer_usd_per_lb)
                .basis("Solids separation polymer demand"),
        );
    }
    let h2s_lb = value("h2sRemovedLbPerDay") * days;
    if h2s_lb > 0.0 {
        items.push(
            OpexLineItem::new(
                OpexCategory::Chemical,
                "H2S Removal Media",
                h2s_lb,
                "lb H2S/yr",
                config.h2s_media_usd_per_lb_removed,
            )
            .basis("Media replacement per lb H2S removed"),
        );
    }

    // Maintenance
    let capex_summary = &capex.summary;
    items.push(
        OpexLineItem::new(
            OpexCategory::Maintenance,
            "Equipment Maintenance",
            capex_summary.total_equipment_cost,
            "USD capex",
            config.maintenance_equipment_rate,
        )
        .basis(format!("{:.1}% of major equipment", config.maintenance_equipment_rate * 100.0)),
    );
    items.push(
        OpexLineItem::new(
            OpexCategory::Maintenance,
            "Facility Maintenance",
            capex_summary.total_construction_directs,
            "USD capex",
            config.maintenance_construction_rate,
        )
        .basis(format!(
            "{:.1}% of construction directs",
            config.maintenance_construction_rate * 100.0
        )),
    );

    // Disposal
    let cake_tons = value("cakeWetTpd") * days;
    if cake_tons > 0.0 {
        items.push(
            OpexLineItem::new(
                OpexCategory::Disposal,
                "Digestate Cake Disposal",
                cake_tons,
                "wet tons/yr",
                config.cake_disposal_usd_per_ton,
            )
            .basis("Hauling and land application"),
        );
    }
    let rejects_tons = value("rejectsTpd") * days;
    if rejects_tons > 0.0 {
        items.push(
            OpexLineItem::new(
                OpexCategory::Disposal,
                "Depackaging Rejects Disposal",
                rejects_tons,
                "tons/yr",
                config.rejects_disposal_usd_per_ton,
            )
            .basis("Landfill tipping for packaging rejects"),
        );
    }

    // Revenue offsets
    let tipping_tons = value("tippingFeedTpd") * days;
    if tipping_tons > 0.0 {
        items.push(
            OpexLineItem::new(
                OpexCategory::RevenueOffset,
                "Tipping Fee Revenue",
                tipping_tons,
                "tons/yr",
                -config.tipping_fee_usd_per_ton,
            )
            .basis("Tipping fees on delivered non-manure feedstock"),
        );
    }

    // Other
    items.push(
        OpexLineItem::new(
            OpexCategory::Other,
            "Property Insurance",
            capex_summary.total_project_cost,
            "USD capex",
            config.insurance_rate_of_capex,
        )
        .basis(format!("{:.2}% of total capital cost", config.insurance_rate_of_capex * 100.0)),
    );
    items.push(
        OpexLineItem::new(OpexCategory::Other, "Laboratory and Testing", 1.0, "lump sum", config.lab_testing_usd)
            .basis("Gas quality and process monitoring"),
    );

    let annual_rng_mmbtu = value("rngMmbtuPerDay") * days;
    let mut warnings = Vec::new();
    if annual_rng_mmbtu <= 0.0 {
        warnings.push(CalcWarning::warning(
            "summary.opexPerMmbtu",
            "No RNG production in the mass balance; cost per MMBtu reported as zero",
        ));
    }
    if mass_balance.summary_value("biogasFlowScfm").is_none() {
        assumptions.push(Assumption::new("Biogas flow", "0 SCFM", "Not found in mass balance summary"));
    }

    let summary = recompute_opex_summary(&items, annual_rng_mmbtu);
    info!(
        project_type = %mass_balance.project_type,
        line_items = items.len(),
        net_annual_opex = summary.net_annual_opex,
        "opex complete"
    );

    Ok(OpexResult {
        project_type: mass_balance.project_type,
        line_items: items,
        summary,
        assumptions,
        warnings,
        cost_year: capex.cost_year,
        currency: capex.currency.clone(),
        methodology: "Unit-rate operating cost from mass balance quantities and capital cost percentages"
            .to_string(),
    })
}
