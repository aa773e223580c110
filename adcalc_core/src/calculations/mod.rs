//! # Calculations
//!
//! The three calculators of the engine. Each follows the pattern:
//!
//! - inputs are borrowed, never mutated
//! - `*Result` is a complete JSON-serializable document (camelCase fields)
//! - `calculate(..) -> CalcResult<*Result>` is a pure, single-pass function
//!
//! ## Available Calculations
//!
//! - [`mass_balance`] - Feedstock blending, stage pipeline and equipment list
//! - [`capex`] - Tiered capital cost estimate sized on biogas flow
//! - [`opex`] - Annual operating cost from mass balance and capital outputs
//!
//! Calculators chain: capex reads the mass balance summary, opex reads both.

pub mod capex;
pub mod mass_balance;
pub mod opex;

use serde::{Deserialize, Serialize};

use crate::errors::CalcError;
use crate::project::ProjectType;

pub use capex::{CapexCategory, CapexLineItem, CapexResult, CapexSummary};
pub use mass_balance::{EquipmentItem, MassBalanceResult, ProcessStage, RecycleStream, StageType};
pub use opex::{OpexCategory, OpexLineItem, OpexResult, OpexSummary};

/// A value the calculator assumed rather than received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumption {
    pub parameter: String,
    pub value: String,
    pub source: String,
}

impl Assumption {
    pub fn new(parameter: impl Into<String>, value: impl Into<String>, source: impl Into<String>) -> Self {
        Assumption {
            parameter: parameter.into(),
            value: value.into(),
            source: source.into(),
        }
    }
}

/// Stable identifier built from an area and a name.
///
/// Ids stay the same across recalculations so override paths such as
/// `lineItems.<id>.totalCost` keep pointing at the same item.
///
/// ```rust
/// use adcalc_core::calculations::slug_id;
///
/// assert_eq!(slug_id("Gas Upgrading", "Membrane Skid #1"), "gas-upgrading-membrane-skid-1");
/// ```
pub fn slug_id(area: &str, name: &str) -> String {
    let joined = format!("{} {}", area, name);
    let mut slug = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Fail for project types the deterministic calculators do not model.
pub(crate) fn ensure_supported(project_type: ProjectType, calculator: &str, alternative: &str) -> Result<(), CalcError> {
    if project_type == ProjectType::WastewaterTreatment {
        return Err(CalcError::unsupported_project_type(
            calculator,
            project_type.to_string(),
            alternative,
        ));
    }
    Ok(())
}
