//! Cost tier lookup and interpolation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CapexTier;
use crate::errors::{CalcError, CalcResult};

/// Where the driver fell relative to the tier breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierPosition {
    /// Driver equals a breakpoint
    Exact,
    /// Strictly between two breakpoints
    Interpolated { lower_scfm: f64, upper_scfm: f64 },
    /// Below the smallest tier; smallest tier applied unscaled
    BelowRange { min_scfm: f64 },
}

/// Tier costs to use for a given driver.
#[derive(Debug, Clone, PartialEq)]
pub struct TierSelection {
    pub tier: CapexTier,
    pub position: TierPosition,
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Linear interpolation of every cost component between two tiers.
pub fn interpolate(lower: &CapexTier, upper: &CapexTier, scfm: f64) -> CapexTier {
    let span = upper.scfm - lower.scfm;
    let t = if span > 0.0 { (scfm - lower.scfm) / span } else { 0.0 };
    CapexTier {
        scfm,
        major_equipment: lerp(lower.major_equipment, upper.major_equipment, t),
        engineering: lerp(lower.engineering, upper.engineering, t),
        civil_structural: lerp(lower.civil_structural, upper.civil_structural, t),
        process_piping: lerp(lower.process_piping, upper.process_piping, t),
        electrical: lerp(lower.electrical, upper.electrical, t),
        instrumentation_controls: lerp(lower.instrumentation_controls, upper.instrumentation_controls, t),
        non_process: lerp(lower.non_process, upper.non_process, t),
    }
}

/// Pick or interpolate the tier for `scfm`.
///
/// `tiers` must be sorted by ascending `scfm`.
///
/// # Errors
///
/// - `CapacityExceeded` above the largest tier
/// - `InvalidInput` for an empty table or a non-finite driver
pub fn select_tier(tiers: &[CapexTier], scfm: f64) -> CalcResult<TierSelection> {
    if !scfm.is_finite() || scfm < 0.0 {
        return Err(CalcError::invalid_input(
            "sizingDriver",
            scfm.to_string(),
            "must be a finite, non-negative flow",
        ));
    }
    let (first, last) = match (tiers.first(), tiers.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CalcError::invalid_input("capex.tiers", "[]", "cost table is empty")),
    };

    if scfm > last.scfm {
        warn!(scfm, max_scfm = last.scfm, "sizing driver above cost table");
        return Err(CalcError::capacity_exceeded("Biogas flow", scfm, "SCFM", last.scfm));
    }
    if scfm < first.scfm {
        return Ok(TierSelection {
            tier: first.clone(),
            position: TierPosition::BelowRange { min_scfm: first.scfm },
        });
    }
    if let Some(exact) = tiers.iter().find(|t| t.scfm == scfm) {
        return Ok(TierSelection {
            tier: exact.clone(),
            position: TierPosition::Exact,
        });
    }

    for pair in tiers.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        if scfm > lower.scfm && scfm < upper.scfm {
            return Ok(TierSelection {
                tier: interpolate(lower, upper, scfm),
                position: TierPosition::Interpolated {
                    lower_scfm: lower.scfm,
                    upper_scfm: upper.scfm,
                },
            });
        }
    }
    Err(CalcError::invalid_input(
        "capex.tiers",
        format!("{} tiers", tiers.len()),
        "tiers are not sorted by ascending scfm",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapexConfig;

    fn tiers() -> Vec<CapexTier> {
        CapexConfig::default().tiers
    }

    #[test]
    fn test_exact_breakpoint_unchanged() {
        let table = tiers();
        let sel = select_tier(&table, 400.0).unwrap();
        assert_eq!(sel.position, TierPosition::Exact);
        assert_eq!(sel.tier, table[0]);
    }

    #[test]
    fn test_midpoint_interpolation() {
        let table = tiers();
        let sel = select_tier(&table, 600.0).unwrap();
        assert_eq!(
            sel.position,
            TierPosition::Interpolated {
                lower_scfm: 400.0,
                upper_scfm: 800.0
            }
        );
        assert!((sel.tier.major_equipment - 6_000_000.0).abs() < 1e-6);
        assert!((sel.tier.engineering - 775_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_below_range_uses_smallest_tier() {
        let table = tiers();
        let sel = select_tier(&table, 150.0).unwrap();
        assert_eq!(sel.position, TierPosition::BelowRange { min_scfm: 400.0 });
        assert_eq!(sel.tier.major_equipment, table[0].major_equipment);
    }

    #[test]
    fn test_above_range_is_capacity_exceeded() {
        let err = select_tier(&tiers(), 1_500.0).unwrap_err();
        assert_eq!(err.error_code(), "CAPACITY_EXCEEDED");
    }

    #[test]
    fn test_top_breakpoint_is_exact() {
        let sel = select_tier(&tiers(), 1_200.0).unwrap();
        assert_eq!(sel.position, TierPosition::Exact);
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(select_tier(&[], 500.0).unwrap_err().error_code(), "INVALID_INPUT");
    }
}
