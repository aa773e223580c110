//! Sizing driver extraction.
//!
//! Capital cost is sized on raw biogas flow. The driver is looked up in the
//! mass balance summary by exact key first, then by two heuristics, so a
//! summary produced elsewhere (or hand-edited) still resolves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calculations::mass_balance::StreamParameter;
use crate::errors::{CalcError, CalcResult};
use crate::library::synonyms::normalize_key;
use crate::units::gas_flow_factor;

/// Summary keys tried in order before any heuristic
pub const DRIVER_KEYS: [&str; 3] = ["biogasFlowScfm", "rawBiogasFlowScfm", "biogasFlow"];

/// The scalar the cost tiers are indexed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingDriver {
    /// Summary key the value came from
    pub key: String,
    /// Flow in SCFM
    pub value: f64,
    /// Unit as found in the summary
    pub source_unit: String,
}

/// Flow in SCFM, or `None` when the unit is not a gas flow.
/// A bare number is taken as SCFM.
fn as_scfm(param: &StreamParameter) -> Option<f64> {
    if param.unit.trim().is_empty() {
        return Some(param.value);
    }
    gas_flow_factor(&param.unit).ok().map(|f| param.value * f)
}

fn driver(key: &str, param: &StreamParameter) -> Option<SizingDriver> {
    as_scfm(param)
        .filter(|v| v.is_finite())
        .map(|value| SizingDriver {
            key: key.to_string(),
            value,
            source_unit: param.unit.clone(),
        })
}

/// Find the biogas flow in a mass balance summary.
///
/// Order:
/// 1. keys in [`DRIVER_KEYS`], compared after normalization
/// 2. keys containing `biogas` whose unit mentions `scf`
/// 3. keys containing both `gas` and `flow`
///
/// Within each heuristic the first key in summary order wins.
pub fn extract_sizing_driver(summary: &BTreeMap<String, StreamParameter>) -> CalcResult<SizingDriver> {
    for wanted in DRIVER_KEYS {
        let wanted = normalize_key(wanted);
        let hit = summary
            .iter()
            .filter(|(key, _)| normalize_key(key) == wanted)
            .find_map(|(key, param)| driver(key, param));
        if let Some(found) = hit {
            return Ok(found);
        }
    }

    let by_biogas_unit = summary.iter().find_map(|(key, param)| {
        let normalized = normalize_key(key);
        if normalized.contains("biogas") && param.unit.to_ascii_lowercase().contains("scf") {
            driver(key, param)
        } else {
            None
        }
    });
    if let Some(found) = by_biogas_unit {
        return Ok(found);
    }

    let by_gas_flow = summary.iter().find_map(|(key, param)| {
        let normalized = normalize_key(key);
        if normalized.contains("gas") && normalized.contains("flow") {
            driver(key, param)
        } else {
            None
        }
    });
    by_gas_flow.ok_or_else(|| CalcError::SizingDriverNotFound {
        searched: summary.keys().cloned().collect::<Vec<_>>().join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::QuantityKind;

    fn summary(entries: &[(&str, f64, &str)]) -> BTreeMap<String, StreamParameter> {
        entries
            .iter()
            .map(|(k, v, u)| (k.to_string(), StreamParameter::new(*v, u, QuantityKind::GasFlow)))
            .collect()
    }

    #[test]
    fn test_exact_key_wins() {
        let s = summary(&[("biogasFlowScfm", 600.0, "SCFM"), ("anotherBiogasFlow", 10.0, "SCFM")]);
        let d = extract_sizing_driver(&s).unwrap();
        assert_eq!(d.key, "biogasFlowScfm");
        assert_eq!(d.value, 600.0);
    }

    #[test]
    fn test_priority_order_of_exact_keys() {
        let s = summary(&[("biogasFlow", 900.0, "SCFM"), ("rawBiogasFlowScfm", 500.0, "SCFM")]);
        assert_eq!(extract_sizing_driver(&s).unwrap().key, "rawBiogasFlowScfm");
    }

    #[test]
    fn test_normalized_key_match() {
        let s = summary(&[("biogas_flow_scfm", 450.0, "scfm")]);
        assert_eq!(extract_sizing_driver(&s).unwrap().value, 450.0);
    }

    #[test]
    fn test_scfh_and_scfd_normalized() {
        let s = summary(&[("biogasFlow", 36_000.0, "SCFH")]);
        assert!((extract_sizing_driver(&s).unwrap().value - 600.0).abs() < 1e-9);

        let s = summary(&[("digesterBiogasProduction", 864_000.0, "SCFD")]);
        let d = extract_sizing_driver(&s).unwrap();
        assert_eq!(d.key, "digesterBiogasProduction");
        assert!((d.value - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_gas_flow_heuristic() {
        let s = summary(&[("volumeGal", 1_000.0, "gal"), ("gasFlowRate", 700.0, "")]);
        let d = extract_sizing_driver(&s).unwrap();
        assert_eq!(d.key, "gasFlowRate");
        assert_eq!(d.value, 700.0);
    }

    #[test]
    fn test_non_gas_units_skipped() {
        let s = summary(&[("biogasFlow", 100.0, "tons/day")]);
        let err = extract_sizing_driver(&s).unwrap_err();
        assert_eq!(err.error_code(), "SIZING_DRIVER_NOT_FOUND");
    }

    #[test]
    fn test_missing_driver_lists_keys() {
        let s = summary(&[("totalFeedTpd", 100.0, "tons/day")]);
        match extract_sizing_driver(&s) {
            Err(CalcError::SizingDriverNotFound { searched }) => assert!(searched.contains("totalFeedTpd")),
            other => panic!("expected SizingDriverNotFound, got {:?}", other),
        }
    }
}
