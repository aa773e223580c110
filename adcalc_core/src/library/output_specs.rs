//! Output Quality Specifications
//!
//! Product limits the simulator checks its final streams against.

use super::{Profile, ProfileFlags, ProfileKind, SpecLimit};

/// Name of the default product spec for upgraded gas
pub const DEFAULT_GAS_SPEC: &str = "Pipeline RNG";
/// Name of the spec applied to dewatered cake
pub const CAKE_SPEC: &str = "Land-Applied Digestate Cake";
/// Name of the spec applied to polished effluent
pub const EFFLUENT_SPEC: &str = "Sewer Discharge Effluent";

fn spec(name: &str, aliases: &[&str], description: &str, limits: Vec<SpecLimit>) -> Profile {
    Profile {
        name: name.to_string(),
        kind: ProfileKind::OutputSpec,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        description: description.to_string(),
        properties: Vec::new(),
        limits,
        flags: ProfileFlags::default(),
    }
}

/// Built-in output specs
pub fn profiles() -> Vec<Profile> {
    const TARIFF: &str = "Typical LDC gas quality tariff (e.g. SoCalGas Rule 30)";
    const SAE: &str = "SAE J1616 Recommended Practice for CNG Vehicle Fuel";
    const EPA503: &str = "40 CFR Part 503 / state land application guidance";
    const PRETREATMENT: &str = "Typical municipal industrial pretreatment ordinance";

    vec![
        spec(
            DEFAULT_GAS_SPEC,
            &["pipeline quality", "pipeline injection", "renewable natural gas", "rng", "pipeline"],
            "Utility pipeline injection quality",
            vec![
                SpecLimit::min("ch4", 96.0, "%", TARIFF),
                SpecLimit::max("co2", 2.0, "%", TARIFF),
                SpecLimit::max("h2s", 4.0, "ppmv", TARIFF),
                SpecLimit::max("o2", 0.2, "%", TARIFF),
                SpecLimit::min("heating_value", 970.0, "Btu/scf", TARIFF),
            ],
        ),
        spec(
            "CNG Vehicle Fuel",
            &["cng", "vehicle fuel", "rcng", "compressed natural gas"],
            "On-site compressed natural gas fueling",
            vec![
                SpecLimit::min("ch4", 90.0, "%", SAE),
                SpecLimit::max("h2s", 16.0, "ppmv", SAE),
                SpecLimit::min("heating_value", 910.0, "Btu/scf", SAE),
            ],
        ),
        spec(
            CAKE_SPEC,
            &["digestate cake", "land application", "class b biosolids", "digestate"],
            "Dewatered digestate for land application",
            vec![SpecLimit::min("total_solids", 20.0, "%", EPA503)],
        ),
        spec(
            EFFLUENT_SPEC,
            &["sewer discharge", "indirect discharge", "pretreatment", "effluent"],
            "Polished liquid discharged to a municipal sewer",
            vec![
                SpecLimit::max("cod", 3_000.0, "mg/L", PRETREATMENT),
                SpecLimit::max("tss", 1_500.0, "mg/L", PRETREATMENT),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_spec_limits() {
        let all = profiles();
        let pipeline = all.iter().find(|p| p.name == DEFAULT_GAS_SPEC).unwrap();
        assert_eq!(pipeline.limit("h2s").unwrap().value, 4.0);
        assert!(pipeline.limit("ch4").unwrap().is_met(97.0));
    }

    #[test]
    fn test_named_specs_exist() {
        let names: Vec<String> = profiles().into_iter().map(|p| p.name).collect();
        assert!(names.contains(&CAKE_SPEC.to_string()));
        assert!(names.contains(&EFFLUENT_SPEC.to_string()));
    }
}
