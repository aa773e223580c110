//! Biogas Source Profiles
//!
//! Raw-gas composition of existing biogas sources, used when a project
//! bolts upgrading onto gas that is already being produced.

use super::{Confidence, Profile, ProfileFlags, ProfileKind, PropertyDefault};

const WEF_MOP8: &str = "WEF MOP 8, Design of Water Resource Recovery Facilities (2018)";
const AGSTAR: &str = "EPA AgSTAR Project Development Handbook (2020)";
const LMOP: &str = "EPA LMOP LFG Energy Project Development Handbook (2024)";

/// CH4 %, CO2 %, H2S ppmv, N2 %, O2 %
fn composition(
    ch4: (f64, f64, f64),
    co2: (f64, f64, f64),
    h2s: (f64, f64, f64),
    n2: (f64, f64, f64),
    o2: (f64, f64, f64),
    citation: &str,
) -> Vec<PropertyDefault> {
    [("ch4", ch4), ("co2", co2), ("h2s", h2s), ("n2", n2), ("o2", o2)]
        .into_iter()
        .map(|(key, (typical, min, max))| PropertyDefault::new(key, typical, (min, max), citation, Confidence::Medium))
        .collect()
}

fn source(name: &str, aliases: &[&str], description: &str, properties: Vec<PropertyDefault>) -> Profile {
    Profile {
        name: name.to_string(),
        kind: ProfileKind::BiogasSource,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        description: description.to_string(),
        properties,
        limits: Vec::new(),
        flags: ProfileFlags::default(),
    }
}

/// Built-in biogas source profiles
pub fn profiles() -> Vec<Profile> {
    vec![
        source(
            "Wastewater Digester Gas",
            &["wwtp digester gas", "wastewater biogas", "sewage gas", "digester gas", "wrrf biogas"],
            "Municipal sludge digester gas",
            composition(
                (62.0, 58.0, 68.0),
                (37.0, 32.0, 40.0),
                (500.0, 100.0, 3_000.0),
                (0.5, 0.0, 2.0),
                (0.1, 0.0, 0.5),
                WEF_MOP8,
            ),
        ),
        source(
            "Food Waste Digester Gas",
            &["food waste biogas", "co-digestion gas", "codigestion biogas", "organics digester gas"],
            "Gas from food waste or co-digestion facilities",
            composition(
                (60.0, 55.0, 65.0),
                (39.0, 34.0, 44.0),
                (1_500.0, 300.0, 4_000.0),
                (0.5, 0.0, 2.0),
                (0.2, 0.0, 0.5),
                WEF_MOP8,
            ),
        ),
        source(
            "Dairy Digester Gas",
            &["dairy biogas", "manure biogas", "farm digester gas", "farm biogas"],
            "On-farm manure digester gas",
            composition(
                (58.0, 52.0, 65.0),
                (41.0, 34.0, 46.0),
                (3_000.0, 1_000.0, 6_000.0),
                (0.5, 0.0, 2.0),
                (0.2, 0.0, 1.0),
                AGSTAR,
            ),
        ),
        source(
            "Landfill Gas",
            &["landfill gas", "lfg", "landfill biogas"],
            "Collected landfill gas with air intrusion",
            composition(
                (50.0, 40.0, 60.0),
                (40.0, 30.0, 45.0),
                (200.0, 20.0, 1_500.0),
                (8.0, 2.0, 15.0),
                (1.5, 0.2, 4.0),
                LMOP,
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compositions_sum_near_100() {
        for p in profiles() {
            let sum: f64 = ["ch4", "co2", "n2", "o2"]
                .iter()
                .map(|k| p.property(k).unwrap().typical)
                .sum();
            assert!((sum - 100.0).abs() < 1.0, "{} sums to {}", p.name, sum);
        }
    }
}
