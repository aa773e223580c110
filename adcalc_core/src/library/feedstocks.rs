//! Feedstock Profiles
//!
//! Typical characteristics of common anaerobic digestion feedstocks.
//! Ranges are as-received values; BMP is per unit of volatile solids added.

use super::{Confidence, Profile, ProfileFlags, ProfileKind, PropertyDefault};

const WEF_MOP8: &str = "WEF MOP 8, Design of Water Resource Recovery Facilities (2018)";
const AGSTAR: &str = "EPA AgSTAR Project Development Handbook (2020)";
const ASABE: &str = "ASABE D384.2 Manure Production and Characteristics";
const LABATUT: &str = "Labatut et al., Bioresource Technology 102 (2011)";
const EPA_FOOD: &str = "EPA Anaerobic Digestion of Food Waste, EPA-R9-WST-06-004";

/// Shorthand for a feedstock's full property set, in synonym-table order:
/// TS %, VS % of TS, BMP m3 CH4/kg VS, C:N, COD mg/L, TKN mg/L, TP mg/L.
#[allow(clippy::too_many_arguments)]
fn properties(
    ts: (f64, f64, f64),
    vs: (f64, f64, f64),
    bmp: (f64, f64, f64),
    c_n: (f64, f64, f64),
    cod: (f64, f64, f64),
    tkn: (f64, f64, f64),
    tp: (f64, f64, f64),
    citation: &str,
    confidence: Confidence,
) -> Vec<PropertyDefault> {
    [
        ("total_solids", ts),
        ("volatile_solids", vs),
        ("bmp", bmp),
        ("c_n_ratio", c_n),
        ("cod", cod),
        ("tkn", tkn),
        ("tp", tp),
    ]
    .into_iter()
    .map(|(key, (typical, min, max))| PropertyDefault::new(key, typical, (min, max), citation, confidence))
    .collect()
}

fn feedstock(
    name: &str,
    aliases: &[&str],
    description: &str,
    properties: Vec<PropertyDefault>,
    flags: ProfileFlags,
) -> Profile {
    Profile {
        name: name.to_string(),
        kind: ProfileKind::Feedstock,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        description: description.to_string(),
        properties,
        limits: Vec::new(),
        flags,
    }
}

const TIPPING: ProfileFlags = ProfileFlags {
    requires_depackaging: false,
    tipping_fee_eligible: true,
};

const ON_FARM: ProfileFlags = ProfileFlags {
    requires_depackaging: false,
    tipping_fee_eligible: false,
};

/// Built-in feedstock profiles
pub fn profiles() -> Vec<Profile> {
    vec![
        feedstock(
            "Food Waste",
            &[
                "food waste",
                "food scraps",
                "post-consumer food",
                "pre-consumer food",
                "source separated organics",
                "source-separated organics",
                "restaurant waste",
                "cafeteria waste",
                "kitchen waste",
                "organic waste",
            ],
            "Unpackaged commercial and institutional food residuals",
            properties(
                (25.0, 15.0, 35.0),
                (90.0, 80.0, 95.0),
                (0.42, 0.35, 0.50),
                (17.0, 14.0, 22.0),
                (250_000.0, 150_000.0, 350_000.0),
                (7_000.0, 4_000.0, 10_000.0),
                (1_000.0, 500.0, 1_500.0),
                EPA_FOOD,
                Confidence::Medium,
            ),
            TIPPING,
        ),
        feedstock(
            "Packaged Food Waste",
            &[
                "packaged food",
                "packaged organics",
                "expired product",
                "off-spec product",
                "grocery waste",
                "retail food waste",
                "contaminated food waste",
                "depackaging",
            ],
            "Retail and distribution food waste still in packaging",
            properties(
                (22.0, 12.0, 35.0),
                (88.0, 75.0, 95.0),
                (0.40, 0.30, 0.50),
                (18.0, 14.0, 25.0),
                (220_000.0, 120_000.0, 320_000.0),
                (6_000.0, 3_000.0, 9_000.0),
                (900.0, 400.0, 1_400.0),
                EPA_FOOD,
                Confidence::Low,
            ),
            ProfileFlags {
                requires_depackaging: true,
                tipping_fee_eligible: true,
            },
        ),
        feedstock(
            "Fats, Oils and Grease",
            &[
                "fog",
                "fats oils and grease",
                "fats oils grease",
                "grease trap",
                "grease trap waste",
                "brown grease",
                "yellow grease",
                "used cooking oil",
                "grease",
            ],
            "Grease trap and interceptor pumpings, rendered cooking oils",
            properties(
                (15.0, 3.0, 40.0),
                (92.0, 85.0, 98.0),
                (0.85, 0.60, 1.00),
                (35.0, 20.0, 70.0),
                (300_000.0, 100_000.0, 600_000.0),
                (2_000.0, 500.0, 5_000.0),
                (300.0, 50.0, 800.0),
                WEF_MOP8,
                Confidence::Low,
            ),
            TIPPING,
        ),
        feedstock(
            "Dairy Manure",
            &["dairy manure", "cow manure", "cattle manure", "bovine manure", "dairy"],
            "Scraped or flushed lactating-cow manure",
            properties(
                (12.0, 8.0, 15.0),
                (82.0, 75.0, 88.0),
                (0.20, 0.15, 0.25),
                (18.0, 15.0, 25.0),
                (100_000.0, 60_000.0, 140_000.0),
                (4_500.0, 3_000.0, 6_000.0),
                (800.0, 500.0, 1_200.0),
                ASABE,
                Confidence::High,
            ),
            ON_FARM,
        ),
        feedstock(
            "Swine Manure",
            &["swine manure", "hog manure", "pig manure", "pig slurry", "swine"],
            "Deep-pit or pull-plug finishing barn slurry",
            properties(
                (6.0, 2.0, 10.0),
                (75.0, 65.0, 85.0),
                (0.30, 0.25, 0.40),
                (8.0, 6.0, 12.0),
                (60_000.0, 30_000.0, 90_000.0),
                (5_000.0, 3_000.0, 8_000.0),
                (1_500.0, 800.0, 2_500.0),
                ASABE,
                Confidence::High,
            ),
            ON_FARM,
        ),
        feedstock(
            "Poultry Litter",
            &["poultry litter", "chicken litter", "broiler litter", "poultry manure", "chicken manure", "layer manure"],
            "Broiler house litter or layer manure",
            properties(
                (60.0, 40.0, 80.0),
                (70.0, 60.0, 80.0),
                (0.25, 0.18, 0.32),
                (10.0, 7.0, 15.0),
                (300_000.0, 200_000.0, 400_000.0),
                (30_000.0, 20_000.0, 40_000.0),
                (12_000.0, 8_000.0, 16_000.0),
                ASABE,
                Confidence::Medium,
            ),
            ON_FARM,
        ),
        feedstock(
            "Municipal Wastewater Sludge",
            &[
                "wastewater sludge",
                "sewage sludge",
                "municipal sludge",
                "biosolids",
                "primary sludge",
                "waste activated sludge",
                "thickened sludge",
            ],
            "Blended primary and thickened waste activated sludge",
            properties(
                (5.0, 2.0, 8.0),
                (78.0, 70.0, 85.0),
                (0.30, 0.20, 0.35),
                (9.0, 6.0, 12.0),
                (60_000.0, 30_000.0, 90_000.0),
                (3_500.0, 2_000.0, 5_000.0),
                (1_200.0, 600.0, 2_000.0),
                WEF_MOP8,
                Confidence::High,
            ),
            ON_FARM,
        ),
        feedstock(
            "Brewery Spent Grain",
            &[
                "spent grain",
                "brewers grain",
                "brewery waste",
                "distillers grains",
                "distillery waste",
                "whole stillage",
                "thin stillage",
                "stillage",
            ],
            "Brewery and distillery grain residues and stillage",
            properties(
                (22.0, 8.0, 30.0),
                (95.0, 90.0, 98.0),
                (0.38, 0.30, 0.45),
                (12.0, 8.0, 18.0),
                (150_000.0, 60_000.0, 250_000.0),
                (9_000.0, 5_000.0, 12_000.0),
                (1_500.0, 800.0, 2_500.0),
                LABATUT,
                Confidence::Medium,
            ),
            TIPPING,
        ),
        feedstock(
            "Fruit and Vegetable Waste",
            &[
                "fruit and vegetable",
                "fruit vegetable",
                "fruit waste",
                "vegetable waste",
                "produce waste",
                "processing residue",
                "pomace",
                "peels",
            ],
            "Produce culls and food processing residues",
            properties(
                (12.0, 8.0, 20.0),
                (90.0, 85.0, 95.0),
                (0.36, 0.30, 0.45),
                (25.0, 15.0, 35.0),
                (120_000.0, 60_000.0, 200_000.0),
                (2_500.0, 1_500.0, 4_000.0),
                (400.0, 200.0, 700.0),
                LABATUT,
                Confidence::Medium,
            ),
            TIPPING,
        ),
        feedstock(
            "Corn Silage",
            &["corn silage", "maize silage", "silage", "energy crop", "crop residue"],
            "Whole-plant corn silage and similar energy crops",
            properties(
                (33.0, 28.0, 38.0),
                (95.0, 92.0, 97.0),
                (0.34, 0.30, 0.38),
                (35.0, 30.0, 45.0),
                (350_000.0, 280_000.0, 420_000.0),
                (4_000.0, 3_000.0, 5_000.0),
                (700.0, 500.0, 900.0),
                AGSTAR,
                Confidence::High,
            ),
            ON_FARM,
        ),
        feedstock(
            "Crude Glycerin",
            &["crude glycerin", "crude glycerol", "glycerin", "glycerol", "biodiesel byproduct"],
            "Biodiesel by-product, high-strength liquid",
            properties(
                (85.0, 70.0, 95.0),
                (95.0, 85.0, 99.0),
                (0.40, 0.30, 0.50),
                (80.0, 50.0, 150.0),
                (1_200_000.0, 900_000.0, 1_500_000.0),
                (100.0, 20.0, 500.0),
                (50.0, 10.0, 200.0),
                LABATUT,
                Confidence::Low,
            ),
            TIPPING,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_feedstock_has_full_property_set() {
        for profile in profiles() {
            for key in ["total_solids", "volatile_solids", "bmp", "c_n_ratio", "cod", "tkn", "tp"] {
                assert!(profile.property(key).is_some(), "{} missing {}", profile.name, key);
            }
            assert_eq!(profile.kind, ProfileKind::Feedstock);
        }
    }

    #[test]
    fn test_only_packaged_food_needs_depackaging() {
        let flagged: Vec<String> = profiles()
            .into_iter()
            .filter(|p| p.flags.requires_depackaging)
            .map(|p| p.name)
            .collect();
        assert_eq!(flagged, vec!["Packaged Food Waste".to_string()]);
    }

    #[test]
    fn test_manures_do_not_pay_tipping_fees() {
        for p in profiles() {
            if p.name.contains("Manure") || p.name == "Poultry Litter" {
                assert!(!p.flags.tipping_fee_eligible, "{}", p.name);
            }
        }
    }

    #[test]
    fn test_swine_manure_is_nitrogen_rich() {
        let swine = profiles().into_iter().find(|p| p.name == "Swine Manure").unwrap();
        assert!(swine.property("c_n_ratio").unwrap().typical < 15.0);
    }
}
