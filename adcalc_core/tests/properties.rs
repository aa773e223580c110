use adcalc_core::calculations::capex::{select_tier, TierPosition};
use adcalc_core::calculations::mass_balance;
use adcalc_core::calculations::opex::{recompute_opex_summary, OpexCategory, OpexLineItem};
use adcalc_core::config::{CapexConfig, CapexTier, DesignCriteria};
use adcalc_core::library::synonyms::SynonymTable;
use adcalc_core::library::ReferenceLibrary;
use adcalc_core::project::{FeedstockEntry, ProjectInputs, ProjectType};
use proptest::prelude::*;

/// Feedstocks that never route through depackaging
const UNPACKAGED: [&str; 6] = [
    "Food Waste",
    "Dairy Manure",
    "Swine Manure",
    "Poultry Litter",
    "Brewery Spent Grain",
    "Corn Silage",
];

fn components(t: &CapexTier) -> [f64; 7] {
    [
        t.major_equipment,
        t.engineering,
        t.civil_structural,
        t.process_piping,
        t.electrical,
        t.instrumentation_controls,
        t.non_process,
    ]
}

fn opex_item(index: usize, category: usize, cost: f64) -> OpexLineItem {
    let category = OpexCategory::ALL[category % OpexCategory::ALL.len()];
    OpexLineItem {
        id: format!("item-{}", index),
        category,
        description: format!("Item {}", index),
        annual_cost: if category.is_offset() { -cost } else { cost },
        quantity: 1.0,
        unit: "lump sum".to_string(),
        unit_cost: cost,
        basis: String::new(),
        source: String::new(),
        is_overridden: false,
        is_locked: false,
    }
}

proptest! {
    #[test]
    fn volatile_solids_conserved_through_blend_and_digestion(
        feeds in prop::collection::vec((0usize..UNPACKAGED.len(), 1.0_f64..200.0), 1..5)
    ) {
        let mut inputs = ProjectInputs::new(ProjectType::Greenfield);
        for (i, (profile, tpd)) in feeds.iter().enumerate() {
            let entry = FeedstockEntry::new(format!("Feed {}", i), format!("{:.3}", tpd), "tons/day")
                .with_type(UNPACKAGED[*profile]);
            inputs = inputs.with_feedstock(entry);
        }

        let result = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &DesignCriteria::default()).unwrap();
        let expected: f64 = result
            .feedstocks
            .iter()
            .map(|c| c.flow_tpd * 2000.0 * c.ts_pct / 100.0 * c.vs_pct_of_ts / 100.0)
            .sum();

        let vs_load = result.summary_value("vsLoadLbPerDay").unwrap();
        prop_assert!((vs_load - expected).abs() <= 0.05 + expected * 1e-9);

        let into_digester = result.summary_value("digesterVsLoadLbPerDay").unwrap();
        let destroyed = result.summary_value("vsDestroyedLbPerDay").unwrap();
        let remaining = result.summary_value("digestateVsLbPerDay").unwrap();
        prop_assert!((into_digester - vs_load).abs() <= 0.1);
        prop_assert!((destroyed + remaining - into_digester).abs() <= 0.15);
    }

    #[test]
    fn opex_summary_recompute_is_idempotent(
        costs in prop::collection::vec((0usize..7, 0.0_f64..1.0e6), 0..20),
        rng_mmbtu in 0.0_f64..1.0e6,
    ) {
        let items: Vec<OpexLineItem> = costs
            .iter()
            .enumerate()
            .map(|(i, (category, cost))| opex_item(i, *category, *cost))
            .collect();
        let first = recompute_opex_summary(&items, rng_mmbtu);
        let second = recompute_opex_summary(&items, first.annual_rng_mmbtu);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.total_revenue_offsets <= 0.0);
        prop_assert!((first.net_annual_opex - first.total_annual_opex - first.total_revenue_offsets).abs() < 1e-6);
    }

    #[test]
    fn interpolated_components_stay_between_tiers(scfm in 400.0_f64..=1200.0) {
        let tiers = CapexConfig::default().tiers;
        let selection = select_tier(&tiers, scfm).unwrap();
        let picked = components(&selection.tier);
        match selection.position {
            TierPosition::Exact => {
                let tier = tiers.iter().find(|t| t.scfm == scfm).unwrap();
                prop_assert_eq!(picked, components(tier));
            }
            TierPosition::Interpolated { lower_scfm, upper_scfm } => {
                prop_assert!(lower_scfm < scfm && scfm < upper_scfm);
                let lower = components(tiers.iter().find(|t| t.scfm == lower_scfm).unwrap());
                let upper = components(tiers.iter().find(|t| t.scfm == upper_scfm).unwrap());
                for i in 0..picked.len() {
                    let (lo, hi) = (lower[i].min(upper[i]), lower[i].max(upper[i]));
                    prop_assert!(picked[i] >= lo - 1e-6 && picked[i] <= hi + 1e-6);
                }
            }
            TierPosition::BelowRange { .. } => prop_assert!(false, "400..=1200 is never below range"),
        }
    }

    #[test]
    fn synonym_resolution_is_deterministic(
        entry in 0usize..8,
        alias in 0usize..4,
        prefix in "[a-z ]{0,6}",
        suffix in "[a-z ]{0,6}",
    ) {
        let table = SynonymTable::builtin();
        let entries = table.entries();
        let chosen = &entries[entry % entries.len()];
        let aliases = &chosen.aliases;
        let label = format!("{}{}{}", prefix, aliases[alias % aliases.len()], suffix);

        let first = table.resolve(&label);
        prop_assert_eq!(first, table.resolve(&label));
        prop_assert_eq!(first, table.resolve(&label.to_uppercase()));
        prop_assert_eq!(first, table.resolve(&label.replace(' ', "_")));
    }
}
