//! Feedstock blending.
//!
//! Each feedstock's flow is parsed, its properties enriched from the
//! reference library, and its loads summed into one blended stream.
//! Reported averages of TS, VS, BMP, C:N, COD, TKN and TP are weighted by
//! tons per day. Entries with unparseable or zero flow are excluded with a
//! warning each.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::stream::{GasComposition, GasStream, SlurryStream};
use crate::calculations::Assumption;
use crate::config::{DesignCriteria, FallbackFeedstock};
use crate::errors::CalcWarning;
use crate::library::{enrich_values, Enrichment, ProfileKind, ReferenceLibrary, ValueSource};
use crate::project::FeedstockEntry;
use crate::units::{mg_per_l_to_lb_per_day, parse_flow_rate, parse_gas_flow, LbPerDay, Scfm, TonsPerDay, LB_PER_TON};

/// One valid feedstock after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedstockContribution {
    pub name: String,
    pub profile: Option<String>,
    pub flow_tpd: f64,
    pub ts_pct: f64,
    pub vs_pct_of_ts: f64,
    pub bmp: f64,
    pub c_n_ratio: f64,
    pub cod_mg_l: f64,
    pub tkn_mg_l: f64,
    pub tp_mg_l: f64,
    pub requires_depackaging: bool,
    pub tipping_fee_eligible: bool,
    pub enrichment: Enrichment,
}

impl FeedstockContribution {
    pub fn stream(&self) -> SlurryStream {
        let flow = TonsPerDay(self.flow_tpd);
        let wet_lb = self.flow_tpd * LB_PER_TON;
        let ts = wet_lb * self.ts_pct / 100.0;
        let gpd = flow.to_gal_per_day();
        SlurryStream {
            flow,
            total_solids: LbPerDay(ts),
            volatile_solids: LbPerDay(ts * self.vs_pct_of_ts / 100.0),
            cod: mg_per_l_to_lb_per_day(self.cod_mg_l, gpd),
            tkn: mg_per_l_to_lb_per_day(self.tkn_mg_l, gpd),
            tp: mg_per_l_to_lb_per_day(self.tp_mg_l, gpd),
            bmp: self.bmp,
            c_n_ratio: self.c_n_ratio,
        }
    }
}

/// Blended organic feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendedFeed {
    pub contributions: Vec<FeedstockContribution>,
    pub total_tpd: f64,
    pub ts_pct: f64,
    pub vs_pct_of_ts: f64,
    pub bmp: f64,
    pub c_n_ratio: f64,
    pub cod_mg_l: f64,
    pub tkn_mg_l: f64,
    pub tp_mg_l: f64,
    /// Sum of every contribution's loads
    pub stream: SlurryStream,
    /// Portion routed through depackaging
    pub packaged: SlurryStream,
    pub tipping_tpd: f64,
}

impl BlendedFeed {
    pub fn is_empty(&self) -> bool {
        self.total_tpd <= 0.0
    }
}

fn weighted(items: &[FeedstockContribution], total: f64, f: impl Fn(&FeedstockContribution) -> f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    items.iter().map(|c| c.flow_tpd * f(c)).sum::<f64>() / total
}

fn sum_streams<'a>(streams: impl Iterator<Item = &'a FeedstockContribution>) -> SlurryStream {
    let mut total = SlurryStream::default();
    let mut weighted_bmp = 0.0;
    let mut weighted_cn = 0.0;
    for c in streams {
        let s = c.stream();
        total.flow = total.flow + s.flow;
        total.total_solids = total.total_solids + s.total_solids;
        total.volatile_solids = total.volatile_solids + s.volatile_solids;
        total.cod = total.cod + s.cod;
        total.tkn = total.tkn + s.tkn;
        total.tp = total.tp + s.tp;
        weighted_bmp += c.flow_tpd * c.bmp;
        weighted_cn += c.flow_tpd * c.c_n_ratio;
    }
    if total.flow.0 > 0.0 {
        total.bmp = weighted_bmp / total.flow.0;
        total.c_n_ratio = weighted_cn / total.flow.0;
    }
    total
}

/// Enrich one entry against the library, matching profiles of `kind`.
fn enrich_entry(entry: &FeedstockEntry, library: &ReferenceLibrary, kind: ProfileKind) -> Enrichment {
    let profile = library
        .match_kind(entry.match_text(), kind)
        .or_else(|| library.match_kind(&entry.name, kind));
    match profile {
        Some(p) => library.enrich(p, &entry.properties),
        None => enrich_values(None, &[], &entry.properties),
    }
}

/// Value of `key`, or `fallback` with the key noted as missing
fn value_or(enrichment: &Enrichment, key: &str, fallback: f64, missing: &mut Vec<&'static str>, label: &'static str) -> f64 {
    match enrichment.number(key) {
        Some(v) => v,
        None => {
            missing.push(label);
            fallback
        }
    }
}

fn exclusion_warning(index: usize, entry: &FeedstockEntry, reason: &str) -> CalcWarning {
    warn!(feedstock = %entry.name, reason, "feedstock excluded");
    CalcWarning::warning(
        format!("feedstocks[{}].quantity", index),
        format!("Feedstock '{}' excluded: {}", entry.name, reason),
    )
}

/// Blend organic feedstocks into one stream.
pub fn blend_feedstocks(
    entries: &[FeedstockEntry],
    library: &ReferenceLibrary,
    criteria: &DesignCriteria,
    warnings: &mut Vec<CalcWarning>,
    assumptions: &mut Vec<Assumption>,
) -> BlendedFeed {
    let fallback: &FallbackFeedstock = &criteria.fallback_feedstock;
    let mut contributions = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let flow = match parse_flow_rate(&entry.quantity, &entry.unit) {
            Ok(flow) => flow,
            Err(e) => {
                warnings.push(exclusion_warning(index, entry, &e.to_string()));
                continue;
            }
        };
        if !flow.0.is_finite() || flow.0 <= 0.0 {
            warnings.push(exclusion_warning(index, entry, "flow is zero or negative"));
            continue;
        }

        let enrichment = enrich_entry(entry, library, ProfileKind::Feedstock);
        let flags = enrichment
            .profile_name
            .as_deref()
            .and_then(|name| library.profile(name))
            .map(|p| p.flags)
            .unwrap_or_default();

        let mut missing = Vec::new();
        let contribution = FeedstockContribution {
            name: entry.name.clone(),
            profile: enrichment.profile_name.clone(),
            flow_tpd: flow.0,
            ts_pct: value_or(&enrichment, "total_solids", fallback.total_solids_pct, &mut missing, "total solids"),
            vs_pct_of_ts: value_or(&enrichment, "volatile_solids", fallback.volatile_solids_pct_of_ts, &mut missing, "volatile solids"),
            bmp: value_or(&enrichment, "bmp", fallback.bmp_m3_ch4_per_kg_vs, &mut missing, "BMP"),
            c_n_ratio: value_or(&enrichment, "c_n_ratio", fallback.c_n_ratio, &mut missing, "C:N ratio"),
            cod_mg_l: value_or(&enrichment, "cod", fallback.cod_mg_l, &mut missing, "COD"),
            tkn_mg_l: value_or(&enrichment, "tkn", fallback.tkn_mg_l, &mut missing, "TKN"),
            tp_mg_l: value_or(&enrichment, "tp", fallback.tp_mg_l, &mut missing, "TP"),
            requires_depackaging: flags.requires_depackaging,
            tipping_fee_eligible: flags.tipping_fee_eligible,
            enrichment,
        };

        match &contribution.profile {
            Some(profile) => {
                let defaulted: Vec<&str> = ["total_solids", "volatile_solids", "bmp"]
                    .into_iter()
                    .filter(|k| contribution.enrichment.source_of(k) == Some(ValueSource::EstimatedDefault))
                    .collect();
                if !defaulted.is_empty() {
                    assumptions.push(Assumption::new(
                        format!("{} properties", entry.name),
                        format!("{} library defaults for {}", profile, defaulted.join(", ")),
                        "Reference library",
                    ));
                }
            }
            None => warnings.push(CalcWarning::warning(
                format!("feedstocks[{}].feedstock_type", index),
                format!("No library profile matches '{}'", entry.match_text()),
            )),
        }
        if !missing.is_empty() {
            assumptions.push(Assumption::new(
                format!("{} properties", entry.name),
                format!("generic defaults for {}", missing.join(", ")),
                "Engine fallback feedstock",
            ));
        }

        debug!(
            feedstock = %contribution.name,
            profile = ?contribution.profile,
            flow_tpd = contribution.flow_tpd,
            ts_pct = contribution.ts_pct,
            "feedstock accepted"
        );
        contributions.push(contribution);
    }

    let total_tpd: f64 = contributions.iter().map(|c| c.flow_tpd).sum();
    let tipping_tpd = contributions
        .iter()
        .filter(|c| c.tipping_fee_eligible)
        .map(|c| c.flow_tpd)
        .sum();

    BlendedFeed {
        total_tpd,
        ts_pct: weighted(&contributions, total_tpd, |c| c.ts_pct),
        vs_pct_of_ts: weighted(&contributions, total_tpd, |c| c.vs_pct_of_ts),
        bmp: weighted(&contributions, total_tpd, |c| c.bmp),
        c_n_ratio: weighted(&contributions, total_tpd, |c| c.c_n_ratio),
        cod_mg_l: weighted(&contributions, total_tpd, |c| c.cod_mg_l),
        tkn_mg_l: weighted(&contributions, total_tpd, |c| c.tkn_mg_l),
        tp_mg_l: weighted(&contributions, total_tpd, |c| c.tp_mg_l),
        stream: sum_streams(contributions.iter()),
        packaged: sum_streams(contributions.iter().filter(|c| c.requires_depackaging)),
        tipping_tpd,
        contributions,
    }
}

// ============================================================================
// Biogas Sources
// ============================================================================

/// Blended existing biogas for bolt-on projects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendedGas {
    pub sources: Vec<(String, Option<String>, f64)>,
    pub stream: GasStream,
}

impl BlendedGas {
    pub fn is_empty(&self) -> bool {
        self.stream.flow.0 <= 0.0
    }
}

/// Blend biogas sources by SCFM-weighted composition.
pub fn blend_biogas(
    entries: &[FeedstockEntry],
    library: &ReferenceLibrary,
    criteria: &DesignCriteria,
    warnings: &mut Vec<CalcWarning>,
    assumptions: &mut Vec<Assumption>,
) -> BlendedGas {
    let digestion = &criteria.digestion;
    let default_ch4 = digestion.biogas_ch4_pct.value;
    let default_co2 = digestion.biogas_co2_pct.value;

    let mut sources = Vec::new();
    let mut total = 0.0;
    let mut sums = GasComposition::default();

    for (index, entry) in entries.iter().enumerate() {
        let flow: Scfm = match parse_gas_flow(&entry.quantity, &entry.unit) {
            Ok(flow) => flow,
            Err(e) => {
                warnings.push(exclusion_warning(index, entry, &e.to_string()));
                continue;
            }
        };
        if !flow.0.is_finite() || flow.0 <= 0.0 {
            warnings.push(exclusion_warning(index, entry, "flow is zero or negative"));
            continue;
        }

        let enrichment = enrich_entry(entry, library, ProfileKind::BiogasSource);
        let mut missing = Vec::new();
        let ch4 = value_or(&enrichment, "ch4", default_ch4, &mut missing, "CH4");
        let co2 = value_or(&enrichment, "co2", default_co2, &mut missing, "CO2");
        let h2s = value_or(&enrichment, "h2s", digestion.biogas_h2s_ppmv.value, &mut missing, "H2S");
        let n2 = value_or(&enrichment, "n2", (100.0 - ch4 - co2).max(0.0), &mut missing, "N2");
        let o2 = value_or(&enrichment, "o2", 0.0, &mut missing, "O2");
        if !missing.is_empty() {
            assumptions.push(Assumption::new(
                format!("{} composition", entry.name),
                format!("typical digester gas values for {}", missing.join(", ")),
                "Digestion design criteria",
            ));
        }

        sums.ch4_pct += flow.0 * ch4;
        sums.co2_pct += flow.0 * co2;
        sums.h2s_ppmv += flow.0 * h2s;
        sums.n2_pct += flow.0 * n2;
        sums.o2_pct += flow.0 * o2;
        total += flow.0;
        debug!(source = %entry.name, scfm = flow.0, ch4, "biogas source accepted");
        sources.push((entry.name.clone(), enrichment.profile_name.clone(), flow.0));
    }

    if total <= 0.0 {
        return BlendedGas::default();
    }
    let composition = GasComposition {
        ch4_pct: sums.ch4_pct / total,
        co2_pct: sums.co2_pct / total,
        h2s_ppmv: sums.h2s_ppmv / total,
        n2_pct: sums.n2_pct / total,
        o2_pct: sums.o2_pct / total,
    };
    BlendedGas {
        sources,
        stream: GasStream::new(Scfm(total), composition, criteria.btu_per_scf_per_pct_ch4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PropertySpec;

    fn entry(name: &str, quantity: &str, unit: &str, ts: f64, vs: f64) -> FeedstockEntry {
        FeedstockEntry::new(name, quantity, unit)
            .with_property("Total Solids", PropertySpec::number(ts, "%"))
            .with_property("VS/TS", PropertySpec::number(vs, "%"))
    }

    fn blend(entries: &[FeedstockEntry]) -> (BlendedFeed, Vec<CalcWarning>) {
        let mut warnings = Vec::new();
        let mut assumptions = Vec::new();
        let feed = blend_feedstocks(
            entries,
            ReferenceLibrary::builtin(),
            &DesignCriteria::default(),
            &mut warnings,
            &mut assumptions,
        );
        (feed, warnings)
    }

    #[test]
    fn test_single_feedstock_loads() {
        let (feed, warnings) = blend(&[entry("Food Waste", "100", "tons/day", 15.0, 80.0)]);
        assert!(warnings.is_empty());
        assert!((feed.stream.total_solids.0 - 30_000.0).abs() < 1e-6);
        assert!((feed.stream.volatile_solids.0 - 24_000.0).abs() < 1e-6);
        assert!((feed.ts_pct - 15.0).abs() < 1e-12);
        assert_eq!(feed.tipping_tpd, 100.0);
    }

    #[test]
    fn test_weighted_averages() {
        let (feed, _) = blend(&[
            entry("Dairy Manure", "300", "tons/day", 10.0, 80.0),
            entry("Food Waste", "100", "tons/day", 30.0, 90.0),
        ]);
        assert_eq!(feed.total_tpd, 400.0);
        assert!((feed.ts_pct - 15.0).abs() < 1e-12);
        assert!((feed.vs_pct_of_ts - 82.5).abs() < 1e-12);
        // loads sum exactly
        let expected_vs = 300.0 * 2000.0 * 0.10 * 0.80 + 100.0 * 2000.0 * 0.30 * 0.90;
        assert!((feed.stream.volatile_solids.0 - expected_vs).abs() < 1e-6);
        // only food waste pays a tipping fee
        assert_eq!(feed.tipping_tpd, 100.0);
    }

    #[test]
    fn test_invalid_entries_excluded_with_warning() {
        let (feed, warnings) = blend(&[
            entry("Food Waste", "100", "tons/day", 15.0, 80.0),
            entry("Mystery", "lots", "", 15.0, 80.0),
            entry("Dairy Manure", "0", "tons/day", 10.0, 80.0),
        ]);
        assert_eq!(feed.contributions.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].field.contains("feedstocks[1]"));
        assert!(warnings[1].message.contains("Dairy Manure"));
    }

    #[test]
    fn test_unmatched_feedstock_uses_fallbacks() {
        let mut warnings = Vec::new();
        let mut assumptions = Vec::new();
        let feed = blend_feedstocks(
            &[FeedstockEntry::new("Unobtainium sludge cake", "10", "tpd").with_type("unobtainium")],
            ReferenceLibrary::builtin(),
            &DesignCriteria::default(),
            &mut warnings,
            &mut assumptions,
        );
        assert_eq!(feed.contributions.len(), 1);
        assert_eq!(feed.ts_pct, DesignCriteria::default().fallback_feedstock.total_solids_pct);
        assert!(assumptions.iter().any(|a| a.source == "Engine fallback feedstock"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_packaged_feed_tracked_separately() {
        let (feed, _) = blend(&[
            entry("Packaged Food Waste", "20", "tons/day", 20.0, 88.0),
            entry("Food Waste", "80", "tons/day", 25.0, 90.0),
        ]);
        assert_eq!(feed.packaged.flow.0, 20.0);
        assert_eq!(feed.stream.flow.0, 100.0);
    }

    #[test]
    fn test_blend_biogas_weighted_by_flow() {
        let mut warnings = Vec::new();
        let mut assumptions = Vec::new();
        let gas = blend_biogas(
            &[
                FeedstockEntry::new("Landfill Gas", "600", "scfm"),
                FeedstockEntry::new("Dairy Digester Gas", "200", "scfm"),
            ],
            ReferenceLibrary::builtin(),
            &DesignCriteria::default(),
            &mut warnings,
            &mut assumptions,
        );
        assert_eq!(gas.stream.flow.0, 800.0);
        let expected_ch4 = (600.0 * 50.0 + 200.0 * 58.0) / 800.0;
        assert!((gas.stream.composition.ch4_pct - expected_ch4).abs() < 1e-9);
        assert!(warnings.is_empty());
    }
}
