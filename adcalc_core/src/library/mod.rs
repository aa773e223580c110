//! # Reference Enrichment Library
//!
//! Catalog of named material profiles with default property ranges, and the
//! enrichment step that merges user-supplied values over those defaults.
//!
//! ## Profile Kinds
//!
//! - **Feedstock**: organic inputs to digestion (food waste, manures, FOG...)
//! - **Biogas source**: existing raw-gas streams for bolt-on upgrading
//! - **Output spec**: product quality limits (pipeline RNG, digestate cake...)
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use adcalc_core::library::{ReferenceLibrary, PropertySpec, ValueSource};
//!
//! let library = ReferenceLibrary::builtin();
//! let profile = library.match_profile("post-consumer food scraps").unwrap();
//! assert_eq!(profile.name, "Food Waste");
//!
//! let mut user = BTreeMap::new();
//! user.insert("Total Solids (%)".to_string(), PropertySpec::number(18.0, "%"));
//!
//! let enriched = library.enrich(profile, &user);
//! assert_eq!(enriched.number("total_solids"), Some(18.0));
//! assert_eq!(enriched.get("total_solids").unwrap().source, ValueSource::UserProvided);
//! ```

pub mod biogas;
pub mod feedstocks;
pub mod output_specs;
pub mod synonyms;

pub use synonyms::{normalize_key, resolve_property_key, SynonymTable};

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::units::parse_number;

// ============================================================================
// Provenance Types
// ============================================================================

/// Category of a library profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Feedstock,
    BiogasSource,
    OutputSpec,
}

/// Confidence in a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Where a property value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Library default
    EstimatedDefault,
    /// Entered or confirmed by the user
    UserProvided,
    /// Extracted by an upstream AI step, not yet confirmed
    AiInferred,
}

impl ValueSource {
    /// Confidence assigned to a value from this source
    pub fn confidence(&self) -> Confidence {
        match self {
            ValueSource::EstimatedDefault => Confidence::Low,
            ValueSource::UserProvided => Confidence::High,
            ValueSource::AiInferred => Confidence::Medium,
        }
    }
}

/// A numeric or free-text property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Numeric view; text values are parsed for their first number
    /// (ranges resolve to the midpoint).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(v) => Some(*v),
            PropertyValue::Text(s) => parse_number(s).ok().map(|(v, _)| v),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A user- or AI-supplied property: value/unit pair with optional origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub value: PropertyValue,
    #[serde(default)]
    pub unit: String,
    /// Defaults to `UserProvided` when absent
    #[serde(default)]
    pub source: Option<ValueSource>,
}

impl PropertySpec {
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        PropertySpec {
            value: PropertyValue::Number(value),
            unit: unit.into(),
            source: None,
        }
    }

    pub fn text(value: impl Into<String>, unit: impl Into<String>) -> Self {
        PropertySpec {
            value: PropertyValue::Text(value.into()),
            unit: unit.into(),
            source: None,
        }
    }

    pub fn ai_inferred(mut self) -> Self {
        self.source = Some(ValueSource::AiInferred);
        self
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Default value of one property, with its typical range and citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefault {
    /// Canonical property key (see [`synonyms`])
    pub key: String,
    pub typical: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    /// Literature source for the range
    pub citation: String,
    pub confidence: Confidence,
}

impl PropertyDefault {
    /// Build a default whose unit comes from the synonym table.
    pub fn new(key: &str, typical: f64, range: (f64, f64), citation: &str, confidence: Confidence) -> Self {
        let unit = SynonymTable::builtin()
            .entry(key)
            .map(|e| e.unit)
            .unwrap_or("");
        PropertyDefault {
            key: key.to_string(),
            typical,
            min: range.0,
            max: range.1,
            unit: unit.to_string(),
            citation: citation.to_string(),
            confidence,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Direction of an output-spec limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBound {
    Min,
    Max,
}

/// One product-quality limit of an output spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecLimit {
    pub key: String,
    pub bound: LimitBound,
    pub value: f64,
    pub unit: String,
    pub citation: String,
}

impl SpecLimit {
    pub fn min(key: &str, value: f64, unit: &str, citation: &str) -> Self {
        SpecLimit {
            key: key.to_string(),
            bound: LimitBound::Min,
            value,
            unit: unit.to_string(),
            citation: citation.to_string(),
        }
    }

    pub fn max(key: &str, value: f64, unit: &str, citation: &str) -> Self {
        SpecLimit {
            key: key.to_string(),
            bound: LimitBound::Max,
            value,
            unit: unit.to_string(),
            citation: citation.to_string(),
        }
    }

    /// Whether `actual` satisfies this limit
    pub fn is_met(&self, actual: f64) -> bool {
        match self.bound {
            LimitBound::Min => actual >= self.value,
            LimitBound::Max => actual <= self.value,
        }
    }
}

/// Handling flags that change how the pipeline treats a feedstock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileFlags {
    /// Packaged or contaminated material routed through depackaging
    #[serde(default)]
    pub requires_depackaging: bool,
    /// Delivered by haulers who pay a tipping fee
    #[serde(default)]
    pub tipping_fee_eligible: bool,
}

/// A named material profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub kind: ProfileKind,
    pub aliases: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub properties: Vec<PropertyDefault>,
    #[serde(default)]
    pub limits: Vec<SpecLimit>,
    #[serde(default)]
    pub flags: ProfileFlags,
}

impl Profile {
    pub fn property(&self, key: &str) -> Option<&PropertyDefault> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn limit(&self, key: &str) -> Option<&SpecLimit> {
        self.limits.iter().find(|l| l.key == key)
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// One property after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProperty {
    /// Canonical key, or the user's own label when it matched nothing
    pub key: String,
    pub display_name: String,
    pub value: PropertyValue,
    pub unit: String,
    pub source: ValueSource,
    pub confidence: Confidence,
    pub provenance: String,
    /// Display order; unmatched user properties sort last
    pub sort_order: u32,
}

/// Result of merging user values over a profile's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub profile_name: Option<String>,
    pub properties: Vec<EnrichedProperty>,
}

/// First sort slot used by user properties that match no canonical key
const UNMATCHED_SORT_BASE: u32 = 10_000;

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&EnrichedProperty> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// Numeric value of a canonical key
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|p| p.value.as_f64())
    }

    /// Source of a canonical key's value
    pub fn source_of(&self, key: &str) -> Option<ValueSource> {
        self.get(key).map(|p| p.source)
    }
}

/// Merge user values over a set of defaults.
///
/// Defaults are copied in first (`EstimatedDefault`). Each user property is
/// resolved through the synonym table and overlaid with its own source and
/// upgraded confidence. User properties that resolve to nothing are kept as
/// new entries after all canonical ones, in input order.
pub fn enrich_values(
    profile_name: Option<&str>,
    defaults: &[PropertyDefault],
    user_values: &BTreeMap<String, PropertySpec>,
) -> Enrichment {
    let table = SynonymTable::builtin();
    let mut properties: Vec<EnrichedProperty> = defaults
        .iter()
        .map(|d| EnrichedProperty {
            key: d.key.clone(),
            display_name: table
                .entry(&d.key)
                .map(|e| e.display_name.to_string())
                .unwrap_or_else(|| d.key.clone()),
            value: PropertyValue::Number(d.typical),
            unit: d.unit.clone(),
            source: ValueSource::EstimatedDefault,
            confidence: d.confidence,
            provenance: format!(
                "{} default (range {}-{} {}; {})",
                profile_name.unwrap_or("library"),
                d.min,
                d.max,
                d.unit,
                d.citation
            ),
            sort_order: table.order_of(&d.key).unwrap_or(UNMATCHED_SORT_BASE as usize - 1) as u32,
        })
        .collect();

    let mut unmatched = 0u32;
    for (label, spec) in user_values {
        let source = spec.source.unwrap_or(ValueSource::UserProvided);
        let provenance = match source {
            ValueSource::UserProvided => format!("user provided as '{}'", label),
            ValueSource::AiInferred => format!("AI inferred as '{}'", label),
            ValueSource::EstimatedDefault => format!("supplied default '{}'", label),
        };

        match table.resolve(label) {
            Some(key) => {
                let entry = table.entry(key);
                let unit = if spec.unit.is_empty() {
                    entry.map(|e| e.unit.to_string()).unwrap_or_default()
                } else {
                    spec.unit.clone()
                };
                let value = match spec.value.as_f64() {
                    Some(v) => PropertyValue::Number(v),
                    None => spec.value.clone(),
                };
                let enriched = EnrichedProperty {
                    key: key.to_string(),
                    display_name: entry.map(|e| e.display_name.to_string()).unwrap_or_else(|| key.to_string()),
                    value,
                    unit,
                    source,
                    confidence: source.confidence(),
                    provenance,
                    sort_order: table.order_of(key).unwrap_or(0) as u32,
                };
                match properties.iter_mut().find(|p| p.key == key) {
                    Some(existing) => *existing = enriched,
                    None => properties.push(enriched),
                }
            }
            None => {
                properties.push(EnrichedProperty {
                    key: label.clone(),
                    display_name: label.clone(),
                    value: spec.value.clone(),
                    unit: spec.unit.clone(),
                    source,
                    confidence: source.confidence(),
                    provenance,
                    sort_order: UNMATCHED_SORT_BASE + unmatched,
                });
                unmatched += 1;
            }
        }
    }

    properties.sort_by_key(|p| p.sort_order);
    Enrichment {
        profile_name: profile_name.map(str::to_string),
        properties,
    }
}

// ============================================================================
// Library
// ============================================================================

/// A catalog of profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub profiles: Vec<Profile>,
}

static BUILTIN_LIBRARY: Lazy<ReferenceLibrary> = Lazy::new(|| {
    let mut profiles = feedstocks::profiles();
    profiles.extend(biogas::profiles());
    profiles.extend(output_specs::profiles());
    ReferenceLibrary { profiles }
});

/// Lowercase, punctuation to spaces, whitespace collapsed
fn normalize_text(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ReferenceLibrary {
    pub fn new(profiles: Vec<Profile>) -> Self {
        ReferenceLibrary { profiles }
    }

    /// The built-in catalog of feedstocks, biogas sources and output specs
    pub fn builtin() -> &'static ReferenceLibrary {
        &BUILTIN_LIBRARY
    }

    /// Look up a profile by exact (case-insensitive) name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        let wanted = normalize_text(name);
        self.profiles.iter().find(|p| normalize_text(&p.name) == wanted)
    }

    /// Match free text to a profile of any kind.
    pub fn match_profile(&self, text: &str) -> Option<&Profile> {
        self.match_in(text, |_| true)
    }

    /// Match free text to a profile of one kind.
    pub fn match_kind(&self, text: &str, kind: ProfileKind) -> Option<&Profile> {
        self.match_in(text, |p| p.kind == kind)
    }

    /// Exact name first; then the longest name or alias contained in the
    /// text, ties going to the earlier profile.
    fn match_in(&self, text: &str, filter: impl Fn(&Profile) -> bool) -> Option<&Profile> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return None;
        }

        let candidates: Vec<&Profile> = self.profiles.iter().filter(|p| filter(p)).collect();
        if let Some(exact) = candidates.iter().find(|p| normalize_text(&p.name) == normalized) {
            return Some(*exact);
        }

        let mut best: Option<(usize, &Profile)> = None;
        for profile in candidates {
            let names = std::iter::once(&profile.name).chain(profile.aliases.iter());
            for alias in names {
                let alias = normalize_text(alias);
                if alias.is_empty() || !normalized.contains(&alias) {
                    continue;
                }
                if best.map_or(true, |(len, _)| alias.len() > len) {
                    best = Some((alias.len(), profile));
                }
            }
        }
        best.map(|(_, p)| p)
    }

    /// Merge user values over a profile's defaults.
    pub fn enrich(&self, profile: &Profile, user_values: &BTreeMap<String, PropertySpec>) -> Enrichment {
        enrich_values(Some(&profile.name), &profile.properties, user_values)
    }

    /// Match then enrich. No match yields an empty enrichment, not an error.
    pub fn enrich_matching(&self, text: &str, user_values: &BTreeMap<String, PropertySpec>) -> Enrichment {
        match self.match_profile(text) {
            Some(profile) => self.enrich(profile, user_values),
            None => Enrichment::default(),
        }
    }

    pub fn of_kind(&self, kind: ProfileKind) -> impl Iterator<Item = &Profile> {
        self.profiles.iter().filter(move |p| p.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(pairs: &[(&str, f64)]) -> BTreeMap<String, PropertySpec> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertySpec::number(*v, "")))
            .collect()
    }

    #[test]
    fn test_exact_name_match() {
        let lib = ReferenceLibrary::builtin();
        let p = lib.match_profile("dairy manure").unwrap();
        assert_eq!(p.name, "Dairy Manure");
        assert_eq!(p.kind, ProfileKind::Feedstock);
    }

    #[test]
    fn test_alias_match_prefers_longest() {
        let lib = ReferenceLibrary::builtin();
        let p = lib.match_profile("Packaged food waste from grocery stores").unwrap();
        assert_eq!(p.name, "Packaged Food Waste");
        assert!(p.flags.requires_depackaging);

        let p = lib.match_profile("Restaurant FOOD WASTE").unwrap();
        assert_eq!(p.name, "Food Waste");

        let p = lib.match_profile("dairy digester gas").unwrap();
        assert_eq!(p.name, "Dairy Digester Gas");
    }

    #[test]
    fn test_no_match_is_none() {
        let lib = ReferenceLibrary::builtin();
        assert!(lib.match_profile("unobtainium").is_none());
        assert!(lib.match_profile("").is_none());
        assert!(lib.enrich_matching("unobtainium", &user(&[("TS", 10.0)])).is_empty());
    }

    #[test]
    fn test_match_kind_filters() {
        let lib = ReferenceLibrary::builtin();
        let spec = lib.match_kind("pipeline quality RNG", ProfileKind::OutputSpec).unwrap();
        assert_eq!(spec.name, "Pipeline RNG");
        assert!(lib.match_kind("pipeline quality RNG", ProfileKind::Feedstock).is_none());
    }

    #[test]
    fn test_enrich_defaults_only() {
        let lib = ReferenceLibrary::builtin();
        let profile = lib.profile("Food Waste").unwrap();
        let e = lib.enrich(profile, &BTreeMap::new());
        let ts = e.get("total_solids").unwrap();
        assert_eq!(ts.source, ValueSource::EstimatedDefault);
        assert_eq!(e.number("total_solids"), Some(profile.property("total_solids").unwrap().typical));
        assert!(ts.provenance.contains("Food Waste default"));
    }

    #[test]
    fn test_enrich_overlays_user_values() {
        let lib = ReferenceLibrary::builtin();
        let profile = lib.profile("Dairy Manure").unwrap();
        let mut values = user(&[("Total Solids (%)", 9.5)]);
        values.insert("VS/TS".to_string(), PropertySpec::text("80-84", "%").ai_inferred());

        let e = lib.enrich(profile, &values);
        let ts = e.get("total_solids").unwrap();
        assert_eq!(ts.value, PropertyValue::Number(9.5));
        assert_eq!(ts.source, ValueSource::UserProvided);
        assert_eq!(ts.confidence, Confidence::High);

        let vs = e.get("volatile_solids").unwrap();
        assert_eq!(vs.value, PropertyValue::Number(82.0));
        assert_eq!(vs.source, ValueSource::AiInferred);
        assert_eq!(vs.confidence, Confidence::Medium);
    }

    #[test]
    fn test_unmatched_user_properties_sort_last() {
        let lib = ReferenceLibrary::builtin();
        let profile = lib.profile("Food Waste").unwrap();
        let mut values = user(&[("Bulk density", 1400.0)]);
        values.insert("Hauler".to_string(), PropertySpec::text("Acme Organics", ""));

        let e = lib.enrich(profile, &values);
        let last_two: Vec<&str> = e.properties.iter().rev().take(2).map(|p| p.key.as_str()).collect();
        assert!(last_two.contains(&"Bulk density"));
        assert!(last_two.contains(&"Hauler"));
        assert_eq!(e.get("Hauler").unwrap().value, PropertyValue::Text("Acme Organics".into()));
        // canonical properties keep their table order
        let ts_pos = e.properties.iter().position(|p| p.key == "total_solids").unwrap();
        let vs_pos = e.properties.iter().position(|p| p.key == "volatile_solids").unwrap();
        assert!(ts_pos < vs_pos);
    }

    #[test]
    fn test_enrich_without_profile_keeps_user_values() {
        let e = enrich_values(None, &[], &user(&[("TS", 20.0)]));
        assert_eq!(e.number("total_solids"), Some(20.0));
        assert!(e.profile_name.is_none());
    }

    #[test]
    fn test_builtin_catalog_is_well_formed() {
        let lib = ReferenceLibrary::builtin();
        for profile in &lib.profiles {
            for prop in &profile.properties {
                assert!(prop.min <= prop.typical && prop.typical <= prop.max, "{} {}", profile.name, prop.key);
                assert!(SynonymTable::builtin().entry(&prop.key).is_some(), "{}", prop.key);
            }
        }
        assert!(lib.of_kind(ProfileKind::Feedstock).count() >= 10);
        assert!(lib.of_kind(ProfileKind::BiogasSource).count() >= 4);
        assert!(lib.of_kind(ProfileKind::OutputSpec).count() >= 4);
    }

    #[test]
    fn test_spec_limit() {
        let min = SpecLimit::min("ch4", 96.0, "%", "tariff");
        assert!(min.is_met(97.0));
        assert!(!min.is_met(95.9));
        let max = SpecLimit::max("h2s", 4.0, "ppmv", "tariff");
        assert!(max.is_met(4.0));
        assert!(!max.is_met(4.1));
    }
}
