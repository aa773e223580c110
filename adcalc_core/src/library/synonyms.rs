//! Property synonym table.
//!
//! Maps the arbitrary labels people put on lab results ("Total Solids (%)",
//! "VS/TS", "C:N ratio") onto canonical property keys.
//!
//! Resolution is deterministic:
//!
//! 1. Normalize the label: lowercase, alphanumerics only.
//! 2. Exact match against every normalized alias.
//! 3. Otherwise, the longest alias (normalized length >= 3) contained in the
//!    label wins. Equal lengths resolve by table order.
//!
//! Aliases shorter than three characters (`ts`, `vs`, `tp`, `cn`) only
//! ever match exactly; as substrings they hit too many unrelated words.

use once_cell::sync::Lazy;

/// Minimum normalized alias length used for substring matching
pub const MIN_CONTAINMENT_LEN: usize = 3;

/// Canonical key, display name, unit, aliases. Table order is the
/// tie-break order and the default display order of enriched properties.
const SYNONYM_TABLE: &[(&str, &str, &str, &[&str])] = &[
    (
        "total_solids",
        "Total Solids",
        "%",
        &["total solids", "ts", "%ts", "ts %", "dry matter", "dm", "solids content", "percent solids", "solids"],
    ),
    (
        "volatile_solids",
        "Volatile Solids",
        "% of TS",
        &["volatile solids", "vs", "vs/ts", "vs of ts", "organic matter", "organic dry matter", "volatile"],
    ),
    (
        "bmp",
        "Biochemical Methane Potential",
        "m3 CH4/kg VS",
        &["bmp", "biochemical methane potential", "methane potential", "methane yield", "ch4 yield", "specific methane yield"],
    ),
    (
        "c_n_ratio",
        "C:N Ratio",
        "ratio",
        &["c:n", "c/n", "c:n ratio", "cn ratio", "c to n", "carbon to nitrogen", "carbon nitrogen ratio", "carbon:nitrogen"],
    ),
    ("cod", "Chemical Oxygen Demand", "mg/L", &["cod", "chemical oxygen demand"]),
    (
        "tkn",
        "Total Kjeldahl Nitrogen",
        "mg/L",
        &["tkn", "total kjeldahl nitrogen", "kjeldahl nitrogen", "kjeldahl", "total nitrogen", "tn"],
    ),
    ("tp", "Total Phosphorus", "mg/L", &["tp", "total phosphorus", "phosphorus", "total p"]),
    ("tss", "Total Suspended Solids", "mg/L", &["tss", "total suspended solids", "suspended solids"]),
    ("ch4", "Methane", "%", &["ch4", "methane", "methane content", "ch4 content", "methane concentration"]),
    ("co2", "Carbon Dioxide", "%", &["co2", "carbon dioxide"]),
    ("h2s", "Hydrogen Sulfide", "ppmv", &["h2s", "hydrogen sulfide", "hydrogen sulphide", "sulfide"]),
    ("n2", "Nitrogen", "%", &["n2", "nitrogen gas"]),
    ("o2", "Oxygen", "%", &["o2", "oxygen"]),
    (
        "heating_value",
        "Heating Value",
        "Btu/scf",
        &["heating value", "btu", "btu/scf", "hhv", "higher heating value", "btu content"],
    ),
];

/// One canonical property key with its aliases
#[derive(Debug, Clone, PartialEq)]
pub struct SynonymEntry {
    pub key: &'static str,
    pub display_name: &'static str,
    pub unit: &'static str,
    /// Aliases in normalized form
    pub aliases: Vec<String>,
}

/// Compiled synonym table
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

static BUILTIN: Lazy<SynonymTable> = Lazy::new(|| {
    let entries = SYNONYM_TABLE
        .iter()
        .map(|(key, display_name, unit, aliases)| {
            let mut normalized: Vec<String> = Vec::new();
            for alias in aliases.iter().copied().chain(std::iter::once(*key)) {
                let alias = normalize_key(alias);
                if !normalized.contains(&alias) {
                    normalized.push(alias);
                }
            }
            SynonymEntry {
                key: *key,
                display_name: *display_name,
                unit: *unit,
                aliases: normalized,
            }
        })
        .collect();
    SynonymTable { entries }
});

/// Lowercase, keep ASCII alphanumerics only
pub fn normalize_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl SynonymTable {
    /// The built-in table
    pub fn builtin() -> &'static SynonymTable {
        &BUILTIN
    }

    pub fn entries(&self) -> &[SynonymEntry] {
        &self.entries
    }

    pub fn entry(&self, key: &str) -> Option<&SynonymEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Position of a canonical key in the table (display order)
    pub fn order_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    /// Resolve a free-text label to a canonical property key.
    pub fn resolve(&self, label: &str) -> Option<&'static str> {
        let normalized = normalize_key(label);
        if normalized.is_empty() {
            return None;
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.aliases.iter().any(|a| *a == normalized))
        {
            return Some(entry.key);
        }

        let mut best: Option<(usize, &'static str)> = None;
        for entry in &self.entries {
            for alias in &entry.aliases {
                if alias.len() < MIN_CONTAINMENT_LEN || !normalized.contains(alias.as_str()) {
                    continue;
                }
                // Strictly longer replaces; ties keep the earlier entry
                if best.map_or(true, |(len, _)| alias.len() > len) {
                    best = Some((alias.len(), entry.key));
                }
            }
        }
        best.map(|(_, key)| key)
    }
}

/// Resolve a label against the built-in table
pub fn resolve_property_key(label: &str) -> Option<&'static str> {
    SynonymTable::builtin().resolve(label)
}
