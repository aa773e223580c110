//! # Overrides and Locks
//!
//! User edits to result documents, and the rules for keeping them when a
//! result is regenerated.
//!
//! Each field path moves through three states:
//!
//! ```text
//! Computed --edit--> Overridden --lock--> Locked
//!     |                                   ^  |
//!     +--------------lock-----------------+  +--unlock--> Overridden
//! ```
//!
//! Locking a computed field captures its current value as the override.
//! On [`regenerate`], locked overrides are written over the fresh result and
//! every unlocked override is discarded.
//!
//! ## Field paths
//!
//! Dotted camelCase paths into the serialized document. A segment after an
//! array selects the element whose `id` matches (or a numeric index):
//!
//! - `summary.totalAnnualOpex`
//! - `lineItems.labor-plant-operators.annualCost`
//! - `equipment.anaerobic-digestion-anaerobic-digester.quantity`
//!
//! Writing a bare number to a `{ value, unit }` object updates its `value`.
//! Paths are stored with array elements named by their `id`, so
//! `lineItems.0.annualCost` is recorded as `lineItems.<id>.annualCost`.
//!
//! Editing a line-item component (`baseCost`, `quantity`, ...) re-derives
//! that item's total before the summary is recomputed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::calculations::capex::{self, CapexResult};
use crate::calculations::mass_balance::MassBalanceResult;
use crate::calculations::opex::OpexResult;
use crate::errors::{CalcError, CalcResult};

/// Arrays whose elements carry `isOverridden` / `isLocked` flags
const FLAGGED_ARRAYS: [&str; 2] = ["lineItems", "equipment"];

// ============================================================================
// Records
// ============================================================================

/// A user-supplied value replacing a computed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub overridden_by: String,
    #[serde(default)]
    pub reason: String,
    /// Computed value before the first edit
    pub original_value: Value,
    pub overridden_at: DateTime<Utc>,
}

/// Overrides and locks stored alongside one result document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default)]
    pub overrides: BTreeMap<String, Override>,
    #[serde(default)]
    pub locks: BTreeMap<String, bool>,
}

impl OverrideSet {
    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.get(path).copied().unwrap_or(false)
    }

    pub fn get(&self, path: &str) -> Option<&Override> {
        self.overrides.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && !self.locks.values().any(|l| *l)
    }

    fn touches_element(&self, array: &str, id: &str) -> (bool, bool) {
        let prefix = format!("{}.{}.", array, id);
        let overridden = self.overrides.keys().any(|p| p.starts_with(&prefix));
        let locked = self
            .locks
            .iter()
            .any(|(p, locked)| *locked && p.starts_with(&prefix));
        (overridden, locked)
    }
}

/// Where a field path stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    Computed,
    Overridden,
    Locked,
}

pub fn field_state(set: &OverrideSet, path: &str) -> FieldState {
    if set.is_locked(path) {
        FieldState::Locked
    } else if set.overrides.contains_key(path) {
        FieldState::Overridden
    } else {
        FieldState::Computed
    }
}

/// An edit to apply with [`edit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub value: Value,
    pub unit: Option<String>,
    pub overridden_by: String,
    pub reason: String,
}

impl FieldEdit {
    pub fn new(value: impl Into<Value>) -> Self {
        FieldEdit {
            value: value.into(),
            unit: None,
            overridden_by: "user".to_string(),
            reason: String::new(),
        }
    }

    pub fn by(mut self, who: impl Into<String>) -> Self {
        self.overridden_by = who.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

// ============================================================================
// Recomputable Results
// ============================================================================

/// A result document whose summary is derived from its line items.
pub trait RecomputableResult: Serialize + DeserializeOwned {
    /// Editing this path changes the summary
    fn is_cost_field(path: &str) -> bool;

    /// A line-item field the item's total is derived from
    fn is_component_field(_path: &str) -> bool {
        false
    }

    /// Re-derive one line item's total from its components
    fn rederive_line_item(&mut self, _id: &str) {}

    /// Re-derive the summary from current line items
    fn recompute_summary(&mut self);
}

/// The `<id>` of a `lineItems.<id>.<field>` path
fn line_item_id(path: &str) -> Option<&str> {
    let mut segments = path.split('.');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some("lineItems"), Some(id), Some(_), None) => Some(id),
        _ => None,
    }
}

fn is_line_item_field(path: &str, fields: &[&str]) -> bool {
    line_item_id(path).is_some() && path.rsplit('.').next().is_some_and(|f| fields.contains(&f))
}

const CAPEX_COMPONENTS: [&str; 3] = ["baseCost", "installationFactor", "contingency"];
const OPEX_COMPONENTS: [&str; 2] = ["quantity", "unitCost"];

impl RecomputableResult for MassBalanceResult {
    fn is_cost_field(_path: &str) -> bool {
        false
    }

    /// The summary is a view of stream values, not of equipment
    fn recompute_summary(&mut self) {}
}

impl RecomputableResult for CapexResult {
    fn is_cost_field(path: &str) -> bool {
        is_line_item_field(path, &["totalCost", "itcEligible", "category"]) || Self::is_component_field(path)
    }

    fn is_component_field(path: &str) -> bool {
        is_line_item_field(path, &CAPEX_COMPONENTS)
    }

    fn rederive_line_item(&mut self, id: &str) {
        if let Some(item) = self.line_items.iter_mut().find(|i| i.id == id) {
            item.total_cost = item.derived_total();
        }
    }

    fn recompute_summary(&mut self) {
        capex::recompute_summary(self);
    }
}

impl RecomputableResult for OpexResult {
    fn is_cost_field(path: &str) -> bool {
        is_line_item_field(path, &["annualCost", "category"]) || Self::is_component_field(path)
    }

    fn is_component_field(path: &str) -> bool {
        is_line_item_field(path, &OPEX_COMPONENTS)
    }

    fn rederive_line_item(&mut self, id: &str) {
        if let Some(item) = self.line_items.iter_mut().find(|i| i.id == id) {
            item.annual_cost = item.derived_annual_cost();
        }
    }

    fn recompute_summary(&mut self) {
        OpexResult::recompute_summary(self);
    }
}

// ============================================================================
// Document Access
// ============================================================================

fn to_doc<T: Serialize>(result: &T) -> CalcResult<Value> {
    serde_json::to_value(result).map_err(CalcError::serialization)
}

fn from_doc<T: DeserializeOwned>(doc: Value, path: &str) -> CalcResult<T> {
    serde_json::from_value(doc).map_err(|e| CalcError::invalid_field_path(path, e.to_string()))
}

/// A field path resolved against one document
struct Location {
    /// JSON pointer, array elements by index
    pointer: String,
    /// Dotted path, array elements by `id` where they carry one
    path: String,
}

fn locate(doc: &Value, path: &str) -> CalcResult<Location> {
    if path.trim().is_empty() {
        return Err(CalcError::invalid_field_path(path, "empty path"));
    }
    let mut pointer = String::new();
    let mut canonical: Vec<String> = Vec::new();
    let mut current = doc;
    for segment in path.split('.') {
        let (token, next) = match current {
            Value::Object(map) => {
                let next = map
                    .get(segment)
                    .ok_or_else(|| CalcError::invalid_field_path(path, format!("no field '{}'", segment)))?;
                canonical.push(segment.to_string());
                (segment.replace('~', "~0").replace('/', "~1"), next)
            }
            Value::Array(items) => {
                let index = items
                    .iter()
                    .position(|item| item.get("id").and_then(Value::as_str) == Some(segment))
                    .or_else(|| segment.parse::<usize>().ok().filter(|i| *i < items.len()))
                    .ok_or_else(|| {
                        CalcError::invalid_field_path(path, format!("no element with id '{}'", segment))
                    })?;
                let element = &items[index];
                let key = element
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                canonical.push(key);
                (index.to_string(), element)
            }
            _ => {
                return Err(CalcError::invalid_field_path(
                    path,
                    format!("cannot descend into '{}'", segment),
                ))
            }
        };
        pointer.push('/');
        pointer.push_str(&token);
        current = next;
    }
    Ok(Location {
        pointer,
        path: canonical.join("."),
    })
}

/// The field and its id-keyed path
fn resolve<'a>(doc: &'a mut Value, path: &str) -> CalcResult<(String, &'a mut Value)> {
    let Location { pointer, path: canonical } = locate(doc, path)?;
    let target = doc
        .pointer_mut(&pointer)
        .ok_or_else(|| CalcError::invalid_field_path(path, "field disappeared during lookup"))?;
    Ok((canonical, target))
}

/// The stored form of `path`: array elements named by their `id`.
///
/// # Errors
///
/// `InvalidFieldPath` when the path does not exist in `result`.
pub fn canonical_path<T: Serialize>(result: &T, path: &str) -> CalcResult<String> {
    let doc = to_doc(result)?;
    Ok(locate(&doc, path)?.path)
}

/// The value a user sees for this field
fn displayed(target: &Value) -> Value {
    match target {
        Value::Object(map) if map.contains_key("value") => map.get("value").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn write(target: &mut Value, value: Value) {
    match target {
        Value::Object(map) if map.contains_key("value") && !value.is_object() => {
            map.insert("value".to_string(), value);
        }
        _ => *target = value,
    }
}

fn sync_flags(doc: &mut Value, set: &OverrideSet) {
    for array in FLAGGED_ARRAYS {
        let Some(Value::Array(items)) = doc.get_mut(array) else {
            continue;
        };
        for item in items.iter_mut() {
            let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let (overridden, locked) = set.touches_element(array, &id);
            if let Value::Object(map) = item {
                map.insert("isOverridden".to_string(), Value::Bool(overridden));
                map.insert("isLocked".to_string(), Value::Bool(locked));
            }
        }
    }
}

fn is_summary_path(path: &str) -> bool {
    path == "summary" || path.starts_with("summary.")
}

/// Write every locked override selected by `include` into `result`.
fn apply_locked<T: RecomputableResult>(
    result: &T,
    set: &OverrideSet,
    include: impl Fn(&str) -> bool,
) -> CalcResult<T> {
    let mut doc = to_doc(result)?;
    for (path, record) in &set.overrides {
        if !set.is_locked(path) || !include(path) {
            continue;
        }
        match resolve(&mut doc, path) {
            Ok((_, target)) => write(target, record.value.clone()),
            Err(e) => warn!(path = %path, error = %e, "locked field missing from regenerated result"),
        }
    }
    sync_flags(&mut doc, set);
    from_doc(doc, "")
}

// ============================================================================
// Operations
// ============================================================================

/// Overwrite a field with a user value.
///
/// A line-item cost edit recomputes the summary, after which locked summary
/// overrides are re-applied. A component edit first re-derives the item's
/// total. A summary edit touches only that field.
/// The result and the set are left unchanged on error.
///
/// # Errors
///
/// `InvalidFieldPath` when the path does not exist or the value does not
/// fit the field's type.
pub fn edit<T: RecomputableResult>(
    result: &mut T,
    set: &mut OverrideSet,
    path: &str,
    edit: FieldEdit,
) -> CalcResult<()> {
    let mut doc = to_doc(result)?;
    let (path, target) = resolve(&mut doc, path)?;
    let original_value = set
        .get(&path)
        .map(|o| o.original_value.clone())
        .unwrap_or_else(|| displayed(target));
    write(target, edit.value.clone());

    let mut pending = set.clone();
    pending.overrides.insert(
        path.clone(),
        Override {
            value: edit.value,
            unit: edit.unit,
            overridden_by: edit.overridden_by,
            reason: edit.reason,
            original_value,
            overridden_at: Utc::now(),
        },
    );
    sync_flags(&mut doc, &pending);
    let mut updated: T = from_doc(doc, &path)?;

    if T::is_cost_field(&path) {
        if let Some(id) = line_item_id(&path).filter(|_| T::is_component_field(&path)) {
            updated.rederive_line_item(id);
            updated = apply_locked(&updated, &pending, |p| !is_summary_path(p))?;
        }
        updated.recompute_summary();
        updated = apply_locked(&updated, &pending, is_summary_path)?;
    }
    debug!(path = %path, state = ?field_state(&pending, &path), "field edited");

    *result = updated;
    *set = pending;
    Ok(())
}

/// Protect a field from regeneration.
///
/// Without a prior edit the current value becomes the override.
pub fn lock<T: RecomputableResult>(result: &mut T, set: &mut OverrideSet, path: &str, by: &str) -> CalcResult<()> {
    let mut doc = to_doc(result)?;
    let (path, target) = resolve(&mut doc, path)?;

    let mut pending = set.clone();
    if !pending.overrides.contains_key(&path) {
        let current = displayed(target);
        pending.overrides.insert(
            path.clone(),
            Override {
                value: current.clone(),
                unit: None,
                overridden_by: by.to_string(),
                reason: "Locked at computed value".to_string(),
                original_value: current,
                overridden_at: Utc::now(),
            },
        );
    }
    pending.locks.insert(path.clone(), true);
    sync_flags(&mut doc, &pending);

    *result = from_doc(doc, &path)?;
    *set = pending;
    Ok(())
}

/// Allow a field to be replaced on the next regeneration.
///
/// The override stays in place until then.
pub fn unlock<T: RecomputableResult>(result: &mut T, set: &mut OverrideSet, path: &str) -> CalcResult<()> {
    let mut doc = to_doc(result)?;
    // A path already gone from the document can still be unlocked
    let path = locate(&doc, path).map(|l| l.path).unwrap_or_else(|_| path.to_string());
    let mut pending = set.clone();
    pending.locks.remove(&path);
    sync_flags(&mut doc, &pending);

    *result = from_doc(doc, &path)?;
    *set = pending;
    Ok(())
}

/// Merge a freshly computed result with the stored overrides.
///
/// Order: locked non-summary overrides, line totals of items with a locked
/// component, summary recompute, locked summary overrides. Unlocked
/// overrides are dropped from `set`.
pub fn regenerate<T: RecomputableResult>(fresh: T, set: &mut OverrideSet) -> CalcResult<T> {
    let OverrideSet { overrides, locks } = set;
    locks.retain(|_, locked| *locked);
    let before = overrides.len();
    overrides.retain(|path, _| locks.contains_key(path));
    let dropped = before - overrides.len();

    if set.overrides.is_empty() {
        let mut doc = to_doc(&fresh)?;
        sync_flags(&mut doc, set);
        return from_doc(doc, "");
    }

    let mut result = apply_locked(&fresh, set, |p| !is_summary_path(p))?;
    let mut rederived = false;
    for path in set.overrides.keys().filter(|p| T::is_component_field(p)) {
        if let Some(id) = line_item_id(path) {
            result.rederive_line_item(id);
            rederived = true;
        }
    }
    if rederived {
        // A locked total still wins over one derived from its components
        result = apply_locked(&result, set, |p| !is_summary_path(p) && !T::is_component_field(p))?;
    }
    result.recompute_summary();
    let result = apply_locked(&result, set, is_summary_path)?;
    debug!(kept = set.overrides.len(), dropped, "overrides re-applied");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::{capex, mass_balance, opex};
    use crate::config::EngineConfig;
    use crate::library::{PropertySpec, ReferenceLibrary};
    use crate::project::{FeedstockEntry, ProjectInputs, ProjectType};
    use serde_json::json;

    fn results(tpd: &str) -> (MassBalanceResult, CapexResult, OpexResult) {
        let config = EngineConfig::default();
        let inputs = ProjectInputs::new(ProjectType::Greenfield).with_feedstock(
            FeedstockEntry::new("Food Waste", tpd, "tons/day")
                .with_property("Total Solids", PropertySpec::number(18.0, "%")),
        );
        let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design).unwrap();
        let cx = capex::calculate(&mb, None, &config.capex).unwrap();
        let ox = opex::calculate(&mb, &cx, &config.opex).unwrap();
        (mb, cx, ox)
    }

    #[test]
    fn test_edit_line_item_recomputes_summary() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        let before = ox.summary.total_annual_opex;
        let lab = ox.line_item("other-laboratory-and-testing").unwrap().annual_cost;

        edit(&mut ox, &mut set, "lineItems.other-laboratory-and-testing.annualCost", FieldEdit::new(100_000.0)).unwrap();

        assert!((ox.summary.total_annual_opex - (before - lab + 100_000.0)).abs() < 1e-6);
        let item = ox.line_item("other-laboratory-and-testing").unwrap();
        assert!(item.is_overridden);
        assert!(!item.is_locked);
        assert_eq!(
            field_state(&set, "lineItems.other-laboratory-and-testing.annualCost"),
            FieldState::Overridden
        );
        assert_eq!(set.overrides["lineItems.other-laboratory-and-testing.annualCost"].original_value, json!(lab));
    }

    #[test]
    fn test_summary_edit_leaves_line_items() {
        let (_, _, mut ox) = results("150");
        let items = ox.line_items.clone();
        let mut set = OverrideSet::default();
        edit(&mut ox, &mut set, "summary.netAnnualOpex", FieldEdit::new(1.0).reason("budget")).unwrap();
        assert_eq!(ox.summary.net_annual_opex, 1.0);
        assert_eq!(ox.line_items, items);
    }

    #[test]
    fn test_lock_survives_regeneration() {
        let (_, mut cx, _) = results("150");
        let mut set = OverrideSet::default();
        let path = "lineItems.equipment-major-equipment.totalCost";
        edit(&mut cx, &mut set, path, FieldEdit::new(5_000_000.0)).unwrap();
        lock(&mut cx, &mut set, path, "engineer").unwrap();

        let (_, fresh, _) = results("200");
        let regenerated = regenerate(fresh, &mut set).unwrap();
        let item = regenerated.line_item("equipment-major-equipment").unwrap();
        assert_eq!(item.total_cost, 5_000_000.0);
        assert!(item.is_locked);
        assert_eq!(regenerated.summary.total_equipment_cost, 5_000_000.0);
    }

    #[test]
    fn test_unlock_then_regenerate_replaces_value() {
        let (_, mut cx, _) = results("150");
        let mut set = OverrideSet::default();
        let path = "lineItems.equipment-major-equipment.totalCost";
        edit(&mut cx, &mut set, path, FieldEdit::new(5_000_000.0)).unwrap();
        lock(&mut cx, &mut set, path, "engineer").unwrap();
        unlock(&mut cx, &mut set, path).unwrap();

        let (_, fresh, _) = results("150");
        let expected = fresh.line_item("equipment-major-equipment").unwrap().total_cost;
        let regenerated = regenerate(fresh, &mut set).unwrap();
        assert_eq!(regenerated.line_item("equipment-major-equipment").unwrap().total_cost, expected);
        assert!(set.overrides.is_empty());
        assert_eq!(field_state(&set, path), FieldState::Computed);
    }

    #[test]
    fn test_unlocked_override_discarded_on_regenerate() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        edit(&mut ox, &mut set, "summary.totalAnnualOpex", FieldEdit::new(1.0)).unwrap();
        let (_, _, fresh) = results("150");
        let expected = fresh.summary.total_annual_opex;
        let regenerated = regenerate(fresh, &mut set).unwrap();
        assert_eq!(regenerated.summary.total_annual_opex, expected);
    }

    #[test]
    fn test_lock_without_edit_captures_current_value() {
        let (mut mb, _, _) = results("150");
        let mut set = OverrideSet::default();
        let current = mb.summary_value("biogasFlowScfm").unwrap();
        lock(&mut mb, &mut set, "summary.biogasFlowScfm", "engineer").unwrap();
        assert_eq!(set.overrides["summary.biogasFlowScfm"].value, json!(current));

        let (fresh, _, _) = results("200");
        assert_ne!(fresh.summary_value("biogasFlowScfm"), Some(current));
        let regenerated = regenerate(fresh, &mut set).unwrap();
        assert_eq!(regenerated.summary_value("biogasFlowScfm"), Some(current));
    }

    #[test]
    fn test_locked_summary_survives_cost_edit() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        edit(&mut ox, &mut set, "summary.totalAnnualOpex", FieldEdit::new(42.0)).unwrap();
        lock(&mut ox, &mut set, "summary.totalAnnualOpex", "engineer").unwrap();
        edit(&mut ox, &mut set, "lineItems.other-laboratory-and-testing.annualCost", FieldEdit::new(0.0)).unwrap();
        assert_eq!(ox.summary.total_annual_opex, 42.0);
    }

    #[test]
    fn test_equipment_lock_sets_flag() {
        let (mut mb, _, _) = results("150");
        let mut set = OverrideSet::default();
        lock(&mut mb, &mut set, "equipment.anaerobic-digestion-anaerobic-digester.quantity", "engineer").unwrap();
        let digester = mb
            .equipment
            .iter()
            .find(|e| e.id == "anaerobic-digestion-anaerobic-digester")
            .unwrap();
        assert!(digester.is_locked);
        assert!(digester.is_overridden);
    }

    #[test]
    fn test_invalid_paths() {
        let (_, mut cx, _) = results("150");
        let mut set = OverrideSet::default();
        let before = cx.clone();
        for path in ["", "summary.noSuchField", "lineItems.unknown-item.totalCost", "currency.inner"] {
            let err = edit(&mut cx, &mut set, path, FieldEdit::new(1.0)).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_FIELD_PATH", "path {:?}", path);
        }
        let err = edit(&mut cx, &mut set, "summary.totalProjectCost", FieldEdit::new("lots")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FIELD_PATH");
        assert_eq!(cx, before);
        assert!(set.is_empty());
    }

    #[test]
    fn test_component_edit_rederives_item_total() {
        let (_, mut cx, _) = results("150");
        let mut set = OverrideSet::default();
        let item = cx.line_item("equipment-major-equipment").unwrap().clone();
        let before = cx.summary.total_project_cost;

        let path = "lineItems.equipment-major-equipment.baseCost";
        edit(&mut cx, &mut set, path, FieldEdit::new(2.0 * item.base_cost)).unwrap();

        let edited = cx.line_item("equipment-major-equipment").unwrap();
        let expected = 2.0 * item.base_cost * item.installation_factor + item.contingency;
        assert!((edited.total_cost - expected).abs() < 1e-6);
        assert!(edited.is_overridden);
        let delta = edited.total_cost - item.total_cost;
        assert!((cx.summary.total_project_cost - (before + delta)).abs() < 1e-3);
    }

    #[test]
    fn test_locked_total_wins_over_component_edit() {
        let (_, mut cx, _) = results("150");
        let mut set = OverrideSet::default();
        let total = "lineItems.equipment-major-equipment.totalCost";
        edit(&mut cx, &mut set, total, FieldEdit::new(5_000_000.0)).unwrap();
        lock(&mut cx, &mut set, total, "engineer").unwrap();
        edit(&mut cx, &mut set, "lineItems.equipment-major-equipment.installationFactor", FieldEdit::new(3.0)).unwrap();
        assert_eq!(cx.line_item("equipment-major-equipment").unwrap().total_cost, 5_000_000.0);
    }

    #[test]
    fn test_locked_quantity_survives_regeneration() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        let path = "lineItems.labor-plant-operators.quantity";
        edit(&mut ox, &mut set, path, FieldEdit::new(10.0)).unwrap();
        lock(&mut ox, &mut set, path, "engineer").unwrap();
        let operators = ox.line_item("labor-plant-operators").unwrap();
        assert_eq!(operators.annual_cost, 10.0 * operators.unit_cost);

        let (_, _, fresh) = results("200");
        let regenerated = regenerate(fresh, &mut set).unwrap();
        let operators = regenerated.line_item("labor-plant-operators").unwrap();
        assert_eq!(operators.quantity, 10.0);
        assert_eq!(operators.annual_cost, 10.0 * operators.unit_cost);
        assert!(operators.is_locked);
        let costs: f64 = regenerated
            .line_items
            .iter()
            .filter(|i| !i.category.is_offset())
            .map(|i| i.annual_cost)
            .sum();
        assert!((regenerated.summary.total_annual_opex - costs).abs() < 1e-6);
    }

    #[test]
    fn test_index_path_stored_by_id() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        let id = ox.line_items[0].id.clone();
        let by_id = format!("lineItems.{}.annualCost", id);

        assert_eq!(canonical_path(&ox, "lineItems.0.annualCost").unwrap(), by_id);
        edit(&mut ox, &mut set, "lineItems.0.annualCost", FieldEdit::new(12_345.0)).unwrap();
        assert!(set.overrides.contains_key(&by_id));
        assert!(!set.overrides.contains_key("lineItems.0.annualCost"));
        assert!(ox.line_items[0].is_overridden);

        lock(&mut ox, &mut set, "lineItems.0.annualCost", "engineer").unwrap();
        assert!(ox.line_items[0].is_locked);
        assert_eq!(field_state(&set, &by_id), FieldState::Locked);

        unlock(&mut ox, &mut set, "lineItems.0.annualCost").unwrap();
        assert!(!ox.line_items[0].is_locked);
        assert_eq!(field_state(&set, &by_id), FieldState::Overridden);
    }

    #[test]
    fn test_override_set_round_trips_json() {
        let (_, _, mut ox) = results("150");
        let mut set = OverrideSet::default();
        edit(&mut ox, &mut set, "summary.netAnnualOpex", FieldEdit::new(7.0).unit("USD/yr").by("pm")).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: OverrideSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
