use adcalc_core::calculations::mass_balance::StageType;
use adcalc_core::calculations::{capex, mass_balance, opex};
use adcalc_core::library::PropertySpec;
use adcalc_core::overrides::{self, field_state, FieldEdit, FieldState};
use adcalc_core::project::{FeedstockEntry, Project, ProjectInputs, ProjectType, Scenario};
use adcalc_core::{CalcError, EngineConfig, ReferenceLibrary, Severity};

fn codigestion() -> ProjectInputs {
    let mut inputs = ProjectInputs::new(ProjectType::Hybrid)
        .with_feedstock(
            FeedstockEntry::new("Grocery returns", "30", "tons/day").with_type("packaged food waste"),
        )
        .with_feedstock(
            FeedstockEntry::new("Cafeteria scraps", "1,400 tons/week", "")
                .with_type("food waste")
                .with_property("TS", PropertySpec::number(22.0, "%")),
        )
        .with_feedstock(FeedstockEntry::new("Dairy Manure", "150", "tpd"));
    inputs.interconnect_distance_miles = Some(2.5);
    inputs
}

#[test]
fn full_chain_produces_consistent_documents() {
    let config = EngineConfig::default();
    let inputs = codigestion();

    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design).unwrap();
    assert!(!mb.has_fatal_warning());
    assert!(mb.stage(StageType::Depackaging).is_some());
    assert!((mb.summary_value("totalFeedTpd").unwrap() - 380.0).abs() < 0.05);
    assert_eq!(mb.feedstocks.len(), 3);

    let cx = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex).unwrap();
    let lateral = cx.line_item("interconnect-pipeline-lateral").unwrap();
    assert_eq!(lateral.total_cost, 3_000_000.0);
    let subtotal_sum: f64 = cx.summary.subtotals.values().sum();
    assert!((subtotal_sum - cx.summary.total_project_cost).abs() < 1e-6);

    let ox = opex::calculate(&mb, &cx, &config.opex).unwrap();
    assert!(ox.line_item("disposal-depackaging-rejects-disposal").is_some());
    assert!(ox.summary.total_revenue_offsets < 0.0);
    assert_eq!(ox.cost_year, cx.cost_year);

    let json = serde_json::to_value(&ox).unwrap();
    assert!(json["summary"]["netAnnualOpex"].is_number());
}

#[test]
fn wastewater_projects_are_routed_elsewhere() {
    let inputs = ProjectInputs::new(ProjectType::WastewaterTreatment)
        .with_feedstock(FeedstockEntry::new("Primary sludge", "100", "tons/day"));
    let err = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &EngineConfig::default().design)
        .unwrap_err();
    match &err {
        CalcError::UnsupportedProjectType { alternative, .. } => assert!(alternative.contains("AI-based")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.is_deterministic());
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["type"], "UnsupportedProjectType");
}

#[test]
fn oversized_project_fails_capex_with_capacity_error() {
    let config = EngineConfig::default();
    let inputs = ProjectInputs::new(ProjectType::Greenfield)
        .with_feedstock(FeedstockEntry::new("Food Waste", "600", "tons/day"));
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design).unwrap();
    assert!(mb.summary_value("biogasFlowScfm").unwrap() > 1_200.0);
    let err = capex::calculate(&mb, None, &config.capex).unwrap_err();
    assert_eq!(err.error_code(), "CAPACITY_EXCEEDED");
}

#[test]
fn zero_feed_degrades_and_capex_reports_missing_driver() {
    let config = EngineConfig::default();
    let inputs = ProjectInputs::new(ProjectType::Greenfield)
        .with_feedstock(FeedstockEntry::new("Food Waste", "not measured", "tons/day"));
    let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design).unwrap();
    assert!(mb.is_empty());
    assert!(mb.warnings.iter().any(|w| w.severity == Severity::Error));
    let err = capex::calculate(&mb, None, &config.capex).unwrap_err();
    assert_eq!(err.error_code(), "SIZING_DRIVER_NOT_FOUND");
}

#[test]
fn scenario_recalculation_keeps_locked_fields() {
    let config = EngineConfig::default();
    let library = ReferenceLibrary::builtin();
    let mut project = Project::new("Jane Engineer", "25-042", "County Organics");
    let id = project.add_scenario(Scenario::new("Base case", codigestion()));

    let scenario = project.scenario_mut(&id).unwrap();
    scenario.recalculate(library, &config).unwrap();

    let path = "lineItems.other-laboratory-and-testing.annualCost";
    let unlocked = "lineItems.labor-plant-management.annualCost";
    let stored = scenario.opex.as_mut().unwrap();
    overrides::edit(&mut stored.result, &mut stored.overrides, path, FieldEdit::new(90_000.0).by("pm")).unwrap();
    overrides::lock(&mut stored.result, &mut stored.overrides, path, "pm").unwrap();
    overrides::edit(&mut stored.result, &mut stored.overrides, unlocked, FieldEdit::new(1.0)).unwrap();
    assert_eq!(field_state(&stored.overrides, path), FieldState::Locked);
    assert_eq!(field_state(&stored.overrides, unlocked), FieldState::Overridden);

    scenario.inputs.feedstocks[2].quantity = "250".to_string();
    scenario.recalculate(library, &config).unwrap();

    let stored = scenario.opex.as_ref().unwrap();
    let lab = stored.result.line_item("other-laboratory-and-testing").unwrap();
    assert_eq!(lab.annual_cost, 90_000.0);
    assert!(lab.is_locked);
    let management = stored.result.line_item("labor-plant-management").unwrap();
    assert_eq!(management.annual_cost, 130_000.0);
    assert!(!management.is_overridden);
    assert_eq!(field_state(&stored.overrides, unlocked), FieldState::Computed);

    let recomputed: f64 = stored
        .result
        .line_items
        .iter()
        .filter(|i| !i.category.is_offset())
        .map(|i| i.annual_cost)
        .sum();
    assert!((stored.result.summary.total_annual_opex - recomputed).abs() < 1e-6);
}

#[test]
fn component_edits_flow_into_line_totals() {
    let config = EngineConfig::default();
    let mut scenario = Scenario::new("Base case", codigestion());
    scenario.recalculate(ReferenceLibrary::builtin(), &config).unwrap();

    let stored = scenario.capex.as_mut().unwrap();
    let before = stored.result.summary.total_project_cost;
    let item = stored.result.line_item("equipment-major-equipment").unwrap().clone();
    let path = "lineItems.equipment-major-equipment.baseCost";
    overrides::edit(&mut stored.result, &mut stored.overrides, path, FieldEdit::new(1.0e9)).unwrap();

    let edited = stored.result.line_item("equipment-major-equipment").unwrap();
    let expected = 1.0e9 * item.installation_factor + item.contingency;
    assert!((edited.total_cost - expected).abs() < 1e-3);
    let moved = stored.result.summary.total_project_cost - before;
    assert!((moved - (expected - item.total_cost)).abs() < 1e-3);

    let stored = scenario.opex.as_mut().unwrap();
    let path = "lineItems.labor-plant-operators.unitCost";
    overrides::edit(&mut stored.result, &mut stored.overrides, path, FieldEdit::new(100_000.0)).unwrap();
    let operators = stored.result.line_item("labor-plant-operators").unwrap();
    assert_eq!(operators.annual_cost, operators.quantity * 100_000.0);
}

#[test]
fn index_paths_share_state_with_id_paths() {
    let config = EngineConfig::default();
    let mut scenario = Scenario::new("Base case", codigestion());
    scenario.recalculate(ReferenceLibrary::builtin(), &config).unwrap();

    let stored = scenario.opex.as_mut().unwrap();
    let id = stored.result.line_items[1].id.clone();
    let by_id = format!("lineItems.{}.annualCost", id);
    overrides::edit(&mut stored.result, &mut stored.overrides, "lineItems.1.annualCost", FieldEdit::new(55_000.0))
        .unwrap();
    overrides::lock(&mut stored.result, &mut stored.overrides, "lineItems.1.annualCost", "pm").unwrap();
    assert_eq!(field_state(&stored.overrides, &by_id), FieldState::Locked);
    assert!(stored.result.line_items[1].is_locked);

    scenario.inputs.feedstocks[2].quantity = "250".to_string();
    scenario.recalculate(ReferenceLibrary::builtin(), &config).unwrap();
    let item = scenario.opex.as_ref().unwrap().result.line_item(&id).unwrap();
    assert_eq!(item.annual_cost, 55_000.0);
    assert!(item.is_locked);
    assert!(item.is_overridden);
}

#[test]
fn failed_recalculation_marks_downstream_results_stale() {
    let config = EngineConfig::default();
    let library = ReferenceLibrary::builtin();
    let mut scenario = Scenario::new("Base case", codigestion());
    scenario.recalculate(library, &config).unwrap();

    let path = "lineItems.other-laboratory-and-testing.annualCost";
    let stored = scenario.opex.as_mut().unwrap();
    overrides::edit(&mut stored.result, &mut stored.overrides, path, FieldEdit::new(90_000.0)).unwrap();
    overrides::lock(&mut stored.result, &mut stored.overrides, path, "pm").unwrap();

    let saved = scenario.inputs.clone();
    for feedstock in &mut scenario.inputs.feedstocks {
        feedstock.quantity = "not measured".to_string();
    }
    let err = scenario.recalculate(library, &config).unwrap_err();
    assert_eq!(err.error_code(), "SIZING_DRIVER_NOT_FOUND");

    assert!(scenario.current_mass_balance().unwrap().is_empty());
    assert!(scenario.capex.as_ref().unwrap().stale);
    assert!(scenario.opex.as_ref().unwrap().stale);
    assert!(scenario.current_capex().is_none());
    assert!(scenario.current_opex().is_none());
    assert_eq!(field_state(&scenario.opex.as_ref().unwrap().overrides, path), FieldState::Locked);

    scenario.inputs = saved;
    scenario.recalculate(library, &config).unwrap();
    let ox = scenario.current_opex().unwrap();
    assert_eq!(ox.line_item("other-laboratory-and-testing").unwrap().annual_cost, 90_000.0);
    assert!(scenario.current_capex().is_some());
}

#[test]
fn project_default_output_spec_reaches_mass_balance() {
    let config = EngineConfig::default();
    let mut project = Project::new("Jane Engineer", "25-042", "County Organics");
    project.settings.default_output_spec = "CNG Vehicle Fuel".to_string();
    let id = project.add_scenario(Scenario::new("Base case", codigestion()));
    project
        .recalculate_scenario(&id, ReferenceLibrary::builtin(), &config)
        .unwrap();
    let mb = project.scenario(&id).unwrap().current_mass_balance().unwrap();
    assert_eq!(mb.output_spec, "CNG Vehicle Fuel");
}

#[test]
fn project_round_trips_through_json() {
    let config = EngineConfig::default();
    let mut project = Project::new("Jane Engineer", "25-042", "County Organics");
    let id = project.add_scenario(Scenario::new("Base case", codigestion()));
    project
        .scenario_mut(&id)
        .unwrap()
        .recalculate(ReferenceLibrary::builtin(), &config)
        .unwrap();

    let json = serde_json::to_string(&project).unwrap();
    let back: Project = serde_json::from_str(&json).unwrap();
    assert_eq!(back.scenario_count(), 1);
    let (original, restored) = (project.scenario(&id).unwrap(), back.scenario(&id).unwrap());
    assert_eq!(restored.inputs, original.inputs);
    let cost = |s: &Scenario| s.capex.as_ref().map(|c| c.result.summary.total_project_cost).unwrap_or(0.0);
    assert!((cost(restored) - cost(original)).abs() < 1e-3);
    assert_eq!(
        restored.mass_balance.as_ref().map(|m| m.result.equipment.len()),
        original.mass_balance.as_ref().map(|m| m.result.equipment.len())
    );
}
