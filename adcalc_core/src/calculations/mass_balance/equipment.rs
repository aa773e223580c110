//! Equipment list builders.
//!
//! One builder per stage. Builders read only the stage's sizing struct, so
//! the equipment list and the stage narrative always agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stages::{
    ConditioningSizing, DafSizing, DepackagingSizing, DigesterSizing, EqualizationSizing, PreparationSizing,
    ReceivingSizing, SeparationSizing, StageType, UpgradingSizing,
};
use super::stream::StreamParameter;
use crate::calculations::slug_id;
use crate::units::{QuantityKind, MINUTES_PER_DAY};

/// One line of the equipment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    /// Stable slug of process area and equipment type
    pub id: String,
    pub process_area: String,
    pub equipment_type: String,
    pub description: String,
    pub quantity: u32,
    pub specs: BTreeMap<String, StreamParameter>,
    pub design_basis: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub is_locked: bool,
}

impl EquipmentItem {
    fn new(area: StageType, equipment_type: &str, description: &str, quantity: u32) -> Self {
        EquipmentItem {
            id: slug_id(area.display_name(), equipment_type),
            process_area: area.display_name().to_string(),
            equipment_type: equipment_type.to_string(),
            description: description.to_string(),
            quantity,
            specs: BTreeMap::new(),
            design_basis: String::new(),
            notes: String::new(),
            is_overridden: false,
            is_locked: false,
        }
    }

    fn spec(mut self, key: &str, value: f64, unit: &str, kind: QuantityKind) -> Self {
        self.specs.insert(key.to_string(), StreamParameter::new(value, unit, kind));
        self
    }

    fn basis(mut self, basis: impl Into<String>) -> Self {
        self.design_basis = basis.into();
        self
    }

    fn note(mut self, note: impl Into<String>) -> Self {
        self.notes = note.into();
        self
    }
}

pub fn receiving(s: &ReceivingSizing) -> Vec<EquipmentItem> {
    let gpm = s.flow_gpd / MINUTES_PER_DAY;
    vec![
        EquipmentItem::new(StageType::Receiving, "Receiving Storage Tank", "Covered as-received feed storage", 1)
            .spec("volume", s.storage_volume.0, "gal", QuantityKind::Volume)
            .spec("storageTime", s.storage_days, "days", QuantityKind::Time)
            .basis(format!("{:.1} days at {:.0} gal/day", s.storage_days, s.flow_gpd)),
        EquipmentItem::new(StageType::Receiving, "Feed Transfer Pump", "Chopper pump to preparation", 2)
            .spec("capacity", gpm, "gpm", QuantityKind::LiquidFlowGpm)
            .basis("Average feed flow")
            .note("1 duty, 1 standby"),
    ]
}

pub fn depackaging(s: &DepackagingSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(StageType::Depackaging, "Depackaging Unit", "Hammer-mill depackager with screen", 1)
            .spec("capacity", s.capacity_tph, "tons/hr", QuantityKind::MassFlowTph)
            .spec("rejects", s.rejects_tpd, "tons/day", QuantityKind::MassFlowTpd)
            .basis(format!(
                "{:.1} tons/day packaged feed over {:.0} h/day",
                s.packaged_tpd, s.hours_per_day
            )),
    ]
}

pub fn preparation(s: &PreparationSizing) -> Vec<EquipmentItem> {
    let mut items = vec![EquipmentItem::new(
        StageType::Preparation,
        "Macerator",
        "Inline grinder for particle size reduction",
        1,
    )
    .spec("capacity", s.feed_tpd, "tons/day", QuantityKind::MassFlowTpd)
    .basis("Prepared feed flow")];
    if s.dilution_water.0 > 0.0 {
        items.push(
            EquipmentItem::new(StageType::Preparation, "Dilution Water Pump", "Process water to feed blending", 1)
                .spec("capacity", s.dilution_water.gpm(), "gpm", QuantityKind::LiquidFlowGpm)
                .basis(format!("Dilution to {:.1}% TS", s.output_ts_pct)),
        );
    }
    items
}

pub fn equalization(s: &EqualizationSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(StageType::Equalization, "Equalization Tank", "Mixed feed equalization tank", 1)
            .spec("volume", s.volume.0, "gal", QuantityKind::Volume)
            .spec("hrt", s.hrt_days, "days", QuantityKind::Time)
            .basis(format!("{:.1} days at {:.0} gal/day", s.hrt_days, s.flow_gpd)),
        EquipmentItem::new(StageType::Equalization, "Equalization Mixer", "Submersible mixer", 1)
            .basis("One per equalization tank"),
    ]
}

pub fn digestion(s: &DigesterSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(
            StageType::Digestion,
            "Anaerobic Digester",
            "Complete-mix mesophilic digester tank",
            s.unit_count,
        )
        .spec("unitVolume", s.unit_volume.0, "gal", QuantityKind::Volume)
        .spec("totalVolume", s.total_volume.0, "gal", QuantityKind::Volume)
        .spec("workingVolume", s.working_volume.0, "gal", QuantityKind::Volume)
        .basis(format!(
            "{} governs ({:.0} gal HRT vs {:.0} gal OLR) plus headspace",
            s.governing, s.hrt_volume.0, s.olr_volume.0
        )),
        EquipmentItem::new(StageType::Digestion, "Digester Mixing System", "Mechanical draft-tube mixers", s.unit_count)
            .spec("power", s.mixing_hp_per_unit, "hp", QuantityKind::Power)
            .basis("Power density applied to unit volume"),
        EquipmentItem::new(StageType::Digestion, "Gas Storage Membrane", "Dual-membrane gas holder", 1)
            .spec("volume", s.gas_storage.0, "ft3", QuantityKind::Volume)
            .basis(format!("Storage at {:.1} SCFM biogas", s.biogas.0)),
        EquipmentItem::new(StageType::Digestion, "Waste Gas Flare", "Enclosed emergency flare", 1)
            .spec("capacity", s.biogas.0, "SCFM", QuantityKind::GasFlow)
            .basis("Full biogas production"),
    ]
}

pub fn solids_separation(s: &SeparationSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(
            StageType::SolidsSeparation,
            "Dewatering Centrifuge",
            "Decanter centrifuge for digestate",
            s.unit_count,
        )
        .spec("capacity", s.unit_capacity_gpm, "gpm", QuantityKind::LiquidFlowGpm)
        .spec("feed", s.feed.gpm(), "gpm", QuantityKind::LiquidFlowGpm)
        .spec("cake", s.cake_wet_tpd, "tons/day", QuantityKind::MassFlowTpd)
        .basis(format!("{:.1} dry tons/day captured", s.dry_solids_tpd)),
        EquipmentItem::new(StageType::SolidsSeparation, "Polymer Feed System", "Emulsion polymer make-down", 1)
            .spec("polymer", s.polymer_lb_per_day, "lb/day", QuantityKind::MassLbPerDay)
            .basis("Polymer dose per dry ton"),
    ]
}

pub fn liquid_polishing(s: &DafSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(StageType::LiquidPolishing, "Dissolved Air Flotation Unit", "DAF with recycle pressurization", 1)
            .spec("surfaceArea", s.surface_area_ft2, "ft2", QuantityKind::Area)
            .spec("flow", s.flow_gpm, "gpm", QuantityKind::LiquidFlowGpm)
            .basis(format!("{:.1} gpm/ft2 hydraulic loading", s.hydraulic_loading)),
        EquipmentItem::new(StageType::LiquidPolishing, "Float Return Pump", "Float recycle to digestion", 2)
            .spec("capacity", s.float.gpm(), "gpm", QuantityKind::LiquidFlowGpm)
            .spec("solids", s.float_solids.0, "lb/day", QuantityKind::MassLbPerDay)
            .basis("DAF float flow")
            .note("1 duty, 1 standby"),
    ]
}

pub fn gas_conditioning(s: &ConditioningSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(StageType::GasConditioning, "H2S Removal Vessel", "Iron-oxide media vessel", 2)
            .spec("flow", s.inlet.0, "SCFM", QuantityKind::GasFlow)
            .spec("inletH2s", s.inlet_h2s_ppmv, "ppmv", QuantityKind::Concentration)
            .spec("h2sRemoved", s.h2s_removed.0, "lb/day", QuantityKind::MassLbPerDay)
            .basis("Raw biogas flow and H2S load")
            .note("Lead/lag arrangement"),
        EquipmentItem::new(StageType::GasConditioning, "Gas Chiller", "Chiller and reheater for moisture removal", 1)
            .spec("flow", s.inlet.0, "SCFM", QuantityKind::GasFlow)
            .basis("Raw biogas flow"),
        EquipmentItem::new(StageType::GasConditioning, "Biogas Blower", "Positive-displacement blower", 2)
            .spec("capacity", s.outlet.0, "SCFM", QuantityKind::GasFlow)
            .basis("Conditioned gas flow")
            .note("1 duty, 1 standby"),
    ]
}

pub fn gas_upgrading(s: &UpgradingSizing) -> Vec<EquipmentItem> {
    vec![
        EquipmentItem::new(StageType::GasUpgrading, "Membrane Upgrading Skid", "Three-stage membrane separation", s.skid_count)
            .spec("skidCapacity", s.skid_capacity_scfm, "SCFM", QuantityKind::GasFlow)
            .spec("inletFlow", s.inlet.0, "SCFM", QuantityKind::GasFlow)
            .spec("productFlow", s.product.0, "SCFM", QuantityKind::GasFlow)
            .basis("Conditioned gas flow over skid capacity"),
        EquipmentItem::new(StageType::GasUpgrading, "Tail Gas Thermal Oxidizer", "Regenerative thermal oxidizer", 1)
            .spec("capacity", s.tail_gas.0, "SCFM", QuantityKind::GasFlow)
            .basis("Membrane permeate flow"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{CubicFeet, Gallons, LbPerDay, Scfm};

    #[test]
    fn test_digester_equipment_reuses_sizing() {
        let sizing = DigesterSizing {
            hrt_volume: Gallons(1_000_000.0),
            olr_volume: Gallons(800_000.0),
            working_volume: Gallons(1_000_000.0),
            total_volume: Gallons(1_100_000.0),
            governing: "HRT",
            unit_count: 1,
            unit_volume: Gallons(1_100_000.0),
            vs_load_kg_per_day: 10_000.0,
            vs_destroyed: LbPerDay(13_000.0),
            biogas: Scfm(450.0),
            gas_storage: CubicFeet(108_000.0),
            mixing_hp_per_unit: 29.4,
        };
        let items = digestion(&sizing);
        let digester = items.iter().find(|i| i.equipment_type == "Anaerobic Digester").unwrap();
        assert_eq!(digester.id, "anaerobic-digestion-anaerobic-digester");
        assert_eq!(digester.specs["unitVolume"].value, 1_100_000.0);
        assert_eq!(digester.quantity, 1);
        let flare = items.iter().find(|i| i.equipment_type == "Waste Gas Flare").unwrap();
        assert_eq!(flare.specs["capacity"].value, 450.0);
    }

    #[test]
    fn test_dilution_pump_only_when_diluting() {
        let dry = PreparationSizing {
            feed_tpd: 100.0,
            dilution_water: crate::units::GalPerDay(0.0),
            output_ts_pct: 10.0,
        };
        assert_eq!(preparation(&dry).len(), 1);
        let wet = PreparationSizing {
            dilution_water: crate::units::GalPerDay(5_000.0),
            ..dry
        };
        assert_eq!(preparation(&wet).len(), 2);
    }

    #[test]
    fn test_capacity_units_round_by_their_own_kind() {
        let depack = depackaging(&DepackagingSizing {
            packaged_tpd: 20.1,
            rejects_tpd: 4.02,
            hours_per_day: 16.0,
            capacity_tph: 1.25625,
        });
        // tons/hr keeps two decimals; tons/day keeps one
        assert_eq!(depack[0].specs["capacity"].value, 1.26);
        assert_eq!(depack[0].specs["rejects"].value, 4.0);

        let daf = liquid_polishing(&DafSizing {
            flow_gpm: 176.44,
            surface_area_ft2: 88.22,
            hydraulic_loading: 2.0,
            float: crate::units::GalPerDay(14_400.0),
            float_solids: LbPerDay(4_803.7),
        });
        assert_eq!(daf[0].specs["surfaceArea"].value, 88.0);
        assert_eq!(daf[0].specs["flow"].value, 176.4);
        assert_eq!(daf[1].specs["capacity"].value, 10.0);
    }
}
