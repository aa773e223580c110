//! # Engine Configuration
//!
//! Every constant the calculators use lives here as plain data: design
//! criteria for each process stage, the capital cost tier table, and
//! operating cost rates. Calculators receive an [`EngineConfig`] by
//! reference, so a run can use a modified copy without touching any
//! shared state.
//!
//! All structs deserialize with `#[serde(default)]`, so an override file
//! only needs the values it changes.
//!
//! ## Example
//!
//! ```rust
//! use adcalc_core::config::EngineConfig;
//!
//! let mut config = EngineConfig::default();
//! config.design.digestion.hrt_days.value = 30.0;
//! assert_eq!(config.capex.tiers.len(), 3);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A read-only design value with its unit and literature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignCriterion {
    pub value: f64,
    pub unit: String,
    pub source: String,
}

impl DesignCriterion {
    pub fn new(value: f64, unit: &str, source: &str) -> Self {
        DesignCriterion {
            value,
            unit: unit.to_string(),
            source: source.to_string(),
        }
    }
}

fn criteria_map(entries: &[(&str, &DesignCriterion)]) -> BTreeMap<String, DesignCriterion> {
    entries
        .iter()
        .map(|(name, c)| (name.to_string(), (*c).clone()))
        .collect()
}

const WEF_MOP8: &str = "WEF MOP 8 (2018)";
const METCALF: &str = "Metcalf & Eddy, Wastewater Engineering 5th ed.";
const VENDOR: &str = "Typical vendor design data";
const GPSA: &str = "GPSA Engineering Data Book";

// ============================================================================
// Stage Design Criteria
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceivingCriteria {
    /// Days of as-received storage
    pub storage_days: DesignCriterion,
    /// Fraction of packaged feed rejected by depackaging
    pub depackaging_reject_rate: DesignCriterion,
    /// Depackager operating hours per day (single shift)
    pub depackager_hours_per_day: DesignCriterion,
}

impl Default for ReceivingCriteria {
    fn default() -> Self {
        ReceivingCriteria {
            storage_days: DesignCriterion::new(3.0, "days", VENDOR),
            depackaging_reject_rate: DesignCriterion::new(0.20, "fraction", VENDOR),
            depackager_hours_per_day: DesignCriterion::new(8.0, "h/d", VENDOR),
        }
    }
}

impl ReceivingCriteria {
    pub fn receiving_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[("storage_days", &self.storage_days)])
    }

    pub fn depackaging_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("depackaging_reject_rate", &self.depackaging_reject_rate),
            ("depackager_hours_per_day", &self.depackager_hours_per_day),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationCriteria {
    /// Maximum TS of the digester feed; wetter feed is not diluted
    pub target_feed_ts_pct: DesignCriterion,
}

impl Default for PreparationCriteria {
    fn default() -> Self {
        PreparationCriteria {
            target_feed_ts_pct: DesignCriterion::new(12.0, "%", WEF_MOP8),
        }
    }
}

impl PreparationCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[("target_feed_ts_pct", &self.target_feed_ts_pct)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizationCriteria {
    pub hrt_days: DesignCriterion,
}

impl Default for EqualizationCriteria {
    fn default() -> Self {
        EqualizationCriteria {
            hrt_days: DesignCriterion::new(1.0, "days", METCALF),
        }
    }
}

impl EqualizationCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[("hrt_days", &self.hrt_days)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestionCriteria {
    pub hrt_days: DesignCriterion,
    /// Organic loading rate (kg VS/m3/d)
    pub olr_kg_vs_per_m3_day: DesignCriterion,
    /// Gas headspace added on top of the working volume
    pub headspace_fraction: DesignCriterion,
    /// Fraction of VS fed that is destroyed
    pub vs_destruction: DesignCriterion,
    /// Fraction of laboratory BMP achieved at full scale
    pub bmp_realization: DesignCriterion,
    pub biogas_ch4_pct: DesignCriterion,
    pub biogas_co2_pct: DesignCriterion,
    pub biogas_h2s_ppmv: DesignCriterion,
    /// Largest single digester; above this, volume is split across units
    pub max_unit_volume_gal: DesignCriterion,
    pub gas_storage_hours: DesignCriterion,
    /// Mechanical mixing power density (hp per 1,000 ft3)
    pub mixing_hp_per_kcf: DesignCriterion,
}

impl Default for DigestionCriteria {
    fn default() -> Self {
        DigestionCriteria {
            hrt_days: DesignCriterion::new(25.0, "days", WEF_MOP8),
            olr_kg_vs_per_m3_day: DesignCriterion::new(3.0, "kg VS/m3/d", WEF_MOP8),
            headspace_fraction: DesignCriterion::new(0.10, "fraction", VENDOR),
            vs_destruction: DesignCriterion::new(0.60, "fraction", METCALF),
            bmp_realization: DesignCriterion::new(0.90, "fraction", WEF_MOP8),
            biogas_ch4_pct: DesignCriterion::new(60.0, "%", METCALF),
            biogas_co2_pct: DesignCriterion::new(39.0, "%", METCALF),
            biogas_h2s_ppmv: DesignCriterion::new(1_500.0, "ppmv", WEF_MOP8),
            max_unit_volume_gal: DesignCriterion::new(1_500_000.0, "gal", VENDOR),
            gas_storage_hours: DesignCriterion::new(4.0, "hours", WEF_MOP8),
            mixing_hp_per_kcf: DesignCriterion::new(0.20, "hp/1000 ft3", METCALF),
        }
    }
}

impl DigestionCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("hrt_days", &self.hrt_days),
            ("olr_kg_vs_per_m3_day", &self.olr_kg_vs_per_m3_day),
            ("headspace_fraction", &self.headspace_fraction),
            ("vs_destruction", &self.vs_destruction),
            ("bmp_realization", &self.bmp_realization),
            ("biogas_ch4_pct", &self.biogas_ch4_pct),
            ("biogas_co2_pct", &self.biogas_co2_pct),
            ("biogas_h2s_ppmv", &self.biogas_h2s_ppmv),
            ("max_unit_volume_gal", &self.max_unit_volume_gal),
            ("gas_storage_hours", &self.gas_storage_hours),
            ("mixing_hp_per_kcf", &self.mixing_hp_per_kcf),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidsSeparationCriteria {
    /// Fraction of influent TS captured in the cake
    pub ts_capture: DesignCriterion,
    pub cake_solids_pct: DesignCriterion,
    pub polymer_lb_per_dry_ton: DesignCriterion,
    /// Hydraulic capacity of one dewatering unit
    pub unit_capacity_gpm: DesignCriterion,
}

impl Default for SolidsSeparationCriteria {
    fn default() -> Self {
        SolidsSeparationCriteria {
            ts_capture: DesignCriterion::new(0.90, "fraction", METCALF),
            cake_solids_pct: DesignCriterion::new(25.0, "%", METCALF),
            polymer_lb_per_dry_ton: DesignCriterion::new(15.0, "lb/dry ton", WEF_MOP8),
            unit_capacity_gpm: DesignCriterion::new(150.0, "gpm", VENDOR),
        }
    }
}

impl SolidsSeparationCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("ts_capture", &self.ts_capture),
            ("cake_solids_pct", &self.cake_solids_pct),
            ("polymer_lb_per_dry_ton", &self.polymer_lb_per_dry_ton),
            ("unit_capacity_gpm", &self.unit_capacity_gpm),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidPolishingCriteria {
    pub tss_removal: DesignCriterion,
    pub cod_removal: DesignCriterion,
    pub float_solids_pct: DesignCriterion,
    pub hydraulic_loading_gpm_per_ft2: DesignCriterion,
}

impl Default for LiquidPolishingCriteria {
    fn default() -> Self {
        LiquidPolishingCriteria {
            tss_removal: DesignCriterion::new(0.85, "fraction", METCALF),
            cod_removal: DesignCriterion::new(0.50, "fraction", METCALF),
            float_solids_pct: DesignCriterion::new(4.0, "%", METCALF),
            hydraulic_loading_gpm_per_ft2: DesignCriterion::new(2.0, "gpm/ft2", METCALF),
        }
    }
}

impl LiquidPolishingCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("tss_removal", &self.tss_removal),
            ("cod_removal", &self.cod_removal),
            ("float_solids_pct", &self.float_solids_pct),
            ("hydraulic_loading_gpm_per_ft2", &self.hydraulic_loading_gpm_per_ft2),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConditioningCriteria {
    pub h2s_removal: DesignCriterion,
    /// Fraction of raw gas volume lost as condensed moisture
    pub moisture_flow_loss: DesignCriterion,
}

impl Default for GasConditioningCriteria {
    fn default() -> Self {
        GasConditioningCriteria {
            h2s_removal: DesignCriterion::new(0.995, "fraction", VENDOR),
            moisture_flow_loss: DesignCriterion::new(0.01, "fraction", GPSA),
        }
    }
}

impl GasConditioningCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("h2s_removal", &self.h2s_removal),
            ("moisture_flow_loss", &self.moisture_flow_loss),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasUpgradingCriteria {
    pub ch4_recovery: DesignCriterion,
    pub product_ch4_pct: DesignCriterion,
    /// Further H2S removal across the upgrading membranes
    pub h2s_polish_removal: DesignCriterion,
    /// Raw gas capacity of one upgrading skid
    pub skid_capacity_scfm: DesignCriterion,
}

impl Default for GasUpgradingCriteria {
    fn default() -> Self {
        GasUpgradingCriteria {
            ch4_recovery: DesignCriterion::new(0.98, "fraction", VENDOR),
            product_ch4_pct: DesignCriterion::new(97.0, "%", VENDOR),
            h2s_polish_removal: DesignCriterion::new(0.90, "fraction", VENDOR),
            skid_capacity_scfm: DesignCriterion::new(600.0, "SCFM", VENDOR),
        }
    }
}

impl GasUpgradingCriteria {
    pub fn as_map(&self) -> BTreeMap<String, DesignCriterion> {
        criteria_map(&[
            ("ch4_recovery", &self.ch4_recovery),
            ("product_ch4_pct", &self.product_ch4_pct),
            ("h2s_polish_removal", &self.h2s_polish_removal),
            ("skid_capacity_scfm", &self.skid_capacity_scfm),
        ])
    }
}

/// Feedstock properties used when neither the user nor the library has a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackFeedstock {
    pub total_solids_pct: f64,
    pub volatile_solids_pct_of_ts: f64,
    pub bmp_m3_ch4_per_kg_vs: f64,
    pub c_n_ratio: f64,
    pub cod_mg_l: f64,
    pub tkn_mg_l: f64,
    pub tp_mg_l: f64,
}

impl Default for FallbackFeedstock {
    fn default() -> Self {
        FallbackFeedstock {
            total_solids_pct: 15.0,
            volatile_solids_pct_of_ts: 80.0,
            bmp_m3_ch4_per_kg_vs: 0.30,
            c_n_ratio: 20.0,
            cod_mg_l: 100_000.0,
            tkn_mg_l: 4_000.0,
            tp_mg_l: 800.0,
        }
    }
}

/// All process design criteria for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignCriteria {
    pub receiving: ReceivingCriteria,
    pub preparation: PreparationCriteria,
    pub equalization: EqualizationCriteria,
    pub digestion: DigestionCriteria,
    pub solids_separation: SolidsSeparationCriteria,
    pub liquid_polishing: LiquidPolishingCriteria,
    pub gas_conditioning: GasConditioningCriteria,
    pub gas_upgrading: GasUpgradingCriteria,
    /// Higher heating value contributed per percent CH4 (Btu/scf)
    pub btu_per_scf_per_pct_ch4: f64,
    /// Acceptable blended C:N band; outside it only warns
    pub c_n_min: f64,
    pub c_n_max: f64,
    pub fallback_feedstock: FallbackFeedstock,
}

impl Default for DesignCriteria {
    fn default() -> Self {
        DesignCriteria {
            receiving: ReceivingCriteria::default(),
            preparation: PreparationCriteria::default(),
            equalization: EqualizationCriteria::default(),
            digestion: DigestionCriteria::default(),
            solids_separation: SolidsSeparationCriteria::default(),
            liquid_polishing: LiquidPolishingCriteria::default(),
            gas_conditioning: GasConditioningCriteria::default(),
            gas_upgrading: GasUpgradingCriteria::default(),
            btu_per_scf_per_pct_ch4: 10.12,
            c_n_min: 15.0,
            c_n_max: 35.0,
            fallback_feedstock: FallbackFeedstock::default(),
        }
    }
}

// ============================================================================
// Capital Cost Tables
// ============================================================================

/// Installed cost components at one sizing breakpoint (USD, base year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexTier {
    /// Raw biogas capacity at this breakpoint
    pub scfm: f64,
    pub major_equipment: f64,
    pub engineering: f64,
    pub civil_structural: f64,
    pub process_piping: f64,
    pub electrical: f64,
    pub instrumentation_controls: f64,
    pub non_process: f64,
}

impl CapexTier {
    /// Engineering through non-process
    pub fn construction_directs(&self) -> f64 {
        self.engineering
            + self.civil_structural
            + self.process_piping
            + self.electrical
            + self.instrumentation_controls
            + self.non_process
    }
}

/// Capital cost layering rates and the tier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapexConfig {
    /// Tiers sorted by ascending `scfm`
    pub tiers: Vec<CapexTier>,
    pub base_cost_year: i32,
    pub cost_year: i32,
    pub currency: String,
    /// General requirements, fraction of construction directs
    pub general_requirements_rate: f64,
    pub general_conditions_rate: f64,
    pub permits_rate: f64,
    pub insurance_bonds_rate: f64,
    pub epc_profit_rate: f64,
    pub interconnect_facility_usd: f64,
    pub interconnect_pipeline_usd_per_mile: f64,
    pub default_interconnect_miles: f64,
    pub utility_connection_fee_usd: f64,
    pub construction_period_ops_usd: f64,
    pub fixtures_spares_usd: f64,
    pub development_fee_rate: f64,
    pub owner_contingency_rate: f64,
    pub financing_legal_rate: f64,
    /// Annual CPI escalation, compounded from base year to cost year
    pub cpi_escalation_rate: f64,
}

impl Default for CapexConfig {
    fn default() -> Self {
        CapexConfig {
            tiers: vec![
                CapexTier {
                    scfm: 400.0,
                    major_equipment: 4_800_000.0,
                    engineering: 650_000.0,
                    civil_structural: 1_100_000.0,
                    process_piping: 700_000.0,
                    electrical: 850_000.0,
                    instrumentation_controls: 400_000.0,
                    non_process: 300_000.0,
                },
                CapexTier {
                    scfm: 800.0,
                    major_equipment: 7_200_000.0,
                    engineering: 900_000.0,
                    civil_structural: 1_600_000.0,
                    process_piping: 1_000_000.0,
                    electrical: 1_250_000.0,
                    instrumentation_controls: 550_000.0,
                    non_process: 400_000.0,
                },
                CapexTier {
                    scfm: 1_200.0,
                    major_equipment: 9_400_000.0,
                    engineering: 1_100_000.0,
                    civil_structural: 2_050_000.0,
                    process_piping: 1_300_000.0,
                    electrical: 1_600_000.0,
                    instrumentation_controls: 700_000.0,
                    non_process: 500_000.0,
                },
            ],
            base_cost_year: 2024,
            cost_year: 2025,
            currency: "USD".to_string(),
            general_requirements_rate: 0.10,
            general_conditions_rate: 0.06,
            permits_rate: 0.015,
            insurance_bonds_rate: 0.02,
            epc_profit_rate: 0.08,
            interconnect_facility_usd: 1_500_000.0,
            interconnect_pipeline_usd_per_mile: 1_200_000.0,
            default_interconnect_miles: 1.0,
            utility_connection_fee_usd: 250_000.0,
            construction_period_ops_usd: 350_000.0,
            fixtures_spares_usd: 150_000.0,
            development_fee_rate: 0.04,
            owner_contingency_rate: 0.075,
            financing_legal_rate: 0.015,
            cpi_escalation_rate: 0.03,
        }
    }
}

impl CapexConfig {
    /// Compounded escalation fraction from base year to cost year
    pub fn escalation_fraction(&self) -> f64 {
        let years = (self.cost_year - self.base_cost_year).max(0);
        (1.0 + self.cpi_escalation_rate).powi(years) - 1.0
    }
}

// ============================================================================
// Operating Cost Rates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpexConfig {
    pub operator_base_fte: f64,
    /// One additional operator per this much raw biogas capacity
    pub operator_scfm_per_fte: f64,
    pub operator_loaded_wage_usd: f64,
    pub management_fte: f64,
    pub management_loaded_wage_usd: f64,
    pub electricity_usd_per_kwh: f64,
    /// Gas handling power per raw scf treated
    pub gas_kwh_per_scf: f64,
    /// Feed handling power per wet ton received
    pub feed_kwh_per_ton: f64,
    pub polymer_usd_per_lb: f64,
    pub h2s_media_usd_per_lb_removed: f64,
    pub maintenance_equipment_rate: f64,
    pub maintenance_construction_rate: f64,
    pub cake_disposal_usd_per_ton: f64,
    pub rejects_disposal_usd_per_ton: f64,
    pub tipping_fee_usd_per_ton: f64,
    pub insurance_rate_of_capex: f64,
    pub lab_testing_usd: f64,
    pub operating_days_per_year: f64,
}

impl Default for OpexConfig {
    fn default() -> Self {
        OpexConfig {
            operator_base_fte: 2.0,
            operator_scfm_per_fte: 400.0,
            operator_loaded_wage_usd: 95_000.0,
            management_fte: 1.0,
            management_loaded_wage_usd: 130_000.0,
            electricity_usd_per_kwh: 0.10,
            gas_kwh_per_scf: 0.0085,
            feed_kwh_per_ton: 35.0,
            polymer_usd_per_lb: 2.50,
            h2s_media_usd_per_lb_removed: 0.08,
            maintenance_equipment_rate: 0.03,
            maintenance_construction_rate: 0.01,
            cake_disposal_usd_per_ton: 45.0,
            rejects_disposal_usd_per_ton: 65.0,
            tipping_fee_usd_per_ton: 40.0,
            insurance_rate_of_capex: 0.005,
            lab_testing_usd: 60_000.0,
            operating_days_per_year: 365.0,
        }
    }
}

/// Complete configuration for one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub design: DesignCriteria,
    pub capex: CapexConfig,
    pub opex: OpexConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_ascending() {
        let config = CapexConfig::default();
        for pair in config.tiers.windows(2) {
            assert!(pair[0].scfm < pair[1].scfm);
        }
    }

    #[test]
    fn test_escalation_fraction() {
        let config = CapexConfig::default();
        assert!((config.escalation_fraction() - 0.03).abs() < 1e-12);

        let same_year = CapexConfig {
            cost_year: 2024,
            ..CapexConfig::default()
        };
        assert_eq!(same_year.escalation_fraction(), 0.0);
    }

    #[test]
    fn test_partial_override_json() {
        let json = r#"{ "design": { "digestion": { "hrt_days": { "value": 30.0, "unit": "days", "source": "site" } } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.design.digestion.hrt_days.value, 30.0);
        // untouched values keep their defaults
        assert_eq!(config.design.digestion.vs_destruction.value, 0.60);
        assert_eq!(config.capex, CapexConfig::default());
    }

    #[test]
    fn test_criteria_maps_name_every_field() {
        let d = DigestionCriteria::default();
        let map = d.as_map();
        assert_eq!(map.len(), 11);
        assert_eq!(map["hrt_days"].value, 25.0);
    }
}
