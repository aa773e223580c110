//! Process stage transforms.
//!
//! Each stage consumes the previous stage's typed stream plus its design
//! criteria and returns a [`StageOutcome`]: the immutable stage record, the
//! typed product stream(s) for the next stage, and a sizing struct holding
//! the intermediate quantities the equipment builders reuse.
//!
//! Every split is a mass balance. Solids leaving one phase appear in the
//! other through a capture fraction and its complement, and destroyed VS is
//! the input VS load times the destruction fraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stream::{
    CakeStream, GasComposition, GasStream, LiquidStream, SlurryStream, Stream, StreamParameters,
};
use crate::config::{
    DesignCriterion, DigestionCriteria, EqualizationCriteria, GasConditioningCriteria, GasUpgradingCriteria,
    LiquidPolishingCriteria, PreparationCriteria, ReceivingCriteria, SolidsSeparationCriteria,
};
use crate::errors::CalcWarning;
use crate::library::Profile;
use crate::units::{
    kg_to_lb, lb_to_kg, m3_to_gal, m3_to_scf, CubicFeet, GalPerDay, Gallons, LbPerDay, Scfm, TonsPerDay,
    LB_PER_TON, WATER_LB_PER_GAL,
};

/// Theoretical methane yield of COD at standard conditions (m3 CH4/kg COD)
const CH4_M3_PER_KG_COD: f64 = 0.35;

// ============================================================================
// Stage Records
// ============================================================================

/// Kind of process stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Receiving,
    Depackaging,
    Preparation,
    Equalization,
    Digestion,
    SolidsSeparation,
    LiquidPolishing,
    GasConditioning,
    GasUpgrading,
}

impl StageType {
    pub fn display_name(&self) -> &'static str {
        match self {
            StageType::Receiving => "Receiving & Storage",
            StageType::Depackaging => "Depackaging",
            StageType::Preparation => "Feed Preparation",
            StageType::Equalization => "Equalization",
            StageType::Digestion => "Anaerobic Digestion",
            StageType::SolidsSeparation => "Solids Separation",
            StageType::LiquidPolishing => "Liquid Polishing",
            StageType::GasConditioning => "Gas Conditioning",
            StageType::GasUpgrading => "Gas Upgrading",
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Immutable record of one stage transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStage {
    pub name: String,
    pub stage_type: StageType,
    pub input_stream: StreamParameters,
    /// Main product, passed to the next stage
    pub output_stream: StreamParameters,
    /// Secondary products (biogas, cake, rejects, float, tail gas)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub side_streams: BTreeMap<String, StreamParameters>,
    pub design_criteria: BTreeMap<String, DesignCriterion>,
    pub notes: Vec<String>,
}

impl ProcessStage {
    fn new(
        stage_type: StageType,
        input: Stream,
        output: Stream,
        design_criteria: BTreeMap<String, DesignCriterion>,
    ) -> Self {
        ProcessStage {
            name: stage_type.display_name().to_string(),
            stage_type,
            input_stream: input.to_parameters(),
            output_stream: output.to_parameters(),
            side_streams: BTreeMap::new(),
            design_criteria,
            notes: Vec::new(),
        }
    }

    fn with_side_stream(mut self, name: &str, stream: Stream) -> Self {
        self.side_streams.insert(name.to_string(), stream.to_parameters());
        self
    }

    fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// A stream returned upstream, recorded but not iterated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycleStream {
    pub name: String,
    pub source: String,
    pub destination: String,
    pub flow_gpd: f64,
    pub solids_lb_per_day: f64,
}

/// Output of one stage transform.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<P, Z> {
    pub stage: ProcessStage,
    pub product: P,
    pub sizing: Z,
}

// ============================================================================
// Receiving and Depackaging
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivingSizing {
    pub flow_tpd: f64,
    pub flow_gpd: f64,
    pub storage_days: f64,
    pub storage_volume: Gallons,
}

pub fn receiving(feed: &SlurryStream, c: &ReceivingCriteria) -> StageOutcome<SlurryStream, ReceivingSizing> {
    let flow_gpd = feed.flow_gpd().0;
    let storage_volume = Gallons(flow_gpd * c.storage_days.value);
    debug!(flow_tpd = feed.flow.0, storage_gal = storage_volume.0, "receiving");

    let stage = ProcessStage::new(StageType::Receiving, (*feed).into(), (*feed).into(), c.receiving_map()).note(
        format!(
            "{:.1} tons/day received; {:.0} days of storage ({:.0} gal)",
            feed.flow.0, c.storage_days.value, storage_volume.0
        ),
    );
    StageOutcome {
        stage,
        product: *feed,
        sizing: ReceivingSizing {
            flow_tpd: feed.flow.0,
            flow_gpd,
            storage_days: c.storage_days.value,
            storage_volume,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepackagingProducts {
    pub feed: SlurryStream,
    pub rejects: CakeStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepackagingSizing {
    pub packaged_tpd: f64,
    pub rejects_tpd: f64,
    pub hours_per_day: f64,
    pub capacity_tph: f64,
}

/// Remove packaging rejects from the packaged share of the feed.
///
/// Rejects leave at the packaged feed's own solids content.
pub fn depackaging(
    feed: &SlurryStream,
    packaged: &SlurryStream,
    c: &ReceivingCriteria,
) -> StageOutcome<DepackagingProducts, DepackagingSizing> {
    let rate = c.depackaging_reject_rate.value;
    let removed = packaged.scaled(rate);
    let rejects = CakeStream {
        wet: removed.flow,
        total_solids: removed.total_solids,
        volatile_solids: removed.volatile_solids,
        tp: removed.tp,
    };
    let out = feed.minus(&removed);
    let hours = c.depackager_hours_per_day.value.max(1.0);
    debug!(packaged_tpd = packaged.flow.0, rejects_tpd = rejects.wet.0, "depackaging");

    let stage = ProcessStage::new(StageType::Depackaging, (*feed).into(), out.into(), c.depackaging_map())
        .with_side_stream("rejects", rejects.into())
        .note(format!(
            "{:.1} tons/day of packaged material depackaged; {:.0}% rejected to disposal",
            packaged.flow.0,
            rate * 100.0
        ));
    StageOutcome {
        stage,
        product: DepackagingProducts { feed: out, rejects },
        sizing: DepackagingSizing {
            packaged_tpd: packaged.flow.0,
            rejects_tpd: rejects.wet.0,
            hours_per_day: hours,
            capacity_tph: packaged.flow.0 / hours,
        },
    }
}

// ============================================================================
// Preparation and Equalization
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PreparationSizing {
    pub feed_tpd: f64,
    pub dilution_water: GalPerDay,
    pub output_ts_pct: f64,
}

/// Dilute to the target feed solids when the blend is drier.
pub fn preparation(feed: &SlurryStream, c: &PreparationCriteria) -> StageOutcome<SlurryStream, PreparationSizing> {
    let target = c.target_feed_ts_pct.value;
    let mut out = *feed;
    let mut dilution_water = GalPerDay(0.0);
    let note = if target > 0.0 && feed.ts_pct() > target {
        let diluted = TonsPerDay(feed.total_solids.0 / (target / 100.0) / LB_PER_TON);
        dilution_water = (diluted - feed.flow).to_gal_per_day();
        out.flow = diluted;
        format!(
            "Blend at {:.1}% TS diluted to {:.1}% TS with {:.0} gal/day of water",
            feed.ts_pct(),
            target,
            dilution_water.0
        )
    } else {
        format!("Blend at {:.1}% TS is at or below the {:.1}% target; no dilution", feed.ts_pct(), target)
    };
    debug!(dilution_gpd = dilution_water.0, ts_pct = out.ts_pct(), "preparation");

    let stage = ProcessStage::new(StageType::Preparation, (*feed).into(), out.into(), c.as_map()).note(note);
    StageOutcome {
        stage,
        product: out,
        sizing: PreparationSizing {
            feed_tpd: out.flow.0,
            dilution_water,
            output_ts_pct: out.ts_pct(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EqualizationSizing {
    pub flow_gpd: f64,
    pub hrt_days: f64,
    pub volume: Gallons,
}

pub fn equalization(feed: &SlurryStream, c: &EqualizationCriteria) -> StageOutcome<SlurryStream, EqualizationSizing> {
    let flow_gpd = feed.flow_gpd().0;
    let volume = Gallons(flow_gpd * c.hrt_days.value);
    let stage = ProcessStage::new(StageType::Equalization, (*feed).into(), (*feed).into(), c.as_map()).note(
        format!("{:.1} days of equalization at {:.0} gal/day", c.hrt_days.value, flow_gpd),
    );
    StageOutcome {
        stage,
        product: *feed,
        sizing: EqualizationSizing {
            flow_gpd,
            hrt_days: c.hrt_days.value,
            volume,
        },
    }
}

// ============================================================================
// Digestion
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DigestionProducts {
    pub digestate: SlurryStream,
    pub biogas: GasStream,
}

/// Digester sizing, shared verbatim with the equipment list.
#[derive(Debug, Clone, PartialEq)]
pub struct DigesterSizing {
    pub hrt_volume: Gallons,
    pub olr_volume: Gallons,
    pub working_volume: Gallons,
    pub total_volume: Gallons,
    /// "HRT" or "OLR"
    pub governing: &'static str,
    pub unit_count: u32,
    pub unit_volume: Gallons,
    pub vs_load_kg_per_day: f64,
    pub vs_destroyed: LbPerDay,
    pub biogas: Scfm,
    pub gas_storage: CubicFeet,
    pub mixing_hp_per_unit: f64,
}

/// Size the digesters and convert VS to biogas.
///
/// Working volume is the larger of the HRT and OLR volumes; headspace is
/// added on top and the total split evenly over as many units as the
/// maximum unit volume requires.
pub fn digestion(
    feed: &SlurryStream,
    c: &DigestionCriteria,
    btu_per_scf_per_pct_ch4: f64,
) -> StageOutcome<DigestionProducts, DigesterSizing> {
    let vs_load_kg = lb_to_kg(feed.volatile_solids.0);
    let hrt_volume = Gallons(feed.flow_gpd().0 * c.hrt_days.value);
    let olr_volume = Gallons(m3_to_gal(vs_load_kg / c.olr_kg_vs_per_m3_day.value));
    let (working_volume, governing) = if olr_volume.0 > hrt_volume.0 {
        (olr_volume, "OLR")
    } else {
        (hrt_volume, "HRT")
    };
    let total_volume = working_volume * (1.0 + c.headspace_fraction.value);
    let max_unit = c.max_unit_volume_gal.value;
    let unit_count = if max_unit > 0.0 {
        ((total_volume.0 / max_unit).ceil() as u32).max(1)
    } else {
        1
    };
    let unit_volume = total_volume / f64::from(unit_count);

    let vs_destroyed = feed.volatile_solids * c.vs_destruction.value;
    let ch4_m3_per_day = vs_load_kg * feed.bmp * c.bmp_realization.value;
    let ch4_pct = c.biogas_ch4_pct.value;
    let biogas_m3_per_day = if ch4_pct > 0.0 {
        ch4_m3_per_day / (ch4_pct / 100.0)
    } else {
        0.0
    };
    let composition = GasComposition {
        ch4_pct,
        co2_pct: c.biogas_co2_pct.value,
        h2s_ppmv: c.biogas_h2s_ppmv.value,
        n2_pct: (100.0 - ch4_pct - c.biogas_co2_pct.value).max(0.0),
        o2_pct: 0.0,
    };
    let biogas = GasStream::new(
        Scfm::from_scfd(m3_to_scf(biogas_m3_per_day)),
        composition,
        btu_per_scf_per_pct_ch4,
    );

    let cod_converted = kg_to_lb(ch4_m3_per_day / CH4_M3_PER_KG_COD);
    let digestate = SlurryStream {
        flow: feed.flow - TonsPerDay::from(vs_destroyed),
        total_solids: feed.total_solids - vs_destroyed,
        volatile_solids: feed.volatile_solids - vs_destroyed,
        cod: LbPerDay((feed.cod.0 - cod_converted).max(0.0)),
        ..*feed
    };

    let gas_storage = CubicFeet(biogas.flow.0 * 60.0 * c.gas_storage_hours.value);
    let unit_kcf = CubicFeet::from(unit_volume).0 / 1000.0;
    let mixing_hp_per_unit = unit_kcf * c.mixing_hp_per_kcf.value;
    let olr_actual = if working_volume.0 > 0.0 {
        vs_load_kg / crate::units::gal_to_m3(working_volume.0)
    } else {
        0.0
    };

    debug!(
        governing,
        total_volume_gal = total_volume.0,
        unit_count,
        biogas_scfm = biogas.flow.0,
        vs_destroyed_lb = vs_destroyed.0,
        "digestion"
    );

    let stage = ProcessStage::new(StageType::Digestion, (*feed).into(), digestate.into(), c.as_map())
        .with_side_stream("biogas", biogas.into())
        .note(format!(
            "{} governs: HRT volume {:.0} gal, OLR volume {:.0} gal",
            governing, hrt_volume.0, olr_volume.0
        ))
        .note(format!(
            "{} digester(s) of {:.0} gal each including {:.0}% headspace; loading {:.2} kg VS/m3/d",
            unit_count,
            unit_volume.0,
            c.headspace_fraction.value * 100.0,
            olr_actual
        ))
        .note(format!(
            "{:.0} lb/day VS destroyed ({:.0}%); {:.1} SCFM biogas at {:.0}% CH4",
            vs_destroyed.0,
            c.vs_destruction.value * 100.0,
            biogas.flow.0,
            ch4_pct
        ));

    StageOutcome {
        stage,
        product: DigestionProducts { digestate, biogas },
        sizing: DigesterSizing {
            hrt_volume,
            olr_volume,
            working_volume,
            total_volume,
            governing,
            unit_count,
            unit_volume,
            vs_load_kg_per_day: vs_load_kg,
            vs_destroyed,
            biogas: biogas.flow,
            gas_storage,
            mixing_hp_per_unit,
        },
    }
}

// ============================================================================
// Solids Separation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeparationProducts {
    pub centrate: LiquidStream,
    pub cake: CakeStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeparationSizing {
    pub feed: GalPerDay,
    pub unit_count: u32,
    pub unit_capacity_gpm: f64,
    pub dry_solids_tpd: f64,
    pub cake_wet_tpd: f64,
    pub polymer_lb_per_day: f64,
}

/// Dewater digestate into cake and centrate.
///
/// TS, VS and TP split by the capture fraction. COD leaves with the
/// uncaptured solids; TKN stays in the liquid as ammonia.
pub fn solids_separation(
    digestate: &SlurryStream,
    c: &SolidsSeparationCriteria,
) -> StageOutcome<SeparationProducts, SeparationSizing> {
    let capture = c.ts_capture.value;
    let cake_ts = digestate.total_solids * capture;
    let cake_wet_lb = if c.cake_solids_pct.value > 0.0 {
        cake_ts.0 / (c.cake_solids_pct.value / 100.0)
    } else {
        cake_ts.0
    };
    let cake = CakeStream {
        wet: TonsPerDay((cake_wet_lb / LB_PER_TON).min(digestate.flow.0)),
        total_solids: cake_ts,
        volatile_solids: digestate.volatile_solids * capture,
        tp: digestate.tp * capture,
    };
    let centrate = LiquidStream {
        flow: (digestate.flow - cake.wet).to_gal_per_day(),
        tss: digestate.total_solids - cake_ts,
        cod: digestate.cod * (1.0 - capture),
        tkn: digestate.tkn,
        tp: digestate.tp - cake.tp,
    };

    let dry_solids_tpd = cake_ts.0 / LB_PER_TON;
    let polymer_lb_per_day = dry_solids_tpd * c.polymer_lb_per_dry_ton.value;
    let feed = digestate.flow_gpd();
    let unit_capacity_gpm = c.unit_capacity_gpm.value;
    let unit_count = if unit_capacity_gpm > 0.0 {
        ((feed.gpm() / unit_capacity_gpm).ceil() as u32).max(1)
    } else {
        1
    };
    debug!(cake_wet_tpd = cake.wet.0, polymer_lb_per_day, unit_count, "solids separation");

    let stage = ProcessStage::new(StageType::SolidsSeparation, (*digestate).into(), centrate.into(), c.as_map())
        .with_side_stream("cake", cake.into())
        .note(format!(
            "{:.0}% solids capture to {:.1} wet tons/day of cake at {:.0}% TS",
            capture * 100.0,
            cake.wet.0,
            cake.ts_pct()
        ))
        .note(format!("Polymer demand {:.0} lb/day", polymer_lb_per_day));

    StageOutcome {
        stage,
        product: SeparationProducts { centrate, cake },
        sizing: SeparationSizing {
            feed,
            unit_count,
            unit_capacity_gpm,
            dry_solids_tpd,
            cake_wet_tpd: cake.wet.0,
            polymer_lb_per_day,
        },
    }
}

// ============================================================================
// Liquid Polishing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PolishingProducts {
    pub effluent: LiquidStream,
    pub float: LiquidStream,
    pub recycle: RecycleStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DafSizing {
    pub flow_gpm: f64,
    pub hydraulic_loading: f64,
    pub surface_area_ft2: f64,
    pub float: GalPerDay,
    pub float_solids: LbPerDay,
}

/// Dissolved air flotation of the centrate; float returns to digestion.
pub fn liquid_polishing(
    centrate: &LiquidStream,
    c: &LiquidPolishingCriteria,
) -> StageOutcome<PolishingProducts, DafSizing> {
    let removed = centrate.tss * c.tss_removal.value;
    let float_gpd = if c.float_solids_pct.value > 0.0 {
        removed.0 / (c.float_solids_pct.value / 100.0) / WATER_LB_PER_GAL
    } else {
        0.0
    };
    let float_flow = GalPerDay(float_gpd.min(centrate.flow.0));
    let cod_removed = centrate.cod * c.cod_removal.value;
    let float = LiquidStream {
        flow: float_flow,
        tss: removed,
        cod: cod_removed,
        tkn: LbPerDay(0.0),
        tp: LbPerDay(0.0),
    };
    let effluent = LiquidStream {
        flow: centrate.flow - float_flow,
        tss: centrate.tss - removed,
        cod: centrate.cod - cod_removed,
        ..*centrate
    };
    let recycle = RecycleStream {
        name: "DAF float".to_string(),
        source: StageType::LiquidPolishing.display_name().to_string(),
        destination: StageType::Digestion.display_name().to_string(),
        flow_gpd: float_flow.0,
        solids_lb_per_day: removed.0,
    };

    let flow_gpm = centrate.flow.gpm();
    let loading = c.hydraulic_loading_gpm_per_ft2.value;
    let surface_area_ft2 = if loading > 0.0 { flow_gpm / loading } else { 0.0 };
    debug!(flow_gpm, surface_area_ft2, float_gpd = float_flow.0, "liquid polishing");

    let stage = ProcessStage::new(StageType::LiquidPolishing, (*centrate).into(), effluent.into(), c.as_map())
        .with_side_stream("float", float.into())
        .note(format!(
            "DAF at {:.1} gpm/ft2 needs {:.0} ft2; {:.0}% TSS and {:.0}% COD removal",
            loading,
            surface_area_ft2,
            c.tss_removal.value * 100.0,
            c.cod_removal.value * 100.0
        ))
        .note("Float is returned to digestion; the recycle load is reported, not re-run through the pipeline");

    StageOutcome {
        stage,
        product: PolishingProducts {
            effluent,
            float,
            recycle,
        },
        sizing: DafSizing {
            flow_gpm,
            hydraulic_loading: loading,
            surface_area_ft2,
            float: float_flow,
            float_solids: removed,
        },
    }
}

// ============================================================================
// Gas Conditioning and Upgrading
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ConditioningSizing {
    pub inlet: Scfm,
    pub outlet: Scfm,
    pub inlet_h2s_ppmv: f64,
    pub h2s_removed: LbPerDay,
}

/// H2S removal and moisture knock-out.
pub fn gas_conditioning(
    raw: &GasStream,
    c: &GasConditioningCriteria,
    btu_per_scf_per_pct_ch4: f64,
) -> StageOutcome<GasStream, ConditioningSizing> {
    let composition = GasComposition {
        h2s_ppmv: raw.composition.h2s_ppmv * (1.0 - c.h2s_removal.value),
        ..raw.composition
    };
    let out = GasStream::new(raw.flow * (1.0 - c.moisture_flow_loss.value), composition, btu_per_scf_per_pct_ch4);
    let h2s_removed = raw.h2s_lb_per_day() - out.h2s_lb_per_day();
    debug!(inlet_scfm = raw.flow.0, h2s_removed_lb = h2s_removed.0, "gas conditioning");

    let stage = ProcessStage::new(StageType::GasConditioning, (*raw).into(), out.into(), c.as_map()).note(format!(
        "H2S reduced from {:.0} to {:.1} ppmv ({:.1} lb/day removed); moisture removal",
        raw.composition.h2s_ppmv, out.composition.h2s_ppmv, h2s_removed.0
    ));
    StageOutcome {
        stage,
        product: out,
        sizing: ConditioningSizing {
            inlet: raw.flow,
            outlet: out.flow,
            inlet_h2s_ppmv: raw.composition.h2s_ppmv,
            h2s_removed,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradingProducts {
    pub rng: GasStream,
    pub tail_gas: GasStream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradingSizing {
    pub inlet: Scfm,
    pub product: Scfm,
    pub tail_gas: Scfm,
    pub skid_count: u32,
    pub skid_capacity_scfm: f64,
}

/// Membrane upgrading to product gas.
///
/// The non-methane balance of the product keeps the inlet ratio of
/// CO2, N2 and O2. Tail gas is the component-by-component remainder.
pub fn gas_upgrading(
    gas: &GasStream,
    c: &GasUpgradingCriteria,
    btu_per_scf_per_pct_ch4: f64,
) -> StageOutcome<UpgradingProducts, UpgradingSizing> {
    let inlet = gas.composition;
    let product_ch4_scfm = gas.ch4_scfm() * c.ch4_recovery.value;
    let target_pct = c.product_ch4_pct.value;
    let product_flow = if target_pct > 0.0 {
        (product_ch4_scfm / (target_pct / 100.0)).min(gas.flow.0)
    } else {
        gas.flow.0
    };
    let product_ch4_pct = if product_flow > 0.0 {
        product_ch4_scfm / product_flow * 100.0
    } else {
        0.0
    };

    let balance = (100.0 - product_ch4_pct).max(0.0);
    let inerts = inlet.co2_pct + inlet.n2_pct + inlet.o2_pct;
    let share = |pct: f64| if inerts > 0.0 { balance * pct / inerts } else { 0.0 };
    let product_comp = GasComposition {
        ch4_pct: product_ch4_pct,
        co2_pct: share(inlet.co2_pct),
        h2s_ppmv: inlet.h2s_ppmv * (1.0 - c.h2s_polish_removal.value),
        n2_pct: share(inlet.n2_pct),
        o2_pct: share(inlet.o2_pct),
    };
    let rng = GasStream::new(Scfm(product_flow), product_comp, btu_per_scf_per_pct_ch4);

    let tail_flow = gas.flow.0 - product_flow;
    let remainder = |inlet_value: f64, product_value: f64| {
        if tail_flow > 0.0 {
            ((gas.flow.0 * inlet_value - product_flow * product_value) / tail_flow).max(0.0)
        } else {
            0.0
        }
    };
    let tail_comp = GasComposition {
        ch4_pct: remainder(inlet.ch4_pct, product_comp.ch4_pct),
        co2_pct: remainder(inlet.co2_pct, product_comp.co2_pct),
        h2s_ppmv: remainder(inlet.h2s_ppmv, product_comp.h2s_ppmv),
        n2_pct: remainder(inlet.n2_pct, product_comp.n2_pct),
        o2_pct: remainder(inlet.o2_pct, product_comp.o2_pct),
    };
    let tail_gas = GasStream::new(Scfm(tail_flow.max(0.0)), tail_comp, btu_per_scf_per_pct_ch4);

    let skid_capacity_scfm = c.skid_capacity_scfm.value;
    let skid_count = if skid_capacity_scfm > 0.0 {
        ((gas.flow.0 / skid_capacity_scfm).ceil() as u32).max(1)
    } else {
        1
    };
    debug!(product_scfm = product_flow, ch4_pct = product_ch4_pct, skid_count, "gas upgrading");

    let stage = ProcessStage::new(StageType::GasUpgrading, (*gas).into(), rng.into(), c.as_map())
        .with_side_stream("tailGas", tail_gas.into())
        .note(format!(
            "{:.1} SCFM RNG at {:.1}% CH4, {:.0} Btu/scf ({:.1} MMBtu/day)",
            rng.flow.0,
            product_ch4_pct,
            rng.btu_per_scf,
            rng.energy().0
        ))
        .note(format!(
            "{:.0}% methane recovery; {:.1} SCFM tail gas to thermal oxidizer",
            c.ch4_recovery.value * 100.0,
            tail_gas.flow.0
        ));

    StageOutcome {
        stage,
        product: UpgradingProducts { rng, tail_gas },
        sizing: UpgradingSizing {
            inlet: gas.flow,
            product: rng.flow,
            tail_gas: tail_gas.flow,
            skid_count,
            skid_capacity_scfm,
        },
    }
}

// ============================================================================
// Output Spec Compliance
// ============================================================================

/// Warn for each limit of `spec` the measured values fail.
///
/// Limits whose key is not among `actual` are skipped.
pub fn check_limits(spec: &Profile, actual: &[(&str, f64)], field: &str, warnings: &mut Vec<CalcWarning>) {
    for limit in &spec.limits {
        let Some((_, value)) = actual.iter().find(|(k, _)| *k == limit.key) else {
            continue;
        };
        if !limit.is_met(*value) {
            let bound = match limit.bound {
                crate::library::LimitBound::Min => "minimum",
                crate::library::LimitBound::Max => "maximum",
            };
            warnings.push(CalcWarning::warning(
                format!("{}.{}", field, limit.key),
                format!(
                    "{} {} of {:.2} {} misses the {} {} of {} {}",
                    spec.name, limit.key, value, limit.unit, bound, limit.key, limit.value, limit.unit
                ),
            ));
        }
    }
}
