//! Typed process streams.
//!
//! Stages pass streams to each other as one of four closed shapes, so every
//! parameter a downstream stage reads is guaranteed to be present. Streams
//! store mass loads rather than concentrations; percentages are derived,
//! which keeps solids accounting exact across splits.
//!
//! For reporting, each stream renders to a flat parameter map with the
//! rounding policy of [`QuantityKind`] applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::units::{
    lb_per_day_to_mg_per_l, GalPerDay, LbPerDay, MmbtuPerDay, QuantityKind, Scfm, TonsPerDay, LB_PER_TON,
    MINUTES_PER_DAY, SCF_PER_LB_MOL,
};

/// Molecular weight of hydrogen sulfide (lb/lb-mol)
const H2S_LB_PER_LB_MOL: f64 = 34.08;

/// A single reported quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamParameter {
    pub value: f64,
    pub unit: String,
}

impl StreamParameter {
    /// Rounded per the reporting policy of `kind`
    pub fn new(value: f64, unit: &str, kind: QuantityKind) -> Self {
        StreamParameter {
            value: kind.round(value),
            unit: unit.to_string(),
        }
    }
}

/// Parameter name to value, the reported view of a stream
pub type StreamParameters = BTreeMap<String, StreamParameter>;

fn put(map: &mut StreamParameters, key: &str, value: f64, unit: &str, kind: QuantityKind) {
    map.insert(key.to_string(), StreamParameter::new(value, unit, kind));
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// Slurry
// ============================================================================

/// Wet organic feed or digestate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlurryStream {
    pub flow: TonsPerDay,
    pub total_solids: LbPerDay,
    pub volatile_solids: LbPerDay,
    pub cod: LbPerDay,
    pub tkn: LbPerDay,
    pub tp: LbPerDay,
    /// m3 CH4 per kg VS added
    pub bmp: f64,
    pub c_n_ratio: f64,
}

impl SlurryStream {
    pub fn flow_gpd(&self) -> GalPerDay {
        self.flow.to_gal_per_day()
    }

    pub fn ts_pct(&self) -> f64 {
        pct(self.total_solids.0, self.flow.0 * LB_PER_TON)
    }

    pub fn vs_pct_of_ts(&self) -> f64 {
        pct(self.volatile_solids.0, self.total_solids.0)
    }

    /// Every flow and load multiplied by `factor`; intensive values unchanged
    pub fn scaled(&self, factor: f64) -> SlurryStream {
        SlurryStream {
            flow: self.flow * factor,
            total_solids: self.total_solids * factor,
            volatile_solids: self.volatile_solids * factor,
            cod: self.cod * factor,
            tkn: self.tkn * factor,
            tp: self.tp * factor,
            ..*self
        }
    }

    /// Flows and loads of `other` removed; intensive values kept from `self`
    pub fn minus(&self, other: &SlurryStream) -> SlurryStream {
        SlurryStream {
            flow: self.flow - other.flow,
            total_solids: self.total_solids - other.total_solids,
            volatile_solids: self.volatile_solids - other.volatile_solids,
            cod: self.cod - other.cod,
            tkn: self.tkn - other.tkn,
            tp: self.tp - other.tp,
            ..*self
        }
    }

    pub fn to_parameters(&self) -> StreamParameters {
        let mut map = StreamParameters::new();
        put(&mut map, "flow", self.flow.0, "tons/day", QuantityKind::MassFlowTpd);
        put(&mut map, "flowGpd", self.flow_gpd().0, "gal/day", QuantityKind::LiquidFlow);
        put(&mut map, "totalSolids", self.ts_pct(), "%", QuantityKind::Percent);
        put(&mut map, "volatileSolids", self.vs_pct_of_ts(), "% of TS", QuantityKind::Percent);
        put(&mut map, "tsLoad", self.total_solids.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "vsLoad", self.volatile_solids.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "codLoad", self.cod.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "tknLoad", self.tkn.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "tpLoad", self.tp.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "bmp", self.bmp, "m3 CH4/kg VS", QuantityKind::Ratio);
        put(&mut map, "cnRatio", self.c_n_ratio, "ratio", QuantityKind::Ratio);
        map
    }
}

// ============================================================================
// Cake
// ============================================================================

/// Dewatered solids or depackaging rejects.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CakeStream {
    pub wet: TonsPerDay,
    pub total_solids: LbPerDay,
    pub volatile_solids: LbPerDay,
    pub tp: LbPerDay,
}

impl CakeStream {
    pub fn ts_pct(&self) -> f64 {
        pct(self.total_solids.0, self.wet.0 * LB_PER_TON)
    }

    pub fn to_parameters(&self) -> StreamParameters {
        let mut map = StreamParameters::new();
        put(&mut map, "wetFlow", self.wet.0, "tons/day", QuantityKind::MassFlowTpd);
        put(&mut map, "totalSolids", self.ts_pct(), "%", QuantityKind::Percent);
        put(&mut map, "tsLoad", self.total_solids.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "vsLoad", self.volatile_solids.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "tpLoad", self.tp.0, "lb/day", QuantityKind::MassLbPerDay);
        map
    }
}

// ============================================================================
// Liquid
// ============================================================================

/// Centrate, filtrate or polished effluent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquidStream {
    pub flow: GalPerDay,
    pub tss: LbPerDay,
    pub cod: LbPerDay,
    pub tkn: LbPerDay,
    pub tp: LbPerDay,
}

impl LiquidStream {
    pub fn tss_mg_l(&self) -> f64 {
        lb_per_day_to_mg_per_l(self.tss, self.flow)
    }

    pub fn cod_mg_l(&self) -> f64 {
        lb_per_day_to_mg_per_l(self.cod, self.flow)
    }

    pub fn to_parameters(&self) -> StreamParameters {
        let mut map = StreamParameters::new();
        put(&mut map, "flow", self.flow.0, "gal/day", QuantityKind::LiquidFlow);
        put(&mut map, "flowGpm", self.flow.gpm(), "gpm", QuantityKind::LiquidFlowGpm);
        put(&mut map, "tss", self.tss_mg_l(), "mg/L", QuantityKind::Concentration);
        put(&mut map, "tssLoad", self.tss.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "cod", self.cod_mg_l(), "mg/L", QuantityKind::Concentration);
        put(&mut map, "codLoad", self.cod.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "tknLoad", self.tkn.0, "lb/day", QuantityKind::MassLbPerDay);
        put(&mut map, "tpLoad", self.tp.0, "lb/day", QuantityKind::MassLbPerDay);
        map
    }
}

// ============================================================================
// Gas
// ============================================================================

/// Dry gas composition in volume percent, H2S in ppmv.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GasComposition {
    pub ch4_pct: f64,
    pub co2_pct: f64,
    pub h2s_ppmv: f64,
    pub n2_pct: f64,
    pub o2_pct: f64,
}

/// Raw biogas, conditioned gas, RNG product or tail gas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GasStream {
    pub flow: Scfm,
    pub composition: GasComposition,
    pub btu_per_scf: f64,
}

impl GasStream {
    /// Heating value follows from the CH4 fraction alone.
    pub fn new(flow: Scfm, composition: GasComposition, btu_per_scf_per_pct_ch4: f64) -> Self {
        GasStream {
            flow,
            composition,
            btu_per_scf: composition.ch4_pct * btu_per_scf_per_pct_ch4,
        }
    }

    pub fn ch4_scfm(&self) -> f64 {
        self.flow.0 * self.composition.ch4_pct / 100.0
    }

    pub fn energy(&self) -> MmbtuPerDay {
        MmbtuPerDay(self.flow.0 * MINUTES_PER_DAY * self.btu_per_scf / 1.0e6)
    }

    /// Mass of H2S carried per day
    pub fn h2s_lb_per_day(&self) -> LbPerDay {
        LbPerDay(self.flow.scfd() * self.composition.h2s_ppmv / 1.0e6 * H2S_LB_PER_LB_MOL / SCF_PER_LB_MOL)
    }

    pub fn to_parameters(&self) -> StreamParameters {
        let c = &self.composition;
        let mut map = StreamParameters::new();
        put(&mut map, "flow", self.flow.0, "SCFM", QuantityKind::GasFlow);
        put(&mut map, "flowScfd", self.flow.scfd(), "SCFD", QuantityKind::Volume);
        put(&mut map, "ch4", c.ch4_pct, "%", QuantityKind::Percent);
        put(&mut map, "co2", c.co2_pct, "%", QuantityKind::Percent);
        put(&mut map, "h2s", c.h2s_ppmv, "ppmv", QuantityKind::Concentration);
        put(&mut map, "n2", c.n2_pct, "%", QuantityKind::Percent);
        put(&mut map, "o2", c.o2_pct, "%", QuantityKind::Percent);
        put(&mut map, "heatingValue", self.btu_per_scf, "Btu/scf", QuantityKind::HeatingValue);
        put(&mut map, "energy", self.energy().0, "MMBtu/day", QuantityKind::Energy);
        map
    }
}

// ============================================================================
// Stream
// ============================================================================

/// Any stream passed between stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Stream {
    Slurry(SlurryStream),
    Cake(CakeStream),
    Liquid(LiquidStream),
    Gas(GasStream),
}

impl Stream {
    pub fn to_parameters(&self) -> StreamParameters {
        match self {
            Stream::Slurry(s) => s.to_parameters(),
            Stream::Cake(s) => s.to_parameters(),
            Stream::Liquid(s) => s.to_parameters(),
            Stream::Gas(s) => s.to_parameters(),
        }
    }
}

impl From<SlurryStream> for Stream {
    fn from(s: SlurryStream) -> Self {
        Stream::Slurry(s)
    }
}

impl From<CakeStream> for Stream {
    fn from(s: CakeStream) -> Self {
        Stream::Cake(s)
    }
}

impl From<LiquidStream> for Stream {
    fn from(s: LiquidStream) -> Self {
        Stream::Liquid(s)
    }
}

impl From<GasStream> for Stream {
    fn from(s: GasStream) -> Self {
        Stream::Gas(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slurry() -> SlurryStream {
        SlurryStream {
            flow: TonsPerDay(100.0),
            total_solids: LbPerDay(30_000.0),
            volatile_solids: LbPerDay(24_000.0),
            cod: LbPerDay(20_000.0),
            tkn: LbPerDay(900.0),
            tp: LbPerDay(150.0),
            bmp: 0.4,
            c_n_ratio: 18.0,
        }
    }

    #[test]
    fn test_slurry_percentages() {
        let s = slurry();
        assert!((s.ts_pct() - 15.0).abs() < 1e-12);
        assert!((s.vs_pct_of_ts() - 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_scaled_and_minus_conserve_loads() {
        let s = slurry();
        let part = s.scaled(0.2);
        let rest = s.minus(&part);
        assert!((part.total_solids.0 + rest.total_solids.0 - s.total_solids.0).abs() < 1e-9);
        assert!((part.flow.0 + rest.flow.0 - s.flow.0).abs() < 1e-9);
        assert_eq!(rest.bmp, s.bmp);
    }

    #[test]
    fn test_gas_heating_value_and_energy() {
        let comp = GasComposition {
            ch4_pct: 60.0,
            co2_pct: 39.0,
            h2s_ppmv: 1_500.0,
            n2_pct: 1.0,
            o2_pct: 0.0,
        };
        let gas = GasStream::new(Scfm(500.0), comp, 10.12);
        assert!((gas.btu_per_scf - 607.2).abs() < 1e-9);
        // 500 scfm * 1440 * 607.2 / 1e6
        assert!((gas.energy().0 - 437.184).abs() < 1e-9);
        assert!((gas.ch4_scfm() - 300.0).abs() < 1e-12);
        // 720,000 scfd * 0.0015 * 34.08 / 379.5
        assert!((gas.h2s_lb_per_day().0 - 96.986_561).abs() < 1e-3);
    }

    #[test]
    fn test_parameters_are_rounded() {
        let params = Stream::from(slurry().scaled(1.0 / 3.0)).to_parameters();
        assert_eq!(params["flow"].value, 33.3);
        assert_eq!(params["flow"].unit, "tons/day");
        assert_eq!(params["totalSolids"].value, 15.0);
    }

    #[test]
    fn test_stream_serializes_with_phase_tag() {
        let json = serde_json::to_value(Stream::Cake(CakeStream::default())).unwrap();
        assert_eq!(json["phase"], "cake");
    }
}
