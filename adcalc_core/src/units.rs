//! # Unit Types and Normalization
//!
//! Type-safe wrappers for the quantities the engine moves between stages,
//! plus parsers that turn free-text quantity/unit strings into a single
//! canonical flow rate.
//!
//! ## Canonical Units
//!
//! - Feed mass flow: short tons per day (tons/day)
//! - Solids loads: pounds per day (lb/day)
//! - Liquid flow: gallons per day (gpd)
//! - Gas flow: standard cubic feet per minute (SCFM)
//! - Volumes: gallons, cubic feet, cubic meters
//!
//! Conversions are exact multiplicative factors. Nothing here rounds;
//! rounding happens once, through [`QuantityKind::round`], when results are
//! presented.
//!
//! ## Example
//!
//! ```rust
//! use adcalc_core::units::{parse_flow_rate, LbPerDay, TonsPerDay};
//!
//! let flow = parse_flow_rate("50 tons/week", "").unwrap();
//! assert!((flow.0 - 50.0 / 7.0).abs() < 1e-12);
//!
//! let lb: LbPerDay = TonsPerDay(1.5).into();
//! assert_eq!(lb.0, 3000.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

use crate::errors::{CalcError, CalcResult};

// ============================================================================
// Conversion Constants
// ============================================================================

/// Pounds per short ton
pub const LB_PER_TON: f64 = 2000.0;
/// Kilograms per short ton
pub const KG_PER_TON: f64 = 907.184_74;
/// Short tons per metric tonne
pub const TONS_PER_TONNE: f64 = 1.102_311_3;
/// Pounds per kilogram
pub const LB_PER_KG: f64 = 2.204_622_62;
/// US gallons per cubic meter
pub const GAL_PER_M3: f64 = 264.172_052;
/// Cubic feet per cubic meter
pub const FT3_PER_M3: f64 = 35.314_7;
/// US gallons per cubic foot
pub const GAL_PER_FT3: f64 = 7.480_52;
/// Density of water used for wet-mass/volume conversions (lb/gal)
pub const WATER_LB_PER_GAL: f64 = 8.34;
/// Minutes per day
pub const MINUTES_PER_DAY: f64 = 1440.0;
/// Molar volume of an ideal gas at 60 °F, 14.696 psia (scf/lb-mol)
pub const SCF_PER_LB_MOL: f64 = 379.5;

// ============================================================================
// Mass Flow Units
// ============================================================================

/// Mass flow in short tons per day
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TonsPerDay(pub f64);

/// Mass flow in pounds per day
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LbPerDay(pub f64);

impl From<TonsPerDay> for LbPerDay {
    fn from(tpd: TonsPerDay) -> Self {
        LbPerDay(tpd.0 * LB_PER_TON)
    }
}

impl From<LbPerDay> for TonsPerDay {
    fn from(lb: LbPerDay) -> Self {
        TonsPerDay(lb.0 / LB_PER_TON)
    }
}

impl TonsPerDay {
    /// Equivalent water-density liquid flow
    pub fn to_gal_per_day(self) -> GalPerDay {
        GalPerDay(self.0 * LB_PER_TON / WATER_LB_PER_GAL)
    }
}

// ============================================================================
// Liquid Flow and Volume Units
// ============================================================================

/// Liquid flow in US gallons per day
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalPerDay(pub f64);

impl GalPerDay {
    /// Gallons per minute
    pub fn gpm(self) -> f64 {
        self.0 / MINUTES_PER_DAY
    }

    /// Million gallons per day
    pub fn mgd(self) -> f64 {
        self.0 / 1.0e6
    }

    /// Water-density mass flow
    pub fn to_tons_per_day(self) -> TonsPerDay {
        TonsPerDay(self.0 * WATER_LB_PER_GAL / LB_PER_TON)
    }
}

/// Volume in US gallons
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gallons(pub f64);

/// Volume in cubic meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CubicMeters(pub f64);

/// Volume in cubic feet
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CubicFeet(pub f64);

impl From<CubicMeters> for Gallons {
    fn from(m3: CubicMeters) -> Self {
        Gallons(m3_to_gal(m3.0))
    }
}

impl From<Gallons> for CubicMeters {
    fn from(gal: Gallons) -> Self {
        CubicMeters(gal_to_m3(gal.0))
    }
}

impl From<CubicMeters> for CubicFeet {
    fn from(m3: CubicMeters) -> Self {
        CubicFeet(m3.0 * FT3_PER_M3)
    }
}

impl From<CubicFeet> for CubicMeters {
    fn from(ft3: CubicFeet) -> Self {
        CubicMeters(ft3.0 / FT3_PER_M3)
    }
}

impl From<Gallons> for CubicFeet {
    fn from(gal: Gallons) -> Self {
        CubicFeet(gal.0 / GAL_PER_FT3)
    }
}

// ============================================================================
// Gas and Energy Units
// ============================================================================

/// Gas flow in standard cubic feet per minute
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scfm(pub f64);

impl Scfm {
    /// Standard cubic feet per day
    pub fn scfd(self) -> f64 {
        self.0 * MINUTES_PER_DAY
    }

    /// Build from a daily volume in scf
    pub fn from_scfd(scfd: f64) -> Self {
        Scfm(scfd / MINUTES_PER_DAY)
    }
}

/// Energy flow in million Btu per day
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MmbtuPerDay(pub f64);

/// Cost in US dollars
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Usd(pub f64);

// ============================================================================
// Arithmetic Implementations (macro to reduce boilerplate)
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Create from raw f64 value
            pub fn new(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

impl_arithmetic!(TonsPerDay);
impl_arithmetic!(LbPerDay);
impl_arithmetic!(GalPerDay);
impl_arithmetic!(Gallons);
impl_arithmetic!(CubicMeters);
impl_arithmetic!(CubicFeet);
impl_arithmetic!(Scfm);
impl_arithmetic!(MmbtuPerDay);
impl_arithmetic!(Usd);

// ============================================================================
// SI <-> US conversions
// ============================================================================

pub fn m3_to_gal(m3: f64) -> f64 {
    m3 * GAL_PER_M3
}

pub fn gal_to_m3(gal: f64) -> f64 {
    gal / GAL_PER_M3
}

pub fn m3_to_scf(m3: f64) -> f64 {
    m3 * FT3_PER_M3
}

pub fn scf_to_m3(scf: f64) -> f64 {
    scf / FT3_PER_M3
}

pub fn kg_to_lb(kg: f64) -> f64 {
    kg * LB_PER_KG
}

pub fn lb_to_kg(lb: f64) -> f64 {
    lb / LB_PER_KG
}

/// Convert a concentration (mg/L) at a liquid flow into a daily load (lb/day)
pub fn mg_per_l_to_lb_per_day(mg_per_l: f64, flow: GalPerDay) -> LbPerDay {
    LbPerDay(mg_per_l * flow.mgd() * WATER_LB_PER_GAL)
}

/// Convert a daily load (lb/day) at a liquid flow back into mg/L
pub fn lb_per_day_to_mg_per_l(load: LbPerDay, flow: GalPerDay) -> f64 {
    let mgd = flow.mgd();
    if mgd <= 0.0 {
        0.0
    } else {
        load.0 / (mgd * WATER_LB_PER_GAL)
    }
}

// ============================================================================
// Quantity String Parsing
// ============================================================================

/// Extract the numeric part of a quantity string.
///
/// Commas are treated as thousands separators. A range such as `"12-15"`
/// or `"12 to 15"` resolves to its midpoint. Returns the number and the
/// unparsed remainder (which may hold an embedded unit).
pub fn parse_number(input: &str) -> CalcResult<(f64, String)> {
    let text = input.trim();
    let (first, rest) = take_number(text, true)
        .ok_or_else(|| CalcError::parse_error(input, "no numeric value found"))?;

    let after = rest.trim_start();
    let range_rest = after
        .strip_prefix('-')
        .or_else(|| after.strip_prefix('–'))
        .or_else(|| after.strip_prefix("to "));
    if let Some(range_rest) = range_rest {
        if let Some((second, tail)) = take_number(range_rest.trim_start(), false) {
            return Ok(((first + second) / 2.0, tail.trim().to_string()));
        }
    }

    Ok((first, rest.trim().to_string()))
}

/// Scan forward to the first numeric token. Returns the value and the
/// remainder of the string after it.
fn take_number(text: &str, allow_sign: bool) -> Option<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut start = None;
    for (i, &b) in bytes.iter().enumerate() {
        let next_is_digit = bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit());
        if b.is_ascii_digit() || (b == b'.' && next_is_digit) {
            start = Some(i);
            break;
        }
        if allow_sign && i == 0 && b == b'-' && next_is_digit {
            start = Some(i);
            break;
        }
    }
    let start = start?;

    let mut end = start;
    let mut seen_dot = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        let ok = match b {
            b'0'..=b'9' => true,
            b'-' => i == start,
            b',' => bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit()),
            b'.' if !seen_dot => {
                seen_dot = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end = i + 1;
    }

    let cleaned: String = text[start..end].chars().filter(|c| *c != ',').collect();
    let value = cleaned.parse::<f64>().ok()?;
    Some((value, &text[end..]))
}

/// Lowercase, fold "per" into "/", drop spaces and dots.
fn normalize_unit(unit: &str) -> String {
    unit.to_lowercase()
        .replace('³', "3")
        .replace(" per ", "/")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect()
}

/// Short tons represented by one unit of the numerator
fn mass_factor_tons(amount: &str) -> Option<f64> {
    let factor = match amount {
        "ton" | "tons" | "t" | "tn" | "shortton" | "shorttons" | "wetton" | "wettons" | "wt" => 1.0,
        "lb" | "lbs" | "pound" | "pounds" | "#" => 1.0 / LB_PER_TON,
        "kg" | "kgs" | "kilogram" | "kilograms" => 1.0 / KG_PER_TON,
        "tonne" | "tonnes" | "mt" | "metricton" | "metrictons" => TONS_PER_TONNE,
        "gal" | "gals" | "gallon" | "gallons" => WATER_LB_PER_GAL / LB_PER_TON,
        "mgal" | "milliongallons" => 1.0e6 * WATER_LB_PER_GAL / LB_PER_TON,
        "m3" | "cum" | "cubicmeter" | "cubicmeters" => GAL_PER_M3 * WATER_LB_PER_GAL / LB_PER_TON,
        _ => return None,
    };
    Some(factor)
}

/// Days represented by one unit of the denominator
fn time_days(period: &str) -> Option<f64> {
    let days = match period {
        "d" | "day" | "days" => 1.0,
        "wk" | "week" | "weeks" => 7.0,
        "mo" | "month" | "months" => 365.0 / 12.0,
        "y" | "yr" | "yrs" | "year" | "years" | "a" | "annum" => 365.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 1.0 / 24.0,
        _ => return None,
    };
    Some(days)
}

/// Multiplicative factor from the given mass/volume flow unit to tons/day.
pub fn mass_flow_factor(unit: &str) -> CalcResult<f64> {
    let u = normalize_unit(unit);
    let shorthand = match u.as_str() {
        "tpd" => Some(1.0),
        "tpw" => Some(1.0 / 7.0),
        "tpm" => Some(12.0 / 365.0),
        "tpy" | "tpa" => Some(1.0 / 365.0),
        "gpd" => Some(WATER_LB_PER_GAL / LB_PER_TON),
        "mgd" => Some(1.0e6 * WATER_LB_PER_GAL / LB_PER_TON),
        _ => None,
    };
    if let Some(factor) = shorthand {
        return Ok(factor);
    }

    let (amount, period) = u
        .split_once('/')
        .ok_or_else(|| CalcError::parse_error(unit, "unit has no time basis (expected e.g. tons/day)"))?;
    let tons = mass_factor_tons(amount)
        .ok_or_else(|| CalcError::parse_error(unit, format!("unrecognized mass unit '{}'", amount)))?;
    let days = time_days(period)
        .ok_or_else(|| CalcError::parse_error(unit, format!("unrecognized time unit '{}'", period)))?;
    Ok(tons / days)
}

/// Parse a quantity and unit into tons/day.
///
/// When `unit` is empty the unit is read from the quantity string itself
/// (`"1,200 lb/day"`). Fails with [`CalcError::ParseError`] when no number
/// can be extracted or the unit is unknown.
pub fn parse_flow_rate(quantity: &str, unit: &str) -> CalcResult<TonsPerDay> {
    let (value, embedded) = parse_number(quantity)?;
    let unit = if unit.trim().is_empty() { embedded.as_str() } else { unit };
    if unit.trim().is_empty() {
        return Err(CalcError::parse_error(quantity, "no unit given"));
    }
    Ok(TonsPerDay(value * mass_flow_factor(unit)?))
}

/// Multiplicative factor from the given gas flow unit to SCFM.
pub fn gas_flow_factor(unit: &str) -> CalcResult<f64> {
    let factor = match normalize_unit(unit).as_str() {
        "scfm" | "cfm" | "ft3/min" => 1.0,
        "scfh" | "cfh" | "ft3/h" | "ft3/hr" => 1.0 / 60.0,
        "scfd" | "cfd" | "ft3/d" | "ft3/day" => 1.0 / MINUTES_PER_DAY,
        "mscfd" => 1.0e3 / MINUTES_PER_DAY,
        "mmscfd" => 1.0e6 / MINUTES_PER_DAY,
        "m3/h" | "m3/hr" | "nm3/h" | "nm3/hr" => FT3_PER_M3 / 60.0,
        "m3/d" | "m3/day" | "nm3/d" | "nm3/day" => FT3_PER_M3 / MINUTES_PER_DAY,
        "m3/min" | "nm3/min" => FT3_PER_M3,
        _ => return Err(CalcError::parse_error(unit, "unrecognized gas flow unit")),
    };
    Ok(factor)
}

/// Parse a gas quantity and unit into SCFM.
pub fn parse_gas_flow(quantity: &str, unit: &str) -> CalcResult<Scfm> {
    let (value, embedded) = parse_number(quantity)?;
    let unit = if unit.trim().is_empty() { embedded.as_str() } else { unit };
    Ok(Scfm(value * gas_flow_factor(unit)?))
}

/// True when the unit string names a gas flow rather than a mass flow
pub fn is_gas_flow_unit(unit: &str) -> bool {
    gas_flow_factor(unit).is_ok()
}

// ============================================================================
// Rounding Policy
// ============================================================================

/// Kind of reported quantity; each kind has exactly one rounding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    MassFlowTpd,
    /// Short tons per hour (equipment throughput)
    MassFlowTph,
    MassLbPerDay,
    /// Gallons per day
    LiquidFlow,
    /// Gallons per minute
    LiquidFlowGpm,
    Area,
    Power,
    Volume,
    Percent,
    Concentration,
    GasFlow,
    Energy,
    HeatingValue,
    Currency,
    Ratio,
    Count,
    Time,
}

impl QuantityKind {
    /// Decimal places reported for this kind
    pub fn decimals(&self) -> i32 {
        match self {
            QuantityKind::MassFlowTpd
            | QuantityKind::MassLbPerDay
            | QuantityKind::Percent
            | QuantityKind::GasFlow
            | QuantityKind::LiquidFlowGpm
            | QuantityKind::Power
            | QuantityKind::Energy
            | QuantityKind::Time => 1,
            QuantityKind::MassFlowTph | QuantityKind::Ratio => 2,
            QuantityKind::LiquidFlow
            | QuantityKind::Area
            | QuantityKind::Volume
            | QuantityKind::Concentration
            | QuantityKind::HeatingValue
            | QuantityKind::Currency
            | QuantityKind::Count => 0,
        }
    }

    pub fn round(&self, value: f64) -> f64 {
        round_to(value, self.decimals())
    }
}

/// Round half away from zero to the given number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tons_to_pounds() {
        let lb: LbPerDay = TonsPerDay(100.0).into();
        assert_eq!(lb.0, 200_000.0);
        let back: TonsPerDay = lb.into();
        assert_eq!(back.0, 100.0);
    }

    #[test]
    fn test_parse_number_with_commas() {
        let (v, rest) = parse_number("1,200 lb/day").unwrap();
        assert_eq!(v, 1200.0);
        assert_eq!(rest, "lb/day");
    }

    #[test]
    fn test_parse_number_range_midpoint() {
        assert_eq!(parse_number("12-15").unwrap().0, 13.5);
        assert_eq!(parse_number("10 to 20 %").unwrap().0, 15.0);
        assert_eq!(parse_number("approx. 0.5").unwrap().0, 0.5);
    }

    #[test]
    fn test_parse_number_fails_without_digits() {
        let err = parse_number("about a truckload").unwrap_err();
        assert_eq!(err.error_code(), "PARSE_ERROR");
    }

    #[test]
    fn test_parse_flow_rate_units() {
        let cases = [
            ("100", "tons/day", 100.0),
            ("100", "TPD", 100.0),
            ("70", "tons per week", 10.0),
            ("3650", "tons/year", 10.0),
            ("2000", "lb/day", 1.0),
            ("907.18474", "kg/day", 1.0),
        ];
        for (q, u, expected) in cases {
            let flow = parse_flow_rate(q, u).unwrap();
            assert!((flow.0 - expected).abs() < 1e-9, "{} {} -> {}", q, u, flow.0);
        }
    }

    #[test]
    fn test_parse_flow_rate_embedded_unit() {
        let flow = parse_flow_rate("50 tons/week", "").unwrap();
        assert!((flow.0 - 50.0 / 7.0).abs() < 1e-12);
        let flow = parse_flow_rate("1,200 lb/day", "").unwrap();
        assert!((flow.0 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_parse_flow_rate_liquid_units() {
        let flow = parse_flow_rate("10000", "gpd").unwrap();
        assert!((flow.0 - 41.7).abs() < 1e-9);
        let metric = parse_flow_rate("10", "tonnes/day").unwrap();
        assert!((metric.0 - 11.023113).abs() < 1e-9);
    }

    #[test]
    fn test_parse_flow_rate_rejects_unknown_unit() {
        assert!(parse_flow_rate("10", "bushels/day").is_err());
        assert!(parse_flow_rate("10", "furlongs").is_err());
        assert!(parse_flow_rate("10", "").is_err());
        assert!(parse_flow_rate("", "tons/day").is_err());
    }

    #[test]
    fn test_parse_gas_flow() {
        assert_eq!(parse_gas_flow("600", "scfm").unwrap().0, 600.0);
        assert!((parse_gas_flow("36000", "scfh").unwrap().0 - 600.0).abs() < 1e-9);
        assert!((parse_gas_flow("864,000 scfd", "").unwrap().0 - 600.0).abs() < 1e-9);
        let si = parse_gas_flow("100", "Nm3/h").unwrap();
        assert!((si.0 - 58.857833).abs() < 1e-5);
        assert!(is_gas_flow_unit("SCFM"));
        assert!(!is_gas_flow_unit("tons/day"));
    }

    #[test]
    fn test_si_us_volume() {
        assert!((m3_to_gal(1.0) - 264.172052).abs() < 1e-9);
        assert!((gal_to_m3(m3_to_gal(42.0)) - 42.0).abs() < 1e-9);
        assert!((scf_to_m3(m3_to_scf(7.0)) - 7.0).abs() < 1e-9);
        let gal: Gallons = CubicMeters(2.0).into();
        assert!((gal.0 - 528.344104).abs() < 1e-6);
    }

    #[test]
    fn test_concentration_load_conversion() {
        let flow = GalPerDay(1.0e6);
        let load = mg_per_l_to_lb_per_day(100.0, flow);
        assert!((load.0 - 834.0).abs() < 1e-9);
        assert!((lb_per_day_to_mg_per_l(load, flow) - 100.0).abs() < 1e-9);
        assert_eq!(lb_per_day_to_mg_per_l(load, GalPerDay(0.0)), 0.0);
    }

    #[test]
    fn test_rounding_policy() {
        assert_eq!(QuantityKind::MassLbPerDay.round(30_000.04), 30_000.0);
        assert_eq!(QuantityKind::Currency.round(1234.5), 1235.0);
        assert_eq!(QuantityKind::Ratio.round(0.12345), 0.12);
        assert_eq!(QuantityKind::Percent.round(59.96), 60.0);
        assert_eq!(QuantityKind::LiquidFlowGpm.round(12.34), 12.3);
        assert_eq!(QuantityKind::MassFlowTph.round(1.256), 1.26);
        assert_eq!(QuantityKind::Area.round(88.6), 89.0);
        assert_eq!(QuantityKind::Power.round(7.46), 7.5);
    }

    #[test]
    fn test_serialization() {
        let flow = Scfm(612.5);
        let json = serde_json::to_string(&flow).unwrap();
        assert_eq!(json, "612.5");
        let roundtrip: Scfm = serde_json::from_str(&json).unwrap();
        assert_eq!(flow, roundtrip);
    }
}
