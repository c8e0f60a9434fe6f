//! Numeric values carried from the attribute stream into the averaging workers.
//!
//! A value is either absent, a binary float, or an exact decimal. Groups never
//! mix the two present variants; see `treeprice-aggregator`.

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::error::NumericError;

/// Absolute tolerance for float equality.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// Significant digits kept by an average unless configured otherwise.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 50;

/// Working precision of decimal division; a context cannot ask for more.
pub const MAX_DECIMAL_PRECISION: u32 = 100;

/// Tag of a [`NumericValue`], used in diagnostics and type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Absent,
    Float,
    Decimal,
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Float => write!(f, "float"),
            Self::Decimal => write!(f, "decimal"),
        }
    }
}

/// How numeric text from the record source is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericMode {
    /// Exact decimal arithmetic (default): no drift when summing many values.
    #[default]
    Decimal,
    /// Binary `f64` arithmetic.
    Float,
}

impl fmt::Display for NumericMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal => write!(f, "decimal"),
            Self::Float => write!(f, "float"),
        }
    }
}

impl FromStr for NumericMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" => Ok(Self::Decimal),
            "float" => Ok(Self::Float),
            other => Err(format!("unknown numeric mode '{other}' (expected decimal or float)")),
        }
    }
}

/// A numeric attribute value.
///
/// Decimals are arbitrary precision: any digit string the parser accepts is
/// held exactly, and sums never overflow.
#[derive(Debug, Clone, Default)]
pub enum NumericValue {
    /// No value (e.g. the average of an empty group).
    #[default]
    Absent,
    Float(f64),
    Decimal(BigDecimal),
}

impl NumericValue {
    pub fn kind(&self) -> NumericKind {
        match self {
            Self::Absent => NumericKind::Absent,
            Self::Float(_) => NumericKind::Float,
            Self::Decimal(_) => NumericKind::Decimal,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Parse already-normalized numeric text in the given mode.
    pub fn parse(text: &str, mode: NumericMode) -> Result<Self, NumericError> {
        let text = text.trim();
        match mode {
            NumericMode::Decimal => BigDecimal::from_str(text)
                .map(Self::Decimal)
                .map_err(|e| NumericError::Parse {
                    text: text.to_string(),
                    kind: NumericKind::Decimal,
                    reason: e.to_string(),
                }),
            NumericMode::Float => text
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|e| NumericError::Parse {
                    text: text.to_string(),
                    kind: NumericKind::Float,
                    reason: e.to_string(),
                }),
        }
    }

    /// Render with a fixed number of fractional digits; `None` when absent.
    pub fn render(&self, scale: u32) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::Float(v) => Some(format!("{:.*}", scale as usize, v)),
            Self::Decimal(d) => {
                let (_, current) = d.as_bigint_and_exponent();
                let scale = i64::from(scale);
                if current < scale {
                    Some(d.with_scale(scale).to_plain_string())
                } else {
                    Some(d.to_plain_string())
                }
            }
        }
    }
}

impl PartialEq for NumericValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Float(a), Self::Float(b)) => (a - b).abs() <= FLOAT_EPSILON,
            // BigDecimal's Eq compares numerically, so 1.0 == 1.00.
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            // f64 Display is the shortest round-trip form and never uses an exponent.
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(d) => f.write_str(&d.to_plain_string()),
        }
    }
}

impl From<BigDecimal> for NumericValue {
    fn from(value: BigDecimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<f64> for NumericValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Strip everything except ASCII digits, `.` and `-` from raw field text.
///
/// Removes currency symbols, thousands separators and padding in one pass:
/// `"€1,250.50 "` becomes `"1250.50"`. An empty result means the field held
/// no number at all.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Rounding rule applied when quantizing an average to its display scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Banker's rounding: ties go to the even neighbour.
    #[default]
    HalfEven,
    HalfUp,
    HalfDown,
    /// Toward zero.
    Down,
    /// Away from zero.
    Up,
}

impl Rounding {
    fn mode(self) -> RoundingMode {
        match self {
            Self::HalfEven => RoundingMode::HalfEven,
            Self::HalfUp => RoundingMode::HalfUp,
            Self::HalfDown => RoundingMode::HalfDown,
            Self::Down => RoundingMode::Down,
            Self::Up => RoundingMode::Up,
        }
    }

    fn round_f64(self, value: f64) -> f64 {
        match self {
            Self::HalfEven => value.round_ties_even(),
            Self::HalfUp => value.round(),
            Self::HalfDown => {
                if (value.fract().abs() - 0.5).abs() < f64::EPSILON {
                    value.trunc()
                } else {
                    value.round()
                }
            }
            Self::Down => value.trunc(),
            Self::Up => {
                if value.fract() == 0.0 {
                    value
                } else {
                    value.trunc() + value.signum()
                }
            }
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfEven => write!(f, "half_even"),
            Self::HalfUp => write!(f, "half_up"),
            Self::HalfDown => write!(f, "half_down"),
            Self::Down => write!(f, "down"),
            Self::Up => write!(f, "up"),
        }
    }
}

/// Arithmetic context for averages: precision of the quotient, display scale
/// and rounding rule. Constructed explicitly and owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalContext {
    /// Significant digits kept by the division (1..=100).
    pub precision: u32,
    /// Fractional digits of the final result.
    pub scale: u32,
    pub rounding: Rounding,
}

impl Default for DecimalContext {
    fn default() -> Self {
        Self {
            precision: DEFAULT_DECIMAL_PRECISION,
            scale: 2,
            rounding: Rounding::HalfEven,
        }
    }
}

impl DecimalContext {
    /// `sum / count`, limited to `precision` significant digits and then
    /// quantized to exactly `scale` fractional digits.
    ///
    /// Returns `None` for an empty group or a zero precision.
    pub fn average(&self, sum: &BigDecimal, count: u64) -> Option<BigDecimal> {
        if count == 0 {
            return None;
        }
        let precision = NonZeroU64::new(u64::from(self.precision))?;
        let divisor = BigDecimal::from(count);
        let quotient = sum / &divisor;
        let bounded = quotient.with_precision_round(precision, self.rounding.mode());
        Some(self.quantize(&bounded))
    }

    /// Round to exactly `scale` fractional digits, padding with zeros.
    pub fn quantize(&self, value: &BigDecimal) -> BigDecimal {
        value.with_scale_round(i64::from(self.scale), self.rounding.mode())
    }

    /// Float counterpart of [`average`](Self::average).
    pub fn average_f64(&self, sum: f64, count: u64) -> Option<f64> {
        if count == 0 {
            return None;
        }
        let factor = 10f64.powi(self.scale as i32);
        Some(self.rounding.round_f64(sum / count as f64 * factor) / factor)
    }
}
