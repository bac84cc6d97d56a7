//! Scalar values.
//!
//! A [`Value`] is what a record leaf holds and what a [`crate::Difference`]
//! reports. The variant set is closed so that every value can be rendered
//! into the report uniformly.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A scalar field value, or the absence of one.
///
/// Numbers come in three flavours: `Int` for integral values, `Float` for
/// binary floating point (as delivered by most decoders), and `Decimal` for
/// exact fixed-point values whose scale should survive into the report
/// (`10.00` stays `10.00`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// The field is unset.
    #[default]
    Absent,
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
}

impl Value {
    /// Returns true for [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Returns true for the numeric variants.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    /// Converts a numeric value to an exact decimal.
    ///
    /// Floats go through their shortest round-trip text form, so `12.3456`
    /// becomes exactly `12.3456` rather than its binary expansion. Returns
    /// `None` for non-numeric values, NaN, infinities, and magnitudes outside
    /// the decimal range.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Float(f) if f.is_finite() => {
                Decimal::from_str(&f.to_string()).ok().or_else(|| Decimal::from_f64(*f))
            }
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Short name of the variant, used in log fields.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Absent, Into::into)
    }
}
