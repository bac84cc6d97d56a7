//! Numeric tolerance.
//!
//! Two numbers are equal at precision `p` when both reduce to the same
//! `p`-digit fixed-scale string. Reduction is done on exact decimals so
//! binary float noise never decides the outcome.

use recon_types::Value;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest scale a decimal can carry; higher precisions are clamped.
pub const MAX_PRECISION: u32 = 28;

/// How a number is reduced to the configured precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Round half-up: midpoints move away from zero (`2.345` → `2.35`).
    #[default]
    HalfUp,
    /// Drop the extra digits (`12.345678` → `12.3456`).
    Truncate,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Rounding::Truncate => RoundingStrategy::ToZero,
        }
    }
}

/// Reduces a numeric value to `digits` fractional digits and renders it with
/// exactly that many digits. Returns `None` for values that have no decimal
/// form (non-numeric, NaN, infinities, out of range).
pub fn round_to(value: &Value, digits: u32, rounding: Rounding) -> Option<String> {
    let digits = digits.min(MAX_PRECISION);
    let mut rounded = value
        .to_decimal()?
        .round_dp_with_strategy(digits, rounding.strategy());
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    Some(format!("{:.*}", digits as usize, rounded))
}

/// [`round_to`] with [`Rounding::HalfUp`].
pub fn round_half_up(value: &Value, digits: u32) -> Option<String> {
    round_to(value, digits, Rounding::HalfUp)
}

/// Compares two numbers at `digits` precision.
///
/// Falls back to comparing the plain text forms when either value has no
/// decimal form, so `NaN` matches `NaN` and `inf` matches `inf`.
pub fn numbers_equal(a: &Value, b: &Value, digits: u32, rounding: Rounding) -> bool {
    match (round_to(a, digits, rounding), round_to(b, digits, rounding)) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}
