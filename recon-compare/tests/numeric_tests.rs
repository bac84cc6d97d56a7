use recon_compare::numeric::{numbers_equal, round_half_up, round_to, Rounding, MAX_PRECISION};
use recon_types::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Value {
    Value::Decimal(Decimal::from_str(s).unwrap())
}

// ── Rounding ─────────────────────────────────────────────────────

#[test]
fn pads_to_fixed_scale() {
    assert_eq!(round_half_up(&Value::Int(10), 2).as_deref(), Some("10.00"));
    assert_eq!(round_half_up(&Value::Float(1.5), 0).as_deref(), Some("2"));
}

#[test]
fn midpoint_rounds_away_from_zero() {
    assert_eq!(round_half_up(&dec("2.345"), 2).as_deref(), Some("2.35"));
    assert_eq!(round_half_up(&dec("-2.345"), 2).as_deref(), Some("-2.35"));
}

#[test]
fn half_up_carries_into_last_digit() {
    assert_eq!(round_half_up(&Value::Float(12.345678), 4).as_deref(), Some("12.3457"));
}

#[test]
fn truncate_drops_extra_digits() {
    assert_eq!(
        round_to(&Value::Float(12.345678), 4, Rounding::Truncate).as_deref(),
        Some("12.3456")
    );
    assert_eq!(round_to(&dec("-2.349"), 2, Rounding::Truncate).as_deref(), Some("-2.34"));
}

#[test]
fn float_noise_does_not_leak() {
    // 0.1 + 0.2 is 0.30000000000000004 in binary floating point.
    assert_eq!(round_half_up(&Value::Float(0.1 + 0.2), 5).as_deref(), Some("0.30000"));
}

#[test]
fn negative_zero_renders_as_zero() {
    assert_eq!(round_half_up(&Value::Float(-0.000001), 2).as_deref(), Some("0.00"));
    assert_eq!(
        round_to(&Value::Float(-0.009), 2, Rounding::Truncate).as_deref(),
        Some("0.00")
    );
}

#[test]
fn precision_is_clamped() {
    let s = round_half_up(&Value::Int(1), 40).unwrap();
    let digits = s.split('.').nth(1).unwrap();
    assert_eq!(digits.len(), MAX_PRECISION as usize);
}

#[test]
fn non_numeric_has_no_rounding() {
    assert!(round_half_up(&Value::from("1.0"), 2).is_none());
    assert!(round_half_up(&Value::Float(f64::NAN), 2).is_none());
}

// ── Equality ─────────────────────────────────────────────────────

#[test]
fn half_up_tolerance() {
    let a = Value::Float(10.00);
    let b = Value::Float(10.001);
    assert!(numbers_equal(&a, &b, 2, Rounding::HalfUp));
    assert!(!numbers_equal(&a, &b, 3, Rounding::HalfUp));
}

#[test]
fn half_up_separates_values_across_a_rounding_boundary() {
    let a = Value::Float(12.345678);
    let b = Value::Float(12.3456);
    assert!(!numbers_equal(&a, &b, 4, Rounding::HalfUp));
    assert!(numbers_equal(&a, &b, 3, Rounding::HalfUp));
}

#[test]
fn truncate_tolerance() {
    let a = Value::Float(12.345678);
    let b = Value::Float(12.3456);
    assert!(numbers_equal(&a, &b, 4, Rounding::Truncate));
    assert!(!numbers_equal(&a, &b, 6, Rounding::Truncate));
}

#[test]
fn nan_matches_nan_textually() {
    let nan = Value::Float(f64::NAN);
    assert!(numbers_equal(&nan, &nan, 5, Rounding::HalfUp));
    assert!(!numbers_equal(&nan, &Value::Float(1.0), 5, Rounding::HalfUp));
}
