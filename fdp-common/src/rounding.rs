//! Decimal rounding utilities
//!
//! All weights are kept in kilograms. Persisted and elevated weight values
//! are rounded half-up to 6 decimal places; individual counts are rounded
//! half-up to integers. Rounding is half-up (not banker's) to match the
//! decimal semantics of the upstream data model.

/// Decimal scale applied to every persisted weight value (kg)
pub const WEIGHT_SCALE: u32 = 6;

/// Tolerance for floating-point equality on weights and factors
pub const EPSILON: f64 = 1e-9;

/// Round half-up at the given decimal scale.
///
/// Only meaningful for non-negative values (weights, factors, counts);
/// the data model never carries negative weights.
pub fn round_half_up(value: f64, scale: u32) -> f64 {
    let factor = 10f64.powi(scale as i32);
    (value * factor + 0.5).floor() / factor
}

/// Round a weight (kg) to the persisted scale of 6 decimals, half-up
pub fn round_weight(value: f64) -> f64 {
    round_half_up(value, WEIGHT_SCALE)
}

/// Round an individual count to an integer, half-up
pub fn round_count(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Floating-point equality within [`EPSILON`]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Equality of two optional values within [`EPSILON`]
/// (two absent values are considered equal)
pub fn approx_eq_opt(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => approx_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_weight_half_up() {
        assert_eq!(round_weight(1.2345675), 1.234568);
        assert_eq!(round_weight(1.2345674), 1.234567);
        assert_eq!(round_weight(0.0000005), 0.000001);
        assert_eq!(round_weight(12.5), 12.5);
    }

    #[test]
    fn test_round_weight_is_multiple_of_scale() {
        for v in [0.1234567891, 3.333333333, 7.0000004999] {
            let rounded = round_weight(v);
            let micros = rounded * 1e6;
            assert!(
                (micros - micros.round()).abs() < 1e-6,
                "{} not a multiple of 1e-6 kg",
                rounded
            );
        }
    }

    #[test]
    fn test_round_count_half_up() {
        assert_eq!(round_count(199.5), 200);
        assert_eq!(round_count(199.4999), 199);
        assert_eq!(round_count(0.5), 1);
        assert_eq!(round_count(0.4999), 0);
        assert_eq!(round_count(40.0), 40);
    }

    #[test]
    fn test_approx_eq_opt() {
        assert!(approx_eq_opt(None, None));
        assert!(approx_eq_opt(Some(1.25), Some(1.25 + 1e-12)));
        assert!(!approx_eq_opt(Some(1.25), None));
        assert!(!approx_eq_opt(Some(1.25), Some(1.26)));
    }
}
