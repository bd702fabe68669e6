//! Numeric conversion helpers centralizing lossy casts between clock seconds and quantities.

use num_traits::cast::cast;

/// Round a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    // i64::MAX is not representable in f64; anything at or past 2^63 saturates.
    let rounded = value.round();
    cast::<f64, i64>(rounded).unwrap_or(if rounded > 0.0 { i64::MAX } else { i64::MIN + 1 })
}

/// Floor a non-negative f64 into a count, saturating at `u64::MAX` and mapping
/// negatives and NaN to zero.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    cast::<f64, u64>(value.floor()).unwrap_or(u64::MAX)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert a u64 count to i64, saturating.
#[must_use]
pub fn u64_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_handles_non_finite_and_saturates() {
        assert_eq!(round_f64_to_i64(f64::NAN), 0);
        assert_eq!(round_f64_to_i64(f64::INFINITY), 0);
        assert_eq!(round_f64_to_i64(2.5), 3);
        assert_eq!(round_f64_to_i64(-2.4), -2);
        assert_eq!(round_f64_to_i64(1e30), i64::MAX);
    }

    #[test]
    fn floor_counts_are_never_negative() {
        assert_eq!(floor_f64_to_u64(-3.0), 0);
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(7.9), 7);
    }

    #[test]
    fn widening_conversions() {
        assert!((i64_to_f64(-5) + 5.0).abs() < f64::EPSILON);
        assert!((u64_to_f64(9) - 9.0).abs() < f64::EPSILON);
        assert_eq!(u64_to_i64(u64::MAX), i64::MAX);
    }
}
