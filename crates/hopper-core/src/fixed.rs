use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for speeds (seconds per action), upgrade prices, and currency so that
/// upgrade track keys are totally ordered and comparisons are deterministic.
pub type Fixed64 = I32F32;

/// Wall-clock instants and durations in milliseconds.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in the tick loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert an f64 to Fixed64, returning `None` for non-finite or out-of-range
/// values instead of panicking. Used when reading configuration.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    if !v.is_finite() {
        return None;
    }
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and persistence.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// `floor(seconds * 1000)` as a millisecond duration. Negative inputs clamp to 0.
#[inline]
pub fn seconds_to_millis(seconds: Fixed64) -> Millis {
    let millis = seconds.saturating_mul_int(1000);
    if millis <= Fixed64::ZERO {
        return 0;
    }
    // to_num truncates towards negative infinity, which is floor here.
    millis.to_num::<u64>()
}
