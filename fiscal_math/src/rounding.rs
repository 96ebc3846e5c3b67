//! Post-processing helpers for model outputs

/// Round `value` to `decimals` decimal places (half away from zero)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Clamp negatives (and NaN) to zero
pub fn clip_non_negative(value: f64) -> f64 {
    // f64::max ignores a NaN operand
    value.max(0.0)
}

/// Clip at zero and round to the nearest whole count
pub fn round_count(value: f64) -> i64 {
    clip_non_negative(value).round() as i64
}
