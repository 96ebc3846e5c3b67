//! Year-over-year growth rates

/// Percent change from `previous` to `current`.
///
/// Returns `None` when the change is undefined: a zero or non-finite
/// previous value, or a non-finite current value.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }

    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

/// Growth of each element relative to the one before it.
///
/// The first element never has a predecessor, so its growth is `None`.
pub fn growth_rates(values: &[f64]) -> Vec<Option<f64>> {
    let mut rates = Vec::with_capacity(values.len());
    if values.is_empty() {
        return rates;
    }

    rates.push(None);
    rates.extend(values.windows(2).map(|w| percent_change(w[0], w[1])));
    rates
}
