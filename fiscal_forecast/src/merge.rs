//! Combining real and predicted monthly series

use crate::data::{MonthlyObservation, MonthlyPrediction};

/// Concatenate `real` and `predicted` and order the result by (year, month).
///
/// The sort is stable, so for equal keys real rows come before predicted
/// ones. Nothing is deduplicated: when both series cover the same year, both
/// contribute to later aggregates. Keeping forecasts strictly after the last
/// real year is the caller's job.
pub fn merge_series(
    real: &[MonthlyObservation],
    predicted: &[MonthlyPrediction],
) -> Vec<MonthlyObservation> {
    let mut merged = Vec::with_capacity(real.len() + predicted.len());
    merged.extend_from_slice(real);
    merged.extend(predicted.iter().map(MonthlyPrediction::to_observation));
    merged.sort_by_key(|row| (row.year, row.month));
    merged
}

/// Keep rows whose tax type equals `tax_type`; `None` keeps everything
pub fn filter_by_tax_type(rows: &[MonthlyObservation], tax_type: Option<&str>) -> Vec<MonthlyObservation> {
    match tax_type {
        Some(wanted) => rows
            .iter()
            .filter(|row| row.tax_type.as_deref() == Some(wanted))
            .cloned()
            .collect(),
        None => rows.to_vec(),
    }
}

/// Same as [`filter_by_tax_type`] for predictions
pub fn filter_predictions_by_tax_type(
    rows: &[MonthlyPrediction],
    tax_type: Option<&str>,
) -> Vec<MonthlyPrediction> {
    match tax_type {
        Some(wanted) => rows
            .iter()
            .filter(|row| row.tax_type.as_deref() == Some(wanted))
            .cloned()
            .collect(),
        None => rows.to_vec(),
    }
}
