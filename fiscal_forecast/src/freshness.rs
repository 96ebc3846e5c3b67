//! Keeps stored predictions one year ahead of the real data

use crate::data::{DataSource, MonthlyPrediction, TaxpayerFilter};
use crate::error::{ForecastError, Result};
use crate::features::build_population_rows;
use crate::forecast::ForecastAdapter;
use crate::storage::Repository;
use chrono::Utc;
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// Outcome of a freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    /// No real observations exist, so there is nothing to forecast from
    NoRealData,
    /// Stored predictions already cover a year past the last real year
    Current,
    /// A new prediction year was generated and stored
    Regenerated,
    /// Predictions were stale but no taxpayer profile could be forecast,
    /// so nothing was written
    NoProfiles,
}

/// The predictions in effect after a freshness check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSet {
    pub status: FreshnessStatus,
    pub last_real_year: Option<i32>,
    /// Year the predictions cover
    pub target_year: Option<i32>,
    pub predictions: Vec<MonthlyPrediction>,
    /// Taxpayers left out of a regeneration for malformed profiles
    pub skipped_taxpayers: Vec<i64>,
}

impl PredictionSet {
    fn empty(status: FreshnessStatus, last_real_year: Option<i32>) -> Self {
        Self {
            status,
            last_real_year,
            target_year: None,
            predictions: Vec::new(),
            skipped_taxpayers: Vec::new(),
        }
    }
}

/// Predictions are stale when none exist or they do not reach past the
/// last real year
pub fn is_stale(last_real_year: i32, last_prediction_year: Option<i32>) -> bool {
    match last_prediction_year {
        None => true,
        Some(year) => year <= last_real_year,
    }
}

/// Decides whether a prediction cycle must run and runs it.
///
/// The check-then-regenerate sequence is serialized by an internal lock, so
/// callers sharing one orchestrator never regenerate the same year twice.
pub struct FreshnessOrchestrator<'a> {
    repository: &'a dyn Repository,
    adapter: &'a ForecastAdapter,
    guard: Mutex<()>,
}

impl<'a> FreshnessOrchestrator<'a> {
    pub fn new(repository: &'a dyn Repository, adapter: &'a ForecastAdapter) -> Self {
        Self {
            repository,
            adapter,
            guard: Mutex::new(()),
        }
    }

    /// Make sure stored predictions cover `last_real_year + 1`.
    ///
    /// Freshness is judged per year only; changed models or revised real
    /// data inside an already covered year are not detected.
    pub fn ensure_predictions_current(&self) -> Result<PredictionSet> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| ForecastError::StorageError("Freshness lock poisoned".to_string()))?;

        let Some(last_real_year) = self.repository.max_year(DataSource::Real)? else {
            info!("No real data; nothing to forecast from");
            return Ok(PredictionSet::empty(FreshnessStatus::NoRealData, None));
        };

        let last_prediction_year = self.repository.max_year(DataSource::Predicted)?;
        if !is_stale(last_real_year, last_prediction_year) {
            info!(
                "Predictions current: last real year {}, last predicted year {:?}",
                last_real_year, last_prediction_year
            );
            return Ok(PredictionSet {
                status: FreshnessStatus::Current,
                last_real_year: Some(last_real_year),
                target_year: last_prediction_year,
                predictions: self.repository.get_predictions(None)?,
                skipped_taxpayers: Vec::new(),
            });
        }

        self.regenerate(last_real_year, last_real_year + 1)
    }

    fn regenerate(&self, last_real_year: i32, target_year: i32) -> Result<PredictionSet> {
        info!(
            "Predictions stale (last real year {}); generating {}",
            last_real_year, target_year
        );

        let profiles = self.repository.get_all_taxpayers(&TaxpayerFilter::default())?;
        let population = build_population_rows(&profiles, target_year);
        if population.rows.is_empty() {
            warn!("No usable taxpayer profiles; predictions for {} not generated", target_year);
            let mut set = PredictionSet::empty(FreshnessStatus::NoProfiles, Some(last_real_year));
            set.skipped_taxpayers = population.skipped;
            return Ok(set);
        }

        let predictions = self.adapter.predict_monthly(&population.rows, Utc::now())?;
        if predictions.iter().any(|p| p.year <= last_real_year) {
            return Err(ForecastError::DataError(format!(
                "Forecast rows must lie after the last real year {}",
                last_real_year
            )));
        }

        self.repository.replace_predictions(target_year, &predictions)?;

        Ok(PredictionSet {
            status: FreshnessStatus::Regenerated,
            last_real_year: Some(last_real_year),
            target_year: Some(target_year),
            predictions,
            skipped_taxpayers: population.skipped,
        })
    }
}
