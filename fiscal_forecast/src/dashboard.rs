//! Read service behind the dashboard
//!
//! Every query returns a [`ReadOutcome`]: either data or a "no data"
//! reason. Storage and model failures stay `Err`, so callers can tell an
//! empty answer from a broken one.

use crate::aggregation::{
    aggregate_monthly, aggregate_yearly, calculate_growth, GrowthRecord, MonthlyAggregate,
    Statistic, YearlyAggregate,
};
use crate::data::{DataSource, MonthlyObservation, MonthlyPrediction, TaxpayerFilter, TaxpayerProfile};
use crate::error::{ForecastError, Result};
use crate::features::build_future_rows;
use crate::forecast::{summarize_by_taxpayer, ForecastAdapter, TaxpayerForecastSummary};
use crate::freshness::FreshnessOrchestrator;
use crate::materialize::MaterializationLoader;
use crate::merge::merge_series;
use crate::storage::{AggregateTable, MaterializedAggregate, Repository};
use chrono::Utc;
use serde::Serialize;

const TAXPAYER_NOT_FOUND: &str = "Taxpayer not found";
const NO_DATA: &str = "No data found";

/// Answer of a read query
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Data(T),
    /// Valid query with nothing to show
    NoData(String),
}

impl<T> ReadOutcome<T> {
    pub fn no_data(reason: impl Into<String>) -> Self {
        ReadOutcome::NoData(reason.into())
    }

    pub fn is_data(&self) -> bool {
        matches!(self, ReadOutcome::Data(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ReadOutcome::Data(data) => Some(data),
            ReadOutcome::NoData(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ReadOutcome::Data(data) => Some(data),
            ReadOutcome::NoData(_) => None,
        }
    }

    /// JSON envelope: `{ "success": true, "data": .. }` or
    /// `{ "success": false, "error": .. }`
    pub fn to_response(&self) -> ApiResponse<&T> {
        match self {
            ReadOutcome::Data(data) => ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            },
            ReadOutcome::NoData(reason) => ApiResponse {
                success: false,
                data: None,
                error: Some(reason.clone()),
            },
        }
    }
}

/// Serializable envelope handed to the transport layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// History plus on-the-fly forecast for one taxpayer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxpayerDashboard {
    pub taxpayer: TaxpayerProfile,
    /// Real and forecast months, ordered by (year, month)
    pub monthly: Vec<MonthlyObservation>,
    pub predicted: Vec<MonthlyPrediction>,
    pub yearly_sum: Vec<YearlyAggregate>,
    pub yearly_median: Vec<YearlyAggregate>,
    pub growth: Vec<GrowthRecord>,
}

/// Fleet-wide rollups over real data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalDashboard {
    pub statistic: Statistic,
    pub monthly: Vec<MonthlyAggregate>,
    pub yearly: Vec<YearlyAggregate>,
    pub growth: Vec<GrowthRecord>,
}

/// Next-year forecast for one taxpayer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxpayerForecast {
    pub year: i32,
    pub predictions: Vec<MonthlyPrediction>,
}

/// Monthly rollups of the current stored predictions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub year: Option<i32>,
    pub general: Vec<MonthlyAggregate>,
    pub median: Vec<MonthlyAggregate>,
    pub taxpayers: Vec<TaxpayerForecastSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub min_year: i32,
    pub max_year: i32,
    pub years: Vec<i32>,
}

/// Dashboard queries over a repository and a ready forecast adapter
pub struct DashboardService<'a> {
    repository: &'a dyn Repository,
    adapter: &'a ForecastAdapter,
    freshness: FreshnessOrchestrator<'a>,
}

impl<'a> DashboardService<'a> {
    pub fn new(repository: &'a dyn Repository, adapter: &'a ForecastAdapter) -> Self {
        Self {
            repository,
            adapter,
            freshness: FreshnessOrchestrator::new(repository, adapter),
        }
    }

    pub fn taxpayer(&self, inn: &str) -> Result<ReadOutcome<TaxpayerProfile>> {
        Ok(match self.repository.get_taxpayer(inn)? {
            Some(profile) => ReadOutcome::Data(profile),
            None => ReadOutcome::no_data(TAXPAYER_NOT_FOUND),
        })
    }

    pub fn monthly(&self, inn: &str) -> Result<ReadOutcome<Vec<MonthlyObservation>>> {
        let rows = self.repository.get_monthly_by_taxpayer(inn)?;
        Ok(non_empty(rows, NO_DATA))
    }

    pub fn yearly(&self, inn: &str, stat: Statistic) -> Result<ReadOutcome<Vec<YearlyAggregate>>> {
        let rows = self.repository.get_monthly_by_taxpayer(inn)?;
        if rows.is_empty() {
            return Ok(ReadOutcome::no_data(NO_DATA));
        }
        Ok(ReadOutcome::Data(aggregate_yearly(&rows, stat)?))
    }

    /// Growth of the taxpayer's yearly totals
    pub fn yearly_growth(&self, inn: &str) -> Result<ReadOutcome<Vec<GrowthRecord>>> {
        Ok(match self.yearly(inn, Statistic::Sum)? {
            ReadOutcome::Data(yearly) => ReadOutcome::Data(calculate_growth(&yearly)),
            ReadOutcome::NoData(reason) => ReadOutcome::NoData(reason),
        })
    }

    /// Real history plus forecasts for the `predict_years` years after it.
    /// The forecasts are computed on the fly and not stored.
    ///
    /// Fails with [`ForecastError::InvalidParameter`] when the horizon does
    /// not fit in the calendar year range.
    pub fn taxpayer_dashboard(&self, inn: &str, predict_years: u32) -> Result<ReadOutcome<TaxpayerDashboard>> {
        let horizon = i32::try_from(predict_years).map_err(|_| out_of_range(predict_years))?;
        let Some(taxpayer) = self.repository.get_taxpayer(inn)? else {
            return Ok(ReadOutcome::no_data(TAXPAYER_NOT_FOUND));
        };
        let history = self.repository.get_monthly_by_taxpayer(inn)?;
        let Some(last_year) = history.iter().map(|row| row.year).max() else {
            return Ok(ReadOutcome::no_data("No historical data"));
        };

        if last_year.checked_add(horizon).is_none() {
            return Err(out_of_range(predict_years));
        }

        let mut predicted = Vec::new();
        let generated_at = Utc::now();
        for offset in 1..=horizon {
            let rows = build_future_rows(&taxpayer, last_year + offset)?;
            predicted.extend(self.adapter.predict_monthly(&rows, generated_at)?);
        }

        let monthly = merge_series(&history, &predicted);
        let yearly_sum = aggregate_yearly(&monthly, Statistic::Sum)?;
        let yearly_median = aggregate_yearly(&monthly, Statistic::Median)?;
        let growth = calculate_growth(&yearly_sum);

        Ok(ReadOutcome::Data(TaxpayerDashboard {
            taxpayer,
            monthly,
            predicted,
            yearly_sum,
            yearly_median,
            growth,
        }))
    }

    /// Next-year forecast for one taxpayer, not stored
    pub fn taxpayer_forecast(&self, inn: &str) -> Result<ReadOutcome<TaxpayerForecast>> {
        Ok(match self.taxpayer_dashboard(inn, 1)? {
            ReadOutcome::Data(dashboard) => {
                let year = dashboard.predicted.first().map(|p| p.year).unwrap_or_default();
                ReadOutcome::Data(TaxpayerForecast {
                    year,
                    predictions: dashboard.predicted,
                })
            }
            ReadOutcome::NoData(reason) => ReadOutcome::NoData(reason),
        })
    }

    /// Monthly, yearly and growth rollups over all real data for a tax type
    pub fn global_dashboard(&self, stat: Statistic, tax_type: Option<&str>) -> Result<ReadOutcome<GlobalDashboard>> {
        let rows = self.repository.get_monthly_data(DataSource::Real, tax_type)?;
        if rows.is_empty() {
            return Ok(ReadOutcome::no_data(NO_DATA));
        }

        let monthly = aggregate_monthly(&rows, stat)?;
        let yearly = aggregate_yearly(&rows, stat)?;
        let growth = calculate_growth(&yearly);
        Ok(ReadOutcome::Data(GlobalDashboard {
            statistic: stat,
            monthly,
            yearly,
            growth,
        }))
    }

    /// Materialized growth series, computing and storing missing years first
    pub fn growth_series(
        &self,
        table: AggregateTable,
        tax_type: Option<&str>,
    ) -> Result<ReadOutcome<Vec<MaterializedAggregate>>> {
        self.freshness.ensure_predictions_current()?;
        MaterializationLoader::new(self.repository, table).load(tax_type)?;

        let rows = self.repository.list_materialized(table, tax_type)?;
        Ok(non_empty(rows, NO_DATA))
    }

    /// Rollups of the current prediction year, regenerating it if stale
    pub fn prediction_summary(&self) -> Result<ReadOutcome<PredictionSummary>> {
        let set = self.freshness.ensure_predictions_current()?;
        if set.predictions.is_empty() {
            return Ok(ReadOutcome::no_data("No prediction data"));
        }

        let rows: Vec<MonthlyObservation> = set
            .predictions
            .iter()
            .map(MonthlyPrediction::to_observation)
            .collect();
        Ok(ReadOutcome::Data(PredictionSummary {
            year: set.target_year,
            general: aggregate_monthly(&rows, Statistic::Sum)?,
            median: aggregate_monthly(&rows, Statistic::Median)?,
            taxpayers: summarize_by_taxpayer(&set.predictions),
        }))
    }

    pub fn year_range(&self) -> Result<ReadOutcome<YearRange>> {
        let years = self.repository.get_years()?;
        Ok(match (years.first(), years.last()) {
            (Some(&min_year), Some(&max_year)) => ReadOutcome::Data(YearRange {
                min_year,
                max_year,
                years,
            }),
            _ => ReadOutcome::no_data(NO_DATA),
        })
    }

    pub fn taxpayer_count(&self, tax_type: Option<&str>) -> Result<usize> {
        let filter = TaxpayerFilter {
            tax_type: tax_type.map(str::to_string),
            district: None,
        };
        self.repository.count_taxpayers(&filter)
    }
}

fn out_of_range(predict_years: u32) -> ForecastError {
    ForecastError::InvalidParameter(format!(
        "Forecast horizon of {} years is out of range",
        predict_years
    ))
}

fn non_empty<T>(rows: Vec<T>, reason: &str) -> ReadOutcome<Vec<T>> {
    if rows.is_empty() {
        ReadOutcome::no_data(reason)
    } else {
        ReadOutcome::Data(rows)
    }
}
