//! Forecast adapter: three metric models behind one call

use crate::data::{Metric, MonthlyPrediction};
use crate::error::{ForecastError, Result};
use crate::features::FeatureRow;
use crate::models::{ModelStore, RegressionModel};
use chrono::{DateTime, Utc};
use fiscal_math::{clip_non_negative, round_count, round_to};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Decimal places kept for monetary predictions
pub const MONEY_DECIMALS: u32 = 2;

/// Post-processed predictions, index-aligned with the input rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastOutput {
    pub income: Vec<f64>,
    pub transactions: Vec<i64>,
    pub tax: Vec<f64>,
}

impl ForecastOutput {
    pub fn len(&self) -> usize {
        self.income.len()
    }

    pub fn is_empty(&self) -> bool {
        self.income.is_empty()
    }
}

/// Runs the income, transaction-count and tax models over the same features.
///
/// Construction fails unless all three models are loaded, so a built adapter
/// is always ready.
#[derive(Clone)]
pub struct ForecastAdapter {
    income: Arc<dyn RegressionModel>,
    transactions: Arc<dyn RegressionModel>,
    tax: Arc<dyn RegressionModel>,
    model_version: String,
}

impl ForecastAdapter {
    /// Build an adapter from the loaded models in `store`
    pub fn new(store: &ModelStore) -> Result<Self> {
        let require = |metric: Metric| {
            store
                .model(metric)
                .ok_or(ForecastError::ModelUnavailable(metric))
        };

        Ok(Self {
            income: require(Metric::Income)?,
            transactions: require(Metric::Transactions)?,
            tax: require(Metric::Tax)?,
            model_version: store.version().to_string(),
        })
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Predict all three metrics for `rows`.
    ///
    /// Works for one taxpayer (12 rows) or a whole population in a single
    /// batch; regrouping by taxpayer is left to the caller. Outputs are
    /// clipped at zero, money is rounded to cents and counts to integers.
    pub fn predict(&self, rows: &[FeatureRow]) -> Result<ForecastOutput> {
        if rows.is_empty() {
            return Ok(ForecastOutput::default());
        }

        let income = run_model(self.income.as_ref(), Metric::Income, rows)?;
        let transactions = run_model(self.transactions.as_ref(), Metric::Transactions, rows)?;
        let tax = run_model(self.tax.as_ref(), Metric::Tax, rows)?;

        debug!("Predicted {} rows with {}", rows.len(), self.model_version);

        Ok(ForecastOutput {
            income: income.into_iter().map(money).collect(),
            transactions: transactions.into_iter().map(round_count).collect(),
            tax: tax.into_iter().map(money).collect(),
        })
    }

    /// Predict and attach each result to its taxpayer-month
    pub fn predict_monthly(
        &self,
        rows: &[FeatureRow],
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<MonthlyPrediction>> {
        let output = self.predict(rows)?;

        let predictions = rows
            .iter()
            .enumerate()
            .map(|(i, row)| MonthlyPrediction {
                taxpayer_id: row.taxpayer_id,
                year: row.year,
                month: row.month,
                income: output.income[i],
                transactions: output.transactions[i],
                tax: output.tax[i],
                tax_type: Some(row.tax_type.clone()),
                model_version: self.model_version.clone(),
                generated_at,
            })
            .collect::<Vec<_>>();

        info!(
            "Generated {} monthly predictions ({})",
            predictions.len(),
            self.model_version
        );
        Ok(predictions)
    }
}

fn run_model(model: &dyn RegressionModel, metric: Metric, rows: &[FeatureRow]) -> Result<Vec<f64>> {
    let values = model.predict(rows)?;
    if values.len() != rows.len() {
        return Err(ForecastError::ModelError(format!(
            "{} model `{}` returned {} values for {} rows",
            metric,
            model.name(),
            values.len(),
            rows.len()
        )));
    }
    Ok(values)
}

fn money(value: f64) -> f64 {
    round_to(clip_non_negative(value), MONEY_DECIMALS)
}

/// Predicted yearly totals for one taxpayer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxpayerForecastSummary {
    pub taxpayer_id: i64,
    pub year: i32,
    pub total_income: f64,
    pub total_transactions: i64,
    pub total_tax: f64,
}

/// Sum predictions per (taxpayer, year), ordered by taxpayer then year
pub fn summarize_by_taxpayer(predictions: &[MonthlyPrediction]) -> Vec<TaxpayerForecastSummary> {
    let mut totals: BTreeMap<(i64, i32), TaxpayerForecastSummary> = BTreeMap::new();

    for p in predictions {
        let entry = totals
            .entry((p.taxpayer_id, p.year))
            .or_insert_with(|| TaxpayerForecastSummary {
                taxpayer_id: p.taxpayer_id,
                year: p.year,
                total_income: 0.0,
                total_transactions: 0,
                total_tax: 0.0,
            });
        entry.total_income += p.income;
        entry.total_transactions += p.transactions;
        entry.total_tax += p.tax;
    }

    totals
        .into_values()
        .map(|mut s| {
            s.total_income = round_to(s.total_income, MONEY_DECIMALS);
            s.total_tax = round_to(s.total_tax, MONEY_DECIMALS);
            s
        })
        .collect()
}
