//! Shared fixtures for the integration tests
#![allow(dead_code)]

use fiscal_forecast::data::{MonthlyObservation, TaxpayerProfile};
use fiscal_forecast::features::FeatureRow;
use fiscal_forecast::models::{model_fn, ModelStore};
use fiscal_forecast::{Metric, Result};

pub const MODEL_VERSION: &str = "linear_regression_v1.0";

pub fn profile(taxpayer_id: i64, tax_type: &str) -> TaxpayerProfile {
    TaxpayerProfile {
        taxpayer_id,
        inn: format!("INN{:04}", taxpayer_id),
        full_name: Some(format!("Taxpayer {}", taxpayer_id)),
        taxpayer_type: Some("individual".to_string()),
        tax_type: Some(tax_type.to_string()),
        activity_type: Some("retail".to_string()),
        registration_district: Some("central".to_string()),
        has_employees: Some(true),
        employees_count: Some(3),
    }
}

pub fn observation(
    taxpayer_id: i64,
    year: i32,
    month: u32,
    income: f64,
    transactions: i64,
    tax: f64,
    tax_type: &str,
) -> MonthlyObservation {
    MonthlyObservation {
        taxpayer_id,
        year,
        month,
        income,
        transactions,
        tax,
        tax_type: Some(tax_type.to_string()),
    }
}

/// Twelve months of flat activity for one taxpayer
pub fn year_of(taxpayer_id: i64, year: i32, income: f64, tax_type: &str) -> Vec<MonthlyObservation> {
    (1..=12)
        .map(|month| observation(taxpayer_id, year, month, income, 10, income / 10.0, tax_type))
        .collect()
}

/// Models with predictable output: income `1000 + month`, 5 transactions,
/// tax 10% of income
pub fn fixed_store() -> ModelStore {
    ModelStore::new(MODEL_VERSION)
        .with_model(
            Metric::Income,
            model_fn(|rows: &[FeatureRow]| -> Result<Vec<f64>> {
                Ok(rows.iter().map(|r| 1000.0 + r.month as f64).collect())
            }),
        )
        .with_model(
            Metric::Transactions,
            model_fn(|rows: &[FeatureRow]| -> Result<Vec<f64>> { Ok(vec![5.0; rows.len()]) }),
        )
        .with_model(
            Metric::Tax,
            model_fn(|rows: &[FeatureRow]| -> Result<Vec<f64>> {
                Ok(rows.iter().map(|r| (1000.0 + r.month as f64) / 10.0).collect())
            }),
        )
}
