//! Typed records for taxpayers and their monthly fiscal activity

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Static classification and workforce attributes of one taxpayer.
///
/// Classification fields are optional because the registry that owns these
/// rows does not enforce them; the feature builder rejects profiles that lack
/// them instead of guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxpayerProfile {
    pub taxpayer_id: i64,
    /// Tax identification number
    pub inn: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub taxpayer_type: Option<String>,
    /// Declared tax regime; falls back to `taxpayer_type` when absent
    #[serde(default)]
    pub tax_type: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub registration_district: Option<String>,
    #[serde(default)]
    pub has_employees: Option<bool>,
    /// Only meaningful when `has_employees` is true
    #[serde(default)]
    pub employees_count: Option<u32>,
}

impl TaxpayerProfile {
    /// Tax regime used for features and filtering
    pub fn effective_tax_type(&self) -> Option<&str> {
        self.tax_type
            .as_deref()
            .or(self.taxpayer_type.as_deref())
    }
}

/// One month of recorded activity for one taxpayer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    pub taxpayer_id: i64,
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub transactions: i64,
    pub tax: f64,
    #[serde(default)]
    pub tax_type: Option<String>,
}

/// One month of forecast activity, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPrediction {
    pub taxpayer_id: i64,
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub transactions: i64,
    pub tax: f64,
    pub tax_type: Option<String>,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}

impl MonthlyPrediction {
    /// Drop provenance so the row can be merged with real observations
    pub fn to_observation(&self) -> MonthlyObservation {
        MonthlyObservation {
            taxpayer_id: self.taxpayer_id,
            year: self.year,
            month: self.month,
            income: self.income,
            transactions: self.transactions,
            tax: self.tax,
            tax_type: self.tax_type.clone(),
        }
    }
}

/// The three forecast metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Income,
    Transactions,
    Tax,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Income, Metric::Transactions, Metric::Tax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Income => "income",
            Metric::Transactions => "transactions",
            Metric::Tax => "tax",
        }
    }

    /// File name of the trained artifact for this metric
    pub fn artifact_file_name(&self) -> String {
        format!("{}_model.json", self.as_str())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where monthly rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Real,
    Predicted,
}

/// Optional constraints when listing taxpayers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerFilter {
    pub tax_type: Option<String>,
    pub district: Option<String>,
}

impl TaxpayerFilter {
    pub fn by_tax_type(tax_type: impl Into<String>) -> Self {
        Self {
            tax_type: Some(tax_type.into()),
            district: None,
        }
    }

    pub fn matches(&self, profile: &TaxpayerProfile) -> bool {
        let tax_type_ok = match &self.tax_type {
            Some(wanted) => profile.effective_tax_type() == Some(wanted.as_str()),
            None => true,
        };
        let district_ok = match &self.district {
            Some(wanted) => profile.registration_district.as_deref() == Some(wanted.as_str()),
            None => true,
        };
        tax_type_ok && district_ok
    }
}

/// Loader for CSV exports of the taxpayer registry and monthly ledger
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load taxpayer profiles from a CSV file with a header row
    pub fn taxpayers_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TaxpayerProfile>> {
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let mut profiles = Vec::new();
        for record in reader.deserialize() {
            profiles.push(record?);
        }
        Ok(profiles)
    }

    /// Load monthly observations from a CSV file with a header row
    pub fn observations_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<MonthlyObservation>> {
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: MonthlyObservation = record?;
            Self::validate_observation(&row)?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn validate_observation(row: &MonthlyObservation) -> Result<()> {
        if !(1..=12).contains(&row.month) {
            return Err(ForecastError::DataError(format!(
                "Taxpayer {} has month {} outside 1..=12 in year {}",
                row.taxpayer_id, row.month, row.year
            )));
        }
        Ok(())
    }
}
