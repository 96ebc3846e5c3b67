//! Repository abstraction over taxpayer, ledger, prediction and
//! materialized-aggregate tables
//!
//! Reads return empty collections (or `None`) when nothing matches; only
//! genuine I/O failures surface as [`ForecastError::StorageError`].
//!
//! [`ForecastError::StorageError`]: crate::error::ForecastError::StorageError

use crate::aggregation::{GrowthRecord, Statistic};
use crate::data::{DataSource, MonthlyObservation, MonthlyPrediction, TaxpayerFilter, TaxpayerProfile};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// The two persisted growth tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateTable {
    /// Sum-based yearly rollups
    General,
    /// Median-based yearly rollups
    Median,
}

impl AggregateTable {
    pub const ALL: [AggregateTable; 2] = [AggregateTable::General, AggregateTable::Median];

    /// Statistic the table is populated with
    pub fn statistic(&self) -> Statistic {
        match self {
            AggregateTable::General => Statistic::Sum,
            AggregateTable::Median => Statistic::Median,
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            AggregateTable::General => "yearly_growth_general",
            AggregateTable::Median => "yearly_growth_median",
        }
    }
}

impl fmt::Display for AggregateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for AggregateTable {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "general" | "sum" => Ok(AggregateTable::General),
            "median" => Ok(AggregateTable::Median),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown aggregate table: {}",
                other
            ))),
        }
    }
}

/// Identity of a materialized row: (year, tax type or null).
///
/// An empty tax type is the same key as null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    pub year: i32,
    pub tax_type: Option<String>,
}

impl AggregateKey {
    pub fn new(year: i32, tax_type: Option<&str>) -> Self {
        Self {
            year,
            tax_type: normalize_tax_type(tax_type).map(str::to_string),
        }
    }

    /// Non-null column value used for uniqueness in SQL backends
    pub fn storage_key(&self) -> &str {
        self.tax_type.as_deref().unwrap_or("")
    }
}

pub(crate) fn normalize_tax_type(tax_type: Option<&str>) -> Option<&str> {
    tax_type.filter(|t| !t.is_empty())
}

/// A persisted yearly rollup with its growth figures. Frozen once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedAggregate {
    pub year: i32,
    pub tax_type: Option<String>,
    pub income: f64,
    pub transactions: f64,
    pub tax: f64,
    pub income_growth: Option<f64>,
    pub transactions_growth: Option<f64>,
    pub tax_growth: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl MaterializedAggregate {
    pub fn from_growth(record: &GrowthRecord, tax_type: Option<&str>, created_at: DateTime<Utc>) -> Self {
        Self {
            year: record.year,
            tax_type: normalize_tax_type(tax_type).map(str::to_string),
            income: record.income,
            transactions: record.transactions,
            tax: record.tax,
            income_growth: record.income_growth,
            transactions_growth: record.transactions_growth,
            tax_growth: record.tax_growth,
            created_at,
        }
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.year, self.tax_type.as_deref())
    }
}

/// Result of an insert-if-absent write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// The key already existed; nothing was written
    AlreadyPresent,
}

/// Tabular store consumed by the pipeline.
///
/// Implementations must make [`Repository::insert_materialized`] an atomic
/// insert-if-absent and [`Repository::replace_predictions`] all-or-nothing,
/// so concurrent callers cannot create duplicates or expose a half-replaced
/// year.
pub trait Repository: Send + Sync {
    /// Distinct years present in real observations, ascending
    fn get_years(&self) -> Result<Vec<i32>>;

    /// Profile by tax identification number
    fn get_taxpayer(&self, inn: &str) -> Result<Option<TaxpayerProfile>>;

    /// Real observations of one taxpayer, ordered by (year, month)
    fn get_monthly_by_taxpayer(&self, inn: &str) -> Result<Vec<MonthlyObservation>>;

    /// Profiles matching `filter`, ordered by taxpayer id
    fn get_all_taxpayers(&self, filter: &TaxpayerFilter) -> Result<Vec<TaxpayerProfile>>;

    fn count_taxpayers(&self, filter: &TaxpayerFilter) -> Result<usize> {
        Ok(self.get_all_taxpayers(filter)?.len())
    }

    /// Monthly rows of `source`, optionally restricted to one tax type,
    /// ordered by (year, month)
    fn get_monthly_data(&self, source: DataSource, tax_type: Option<&str>) -> Result<Vec<MonthlyObservation>>;

    /// Stored predictions, for one year or all years
    fn get_predictions(&self, year: Option<i32>) -> Result<Vec<MonthlyPrediction>>;

    /// Latest year present in `source`
    fn max_year(&self, source: DataSource) -> Result<Option<i32>>;

    fn get_materialized(&self, table: AggregateTable, key: &AggregateKey) -> Result<Option<MaterializedAggregate>>;

    /// Rows of `table` for one tax-type key (`None` is the null key),
    /// ordered by year
    fn list_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<Vec<MaterializedAggregate>>;

    /// Insert `row` unless its key exists. Never updates an existing row.
    fn insert_materialized(&self, table: AggregateTable, row: &MaterializedAggregate) -> Result<InsertOutcome>;

    /// Drop every row of one tax-type key, returning how many were removed
    fn delete_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<usize>;

    fn insert_predictions(&self, rows: &[MonthlyPrediction]) -> Result<usize>;

    fn delete_predictions(&self, year: i32) -> Result<usize>;

    /// Delete the predictions of `year` and insert `rows` as one unit
    fn replace_predictions(&self, year: i32, rows: &[MonthlyPrediction]) -> Result<usize>;
}
