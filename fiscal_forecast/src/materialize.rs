//! Insert-only materialization of yearly growth tables
//!
//! A key (year, tax type or null) moves from absent to present exactly once.
//! There is no update path: re-running a load skips every key that already
//! exists, so repeated loads never duplicate or mutate rows.

use crate::aggregation::{aggregate_yearly, calculate_growth, GrowthRecord};
use crate::data::DataSource;
use crate::error::Result;
use crate::merge::{filter_predictions_by_tax_type, merge_series};
use crate::storage::{
    normalize_tax_type, AggregateKey, AggregateTable, InsertOutcome, MaterializedAggregate,
    Repository,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// What one load wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: AggregateTable,
    pub tax_type: Option<String>,
    pub inserted: usize,
    pub skipped: usize,
}

/// Populates one growth table from real and predicted monthly rows
pub struct MaterializationLoader<'a> {
    repository: &'a dyn Repository,
    table: AggregateTable,
}

impl<'a> MaterializationLoader<'a> {
    pub fn new(repository: &'a dyn Repository, table: AggregateTable) -> Self {
        Self { repository, table }
    }

    /// Loader for the sum-based table
    pub fn general(repository: &'a dyn Repository) -> Self {
        Self::new(repository, AggregateTable::General)
    }

    /// Loader for the median-based table
    pub fn median(repository: &'a dyn Repository) -> Self {
        Self::new(repository, AggregateTable::Median)
    }

    pub fn table(&self) -> AggregateTable {
        self.table
    }

    /// Merge real and predicted rows for `tax_type`, roll them up per year
    /// with the table's statistic and compute growth. Writes nothing.
    pub fn compute(&self, tax_type: Option<&str>) -> Result<Vec<GrowthRecord>> {
        let tax_type = normalize_tax_type(tax_type);
        let real = self.repository.get_monthly_data(DataSource::Real, tax_type)?;
        let predicted = filter_predictions_by_tax_type(&self.repository.get_predictions(None)?, tax_type);

        if real.is_empty() && predicted.is_empty() {
            return Ok(Vec::new());
        }

        let merged = merge_series(&real, &predicted);
        let yearly = aggregate_yearly(&merged, self.table.statistic())?;
        Ok(calculate_growth(&yearly))
    }

    /// Materialize every year for `tax_type` whose key is not yet stored.
    ///
    /// Empty input is a no-op. A key that appears between the existence
    /// check and the insert (another writer) counts as skipped.
    pub fn load(&self, tax_type: Option<&str>) -> Result<LoadReport> {
        let tax_type = normalize_tax_type(tax_type);
        let mut report = LoadReport {
            table: self.table,
            tax_type: tax_type.map(str::to_string),
            inserted: 0,
            skipped: 0,
        };

        let growth = self.compute(tax_type)?;
        if growth.is_empty() {
            info!("No data for {} (tax type {:?})", self.table, tax_type);
            return Ok(report);
        }

        let created_at = Utc::now();
        for record in &growth {
            let key = AggregateKey::new(record.year, tax_type);
            if self.repository.get_materialized(self.table, &key)?.is_some() {
                debug!("Skip: {:?} already exists in {}", key, self.table);
                report.skipped += 1;
                continue;
            }

            let row = MaterializedAggregate::from_growth(record, tax_type, created_at);
            match self.repository.insert_materialized(self.table, &row)? {
                InsertOutcome::Inserted => report.inserted += 1,
                InsertOutcome::AlreadyPresent => {
                    debug!("Concurrent insert won for {:?} in {}", key, self.table);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "{} (tax type {:?}): inserted {}, skipped {}",
            self.table, tax_type, report.inserted, report.skipped
        );
        Ok(report)
    }
}

/// Load both tables for the null key and then for each listed tax type
pub fn materialize_all(repository: &dyn Repository, tax_types: &[String]) -> Result<Vec<LoadReport>> {
    let filters: Vec<Option<&str>> = std::iter::once(None)
        .chain(tax_types.iter().map(|t| Some(t.as_str())))
        .collect();

    let mut reports = Vec::with_capacity(filters.len() * AggregateTable::ALL.len());
    for table in AggregateTable::ALL {
        let loader = MaterializationLoader::new(repository, table);
        for tax_type in &filters {
            reports.push(loader.load(*tax_type)?);
        }
    }
    Ok(reports)
}
