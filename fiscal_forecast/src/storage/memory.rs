//! Mutex-guarded in-process repository

use crate::data::{
    DataLoader, DataSource, MonthlyObservation, MonthlyPrediction, TaxpayerFilter, TaxpayerProfile,
};
use crate::error::{ForecastError, Result};
use crate::merge::{filter_by_tax_type, filter_predictions_by_tax_type};
use crate::storage::{
    normalize_tax_type, AggregateKey, AggregateTable, InsertOutcome, MaterializedAggregate,
    Repository,
};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug, Default)]
struct State {
    taxpayers: Vec<TaxpayerProfile>,
    observations: Vec<MonthlyObservation>,
    predictions: Vec<MonthlyPrediction>,
    general: BTreeMap<AggregateKey, MaterializedAggregate>,
    median: BTreeMap<AggregateKey, MaterializedAggregate>,
    writes: usize,
}

impl State {
    fn table(&self, table: AggregateTable) -> &BTreeMap<AggregateKey, MaterializedAggregate> {
        match table {
            AggregateTable::General => &self.general,
            AggregateTable::Median => &self.median,
        }
    }

    fn table_mut(&mut self, table: AggregateTable) -> &mut BTreeMap<AggregateKey, MaterializedAggregate> {
        match table {
            AggregateTable::General => &mut self.general,
            AggregateTable::Median => &mut self.median,
        }
    }

    fn append_predictions(&mut self, rows: &[MonthlyPrediction]) -> Result<usize> {
        let mut seen: HashSet<(i64, i32, u32)> = self
            .predictions
            .iter()
            .map(|p| (p.taxpayer_id, p.year, p.month))
            .collect();

        for row in rows {
            if !seen.insert((row.taxpayer_id, row.year, row.month)) {
                return Err(ForecastError::StorageError(format!(
                    "Duplicate prediction for taxpayer {} at {}-{:02}",
                    row.taxpayer_id, row.year, row.month
                )));
            }
        }

        self.predictions.extend_from_slice(rows);
        Ok(rows.len())
    }

    fn remove_predictions(&mut self, year: i32) -> usize {
        let before = self.predictions.len();
        self.predictions.retain(|p| p.year != year);
        before - self.predictions.len()
    }
}

/// Repository held entirely in memory.
///
/// Every operation takes one lock, which makes insert-if-absent and
/// prediction replacement atomic.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taxpayers(mut self, taxpayers: Vec<TaxpayerProfile>) -> Self {
        if let Ok(state) = self.state.get_mut() {
            state.taxpayers = taxpayers;
        }
        self
    }

    pub fn with_observations(mut self, observations: Vec<MonthlyObservation>) -> Self {
        if let Ok(state) = self.state.get_mut() {
            state.observations = observations;
        }
        self
    }

    /// Seed from CSV exports of the registry and the monthly ledger
    pub fn from_csv<P: AsRef<Path>, Q: AsRef<Path>>(taxpayers: P, monthly: Q) -> Result<Self> {
        let taxpayers = DataLoader::taxpayers_from_csv(taxpayers)?;
        let observations = DataLoader::observations_from_csv(monthly)?;
        info!(
            "Loaded {} taxpayers and {} monthly rows from CSV",
            taxpayers.len(),
            observations.len()
        );
        Ok(Self::new()
            .with_taxpayers(taxpayers)
            .with_observations(observations))
    }

    /// Append real observations, as the external ingestion process would
    pub fn add_observations(&self, rows: &[MonthlyObservation]) -> Result<()> {
        let mut state = self.lock()?;
        state.observations.extend_from_slice(rows);
        Ok(())
    }

    /// Number of writes that changed prediction or materialized tables
    pub fn write_count(&self) -> Result<usize> {
        Ok(self.lock()?.writes)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ForecastError::StorageError("In-memory repository lock poisoned".to_string()))
    }
}

fn sorted(mut rows: Vec<MonthlyObservation>) -> Vec<MonthlyObservation> {
    rows.sort_by_key(|row| (row.year, row.month));
    rows
}

impl Repository for InMemoryRepository {
    fn get_years(&self) -> Result<Vec<i32>> {
        let state = self.lock()?;
        let mut years: Vec<i32> = state.observations.iter().map(|row| row.year).collect();
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }

    fn get_taxpayer(&self, inn: &str) -> Result<Option<TaxpayerProfile>> {
        let state = self.lock()?;
        Ok(state.taxpayers.iter().find(|t| t.inn == inn).cloned())
    }

    fn get_monthly_by_taxpayer(&self, inn: &str) -> Result<Vec<MonthlyObservation>> {
        let state = self.lock()?;
        let Some(taxpayer) = state.taxpayers.iter().find(|t| t.inn == inn) else {
            return Ok(Vec::new());
        };

        let rows = state
            .observations
            .iter()
            .filter(|row| row.taxpayer_id == taxpayer.taxpayer_id)
            .cloned()
            .collect();
        Ok(sorted(rows))
    }

    fn get_all_taxpayers(&self, filter: &TaxpayerFilter) -> Result<Vec<TaxpayerProfile>> {
        let state = self.lock()?;
        let mut taxpayers: Vec<TaxpayerProfile> = state
            .taxpayers
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        taxpayers.sort_by_key(|t| t.taxpayer_id);
        Ok(taxpayers)
    }

    fn get_monthly_data(&self, source: DataSource, tax_type: Option<&str>) -> Result<Vec<MonthlyObservation>> {
        let state = self.lock()?;
        let rows = match source {
            DataSource::Real => filter_by_tax_type(&state.observations, tax_type),
            DataSource::Predicted => filter_predictions_by_tax_type(&state.predictions, tax_type)
                .iter()
                .map(MonthlyPrediction::to_observation)
                .collect(),
        };
        Ok(sorted(rows))
    }

    fn get_predictions(&self, year: Option<i32>) -> Result<Vec<MonthlyPrediction>> {
        let state = self.lock()?;
        let mut rows: Vec<MonthlyPrediction> = state
            .predictions
            .iter()
            .filter(|p| year.map_or(true, |y| p.year == y))
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.year, p.taxpayer_id, p.month));
        Ok(rows)
    }

    fn max_year(&self, source: DataSource) -> Result<Option<i32>> {
        let state = self.lock()?;
        Ok(match source {
            DataSource::Real => state.observations.iter().map(|row| row.year).max(),
            DataSource::Predicted => state.predictions.iter().map(|row| row.year).max(),
        })
    }

    fn get_materialized(&self, table: AggregateTable, key: &AggregateKey) -> Result<Option<MaterializedAggregate>> {
        let state = self.lock()?;
        let key = AggregateKey::new(key.year, key.tax_type.as_deref());
        Ok(state.table(table).get(&key).cloned())
    }

    fn list_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<Vec<MaterializedAggregate>> {
        let state = self.lock()?;
        let tax_type = normalize_tax_type(tax_type);
        // BTreeMap iteration is ordered by key, so by year within a tax type
        Ok(state
            .table(table)
            .values()
            .filter(|row| row.tax_type.as_deref() == tax_type)
            .cloned()
            .collect())
    }

    fn insert_materialized(&self, table: AggregateTable, row: &MaterializedAggregate) -> Result<InsertOutcome> {
        let mut state = self.lock()?;
        let key = row.key();
        if state.table(table).contains_key(&key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        let mut stored = row.clone();
        stored.tax_type = key.tax_type.clone();
        state.table_mut(table).insert(key, stored);
        state.writes += 1;
        Ok(InsertOutcome::Inserted)
    }

    fn delete_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<usize> {
        let mut state = self.lock()?;
        let tax_type = normalize_tax_type(tax_type);
        let rows = state.table_mut(table);
        let before = rows.len();
        rows.retain(|key, _| key.tax_type.as_deref() != tax_type);
        let removed = before - rows.len();
        if removed > 0 {
            state.writes += 1;
        }
        Ok(removed)
    }

    fn insert_predictions(&self, rows: &[MonthlyPrediction]) -> Result<usize> {
        let mut state = self.lock()?;
        let inserted = state.append_predictions(rows)?;
        state.writes += 1;
        Ok(inserted)
    }

    fn delete_predictions(&self, year: i32) -> Result<usize> {
        let mut state = self.lock()?;
        let removed = state.remove_predictions(year);
        if removed > 0 {
            state.writes += 1;
        }
        Ok(removed)
    }

    fn replace_predictions(&self, year: i32, rows: &[MonthlyPrediction]) -> Result<usize> {
        let mut state = self.lock()?;

        // Stage on a copy so a rejected batch leaves the old year intact
        let previous = state.predictions.clone();
        let removed = state.remove_predictions(year);
        match state.append_predictions(rows) {
            Ok(inserted) => {
                state.writes += 1;
                info!(
                    "Replaced predictions for {}: removed {}, inserted {}",
                    year, removed, inserted
                );
                Ok(inserted)
            }
            Err(err) => {
                state.predictions = previous;
                Err(err)
            }
        }
    }
}
