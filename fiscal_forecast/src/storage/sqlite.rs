//! SQLite-backed repository

use crate::data::{DataSource, MonthlyObservation, MonthlyPrediction, TaxpayerFilter, TaxpayerProfile};
use crate::error::{ForecastError, Result};
use crate::storage::{
    normalize_tax_type, AggregateKey, AggregateTable, InsertOutcome, MaterializedAggregate,
    Repository,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Busy timeout applied to every connection (ms)
const BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS taxpayer (
    taxpayer_id INTEGER PRIMARY KEY,
    inn TEXT NOT NULL UNIQUE,
    full_name TEXT,
    taxpayer_type TEXT,
    tax_type TEXT,
    activity_type TEXT,
    registration_district TEXT,
    has_employees INTEGER,
    employees_count INTEGER
);

CREATE TABLE IF NOT EXISTS monthly_tax_data (
    taxpayer_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    income REAL NOT NULL,
    transactions INTEGER NOT NULL,
    tax REAL NOT NULL,
    tax_type TEXT
);
CREATE INDEX IF NOT EXISTS idx_monthly_year ON monthly_tax_data (year, month);

CREATE TABLE IF NOT EXISTS predict (
    taxpayer_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    income REAL NOT NULL,
    transactions INTEGER NOT NULL,
    tax REAL NOT NULL,
    tax_type TEXT,
    model_version TEXT NOT NULL,
    generated_at TEXT NOT NULL,
    UNIQUE (taxpayer_id, year, month)
);

CREATE TABLE IF NOT EXISTS yearly_growth_general (
    year INTEGER NOT NULL,
    tax_type TEXT,
    tax_type_key TEXT NOT NULL,
    income REAL NOT NULL,
    transactions REAL NOT NULL,
    tax REAL NOT NULL,
    income_growth REAL,
    transactions_growth REAL,
    tax_growth REAL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (year, tax_type_key)
);

CREATE TABLE IF NOT EXISTS yearly_growth_median (
    year INTEGER NOT NULL,
    tax_type TEXT,
    tax_type_key TEXT NOT NULL,
    income REAL NOT NULL,
    transactions REAL NOT NULL,
    tax REAL NOT NULL,
    income_growth REAL,
    transactions_growth REAL,
    tax_growth REAL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (year, tax_type_key)
);
";

const TAXPAYER_COLUMNS: &str = "taxpayer_id, inn, full_name, taxpayer_type, tax_type, \
     activity_type, registration_district, has_employees, employees_count";

const OBSERVATION_COLUMNS: &str = "taxpayer_id, year, month, income, transactions, tax, tax_type";

const PREDICTION_COLUMNS: &str = "taxpayer_id, year, month, income, transactions, tax, tax_type, \
     model_version, generated_at";

const AGGREGATE_COLUMNS: &str = "year, tax_type, income, transactions, tax, income_growth, \
     transactions_growth, tax_growth, created_at";

/// Repository over a single SQLite connection.
///
/// The connection sits behind a mutex; each trait call holds it for the
/// whole statement or transaction.
#[derive(Debug)]
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened database: {}", path.display());
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Close the connection, reporting any error from SQLite
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| ForecastError::StorageError("SQLite connection lock poisoned".to_string()))?;
        conn.close().map_err(|(_, err)| ForecastError::from(err))
    }

    /// Load taxpayer profiles (registry ingestion)
    pub fn insert_taxpayers(&self, taxpayers: &[TaxpayerProfile]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO taxpayer ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                TAXPAYER_COLUMNS
            ))?;
            for t in taxpayers {
                stmt.execute(params![
                    t.taxpayer_id,
                    t.inn,
                    t.full_name,
                    t.taxpayer_type,
                    t.tax_type,
                    t.activity_type,
                    t.registration_district,
                    t.has_employees,
                    t.employees_count,
                ])?;
            }
        }
        tx.commit()?;
        Ok(taxpayers.len())
    }

    /// Load real monthly observations (ledger ingestion)
    pub fn insert_observations(&self, rows: &[MonthlyObservation]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO monthly_tax_data ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                OBSERVATION_COLUMNS
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.taxpayer_id,
                    row.year,
                    row.month,
                    row.income,
                    row.transactions,
                    row.tax,
                    row.tax_type,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ForecastError::StorageError("SQLite connection lock poisoned".to_string()))
    }
}

fn map_taxpayer(row: &Row<'_>) -> rusqlite::Result<TaxpayerProfile> {
    Ok(TaxpayerProfile {
        taxpayer_id: row.get(0)?,
        inn: row.get(1)?,
        full_name: row.get(2)?,
        taxpayer_type: row.get(3)?,
        tax_type: row.get(4)?,
        activity_type: row.get(5)?,
        registration_district: row.get(6)?,
        has_employees: row.get(7)?,
        employees_count: row.get(8)?,
    })
}

fn map_observation(row: &Row<'_>) -> rusqlite::Result<MonthlyObservation> {
    Ok(MonthlyObservation {
        taxpayer_id: row.get(0)?,
        year: row.get(1)?,
        month: row.get(2)?,
        income: row.get(3)?,
        transactions: row.get(4)?,
        tax: row.get(5)?,
        tax_type: row.get(6)?,
    })
}

fn map_prediction(row: &Row<'_>) -> rusqlite::Result<MonthlyPrediction> {
    Ok(MonthlyPrediction {
        taxpayer_id: row.get(0)?,
        year: row.get(1)?,
        month: row.get(2)?,
        income: row.get(3)?,
        transactions: row.get(4)?,
        tax: row.get(5)?,
        tax_type: row.get(6)?,
        model_version: row.get(7)?,
        generated_at: row.get(8)?,
    })
}

fn map_aggregate(row: &Row<'_>) -> rusqlite::Result<MaterializedAggregate> {
    Ok(MaterializedAggregate {
        year: row.get(0)?,
        tax_type: row.get(1)?,
        income: row.get(2)?,
        transactions: row.get(3)?,
        tax: row.get(4)?,
        income_growth: row.get(5)?,
        transactions_growth: row.get(6)?,
        tax_growth: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn insert_prediction_rows(tx: &rusqlite::Transaction<'_>, rows: &[MonthlyPrediction]) -> Result<usize> {
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO predict ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        PREDICTION_COLUMNS
    ))?;
    for p in rows {
        stmt.execute(params![
            p.taxpayer_id,
            p.year,
            p.month,
            p.income,
            p.transactions,
            p.tax,
            p.tax_type,
            p.model_version,
            p.generated_at,
        ])?;
    }
    Ok(rows.len())
}

impl Repository for SqliteRepository {
    fn get_years(&self) -> Result<Vec<i32>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT year FROM monthly_tax_data ORDER BY year")?;
        let years = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i32>>>()?;
        Ok(years)
    }

    fn get_taxpayer(&self, inn: &str) -> Result<Option<TaxpayerProfile>> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM taxpayer WHERE inn = ?1", TAXPAYER_COLUMNS),
                params![inn],
                map_taxpayer,
            )
            .optional()?;
        Ok(profile)
    }

    fn get_monthly_by_taxpayer(&self, inn: &str) -> Result<Vec<MonthlyObservation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.taxpayer_id, m.year, m.month, m.income, m.transactions, m.tax, m.tax_type
             FROM monthly_tax_data m
             JOIN taxpayer t ON t.taxpayer_id = m.taxpayer_id
             WHERE t.inn = ?1
             ORDER BY m.year, m.month",
        )?;
        let rows = stmt
            .query_map(params![inn], map_observation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_all_taxpayers(&self, filter: &TaxpayerFilter) -> Result<Vec<TaxpayerProfile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM taxpayer
             WHERE (?1 IS NULL OR COALESCE(tax_type, taxpayer_type) = ?1)
               AND (?2 IS NULL OR registration_district = ?2)
             ORDER BY taxpayer_id",
            TAXPAYER_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![filter.tax_type.as_deref(), filter.district.as_deref()],
                map_taxpayer,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count_taxpayers(&self, filter: &TaxpayerFilter) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM taxpayer
             WHERE (?1 IS NULL OR COALESCE(tax_type, taxpayer_type) = ?1)
               AND (?2 IS NULL OR registration_district = ?2)",
            params![filter.tax_type.as_deref(), filter.district.as_deref()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_monthly_data(&self, source: DataSource, tax_type: Option<&str>) -> Result<Vec<MonthlyObservation>> {
        let table = match source {
            DataSource::Real => "monthly_tax_data",
            DataSource::Predicted => "predict",
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE (?1 IS NULL OR tax_type = ?1) ORDER BY year, month, taxpayer_id",
            OBSERVATION_COLUMNS, table
        ))?;
        let rows = stmt
            .query_map(params![tax_type], map_observation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_predictions(&self, year: Option<i32>) -> Result<Vec<MonthlyPrediction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM predict WHERE (?1 IS NULL OR year = ?1) ORDER BY year, taxpayer_id, month",
            PREDICTION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![year], map_prediction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn max_year(&self, source: DataSource) -> Result<Option<i32>> {
        let sql = match source {
            DataSource::Real => "SELECT MAX(year) FROM monthly_tax_data",
            DataSource::Predicted => "SELECT MAX(year) FROM predict",
        };
        let conn = self.lock()?;
        let year: Option<i32> = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(year)
    }

    fn get_materialized(&self, table: AggregateTable, key: &AggregateKey) -> Result<Option<MaterializedAggregate>> {
        let conn = self.lock()?;
        let key = AggregateKey::new(key.year, key.tax_type.as_deref());
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE year = ?1 AND tax_type_key = ?2",
                    AGGREGATE_COLUMNS,
                    table.table_name()
                ),
                params![key.year, key.storage_key()],
                map_aggregate,
            )
            .optional()?;
        Ok(row)
    }

    fn list_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<Vec<MaterializedAggregate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE tax_type_key = ?1 ORDER BY year",
            AGGREGATE_COLUMNS,
            table.table_name()
        ))?;
        let key = normalize_tax_type(tax_type).unwrap_or("");
        let rows = stmt
            .query_map(params![key], map_aggregate)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_materialized(&self, table: AggregateTable, row: &MaterializedAggregate) -> Result<InsertOutcome> {
        let conn = self.lock()?;
        let key = row.key();
        // The primary key turns a concurrent duplicate into a silent no-op
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (year, tax_type, tax_type_key, income, transactions, tax,
                     income_growth, transactions_growth, tax_growth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                table.table_name()
            ),
            params![
                key.year,
                key.tax_type,
                key.storage_key(),
                row.income,
                row.transactions,
                row.tax,
                row.income_growth,
                row.transactions_growth,
                row.tax_growth,
                row.created_at,
            ],
        )?;

        if changed == 0 {
            debug!("{} already holds {:?}", table, key);
            return Ok(InsertOutcome::AlreadyPresent);
        }
        Ok(InsertOutcome::Inserted)
    }

    fn delete_materialized(&self, table: AggregateTable, tax_type: Option<&str>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE tax_type_key = ?1", table.table_name()),
            params![normalize_tax_type(tax_type).unwrap_or("")],
        )?;
        Ok(removed)
    }

    fn insert_predictions(&self, rows: &[MonthlyPrediction]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = insert_prediction_rows(&tx, rows)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn delete_predictions(&self, year: i32) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM predict WHERE year = ?1", params![year])?;
        Ok(removed)
    }

    fn replace_predictions(&self, year: i32, rows: &[MonthlyPrediction]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM predict WHERE year = ?1", params![year])?;
        let inserted = insert_prediction_rows(&tx, rows)?;
        tx.commit()?;
        info!(
            "Replaced predictions for {}: removed {}, inserted {}",
            year, removed, inserted
        );
        Ok(inserted)
    }
}
