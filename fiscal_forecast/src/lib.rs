//! # Fiscal Forecast
//!
//! Forecast and aggregation materialization pipeline for taxpayer fiscal
//! activity.
//!
//! ## Features
//!
//! - Calendar feature rows for a taxpayer's forecast year
//! - Income, transaction and tax forecasts from three regression models
//! - Monthly and yearly rollups (sum or median) with year-over-year growth
//! - Real and forecast series merged into one timeline
//! - Insert-only materialization of yearly growth tables
//! - Freshness checks that keep stored predictions one year ahead of real data
//! - In-memory and SQLite repositories
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fiscal_forecast::config::PipelineConfig;
//! use fiscal_forecast::dashboard::DashboardService;
//! use fiscal_forecast::forecast::ForecastAdapter;
//! use fiscal_forecast::models::ModelStore;
//! use fiscal_forecast::storage::AggregateTable;
//!
//! # fn main() -> fiscal_forecast::Result<()> {
//! let config = PipelineConfig::resolve(None)?;
//! let repository = config.open_repository()?;
//!
//! // Models are loaded once; a missing artifact fails here, not per request
//! let store = ModelStore::load_dir(&config.models.dir, config.models.version.clone());
//! let adapter = ForecastAdapter::new(&store)?;
//!
//! let service = DashboardService::new(repository.as_ref(), &adapter);
//! let growth = service.growth_series(AggregateTable::General, None)?;
//! println!("{}", serde_json::to_string_pretty(&growth.to_response())?);
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod features;
pub mod forecast;
pub mod freshness;
pub mod logging;
pub mod materialize;
pub mod merge;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use crate::aggregation::{GrowthRecord, MonthlyAggregate, Statistic, YearlyAggregate};
pub use crate::config::PipelineConfig;
pub use crate::dashboard::{DashboardService, ReadOutcome};
pub use crate::data::{DataLoader, DataSource, Metric, MonthlyObservation, MonthlyPrediction, TaxpayerProfile};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{build_future_rows, FeatureRow, Season};
pub use crate::forecast::{ForecastAdapter, ForecastOutput};
pub use crate::freshness::{FreshnessOrchestrator, FreshnessStatus, PredictionSet};
pub use crate::materialize::{LoadReport, MaterializationLoader};
pub use crate::models::{model_fn, ModelStore, RegressionModel};
pub use crate::storage::{AggregateKey, AggregateTable, InMemoryRepository, Repository, SqliteRepository};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
