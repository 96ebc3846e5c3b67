//! Command line driver for the fiscal forecast pipeline
//!
//! Prints JSON to stdout; logs go to stderr through `tracing`.

use clap::{Parser, Subcommand};
use fiscal_forecast::config::{ConfigSource, PipelineConfig};
use fiscal_forecast::dashboard::DashboardService;
use fiscal_forecast::forecast::ForecastAdapter;
use fiscal_forecast::freshness::FreshnessOrchestrator;
use fiscal_forecast::materialize::materialize_all;
use fiscal_forecast::models::{ModelReadiness, ModelStore};
use fiscal_forecast::storage::{AggregateTable, Repository};
use fiscal_forecast::{logging, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fiscal-pipeline")]
#[command(about = "Forecast and materialize taxpayer fiscal aggregates", version)]
struct Args {
    /// TOML configuration file (falls back to $FISCAL_FORECAST_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate predictions if stale, then materialize every growth table
    Refresh,
    /// Print one materialized growth series
    Growth {
        /// general or median
        #[arg(long, default_value = "general")]
        table: AggregateTable,
        /// Restrict to one tax type; omit for all taxpayers
        #[arg(long)]
        tax_type: Option<String>,
    },
    /// Print monthly rollups of the current prediction year
    Summary,
    /// Print model readiness and data year coverage
    Status,
}

#[derive(Serialize)]
struct Status {
    model_version: String,
    models: ModelReadiness,
    last_real_year: Option<i32>,
    last_prediction_year: Option<i32>,
    taxpayers: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = ConfigSource::locate(args.config.as_deref());
    let config = match PipelineConfig::from_source(&source) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging.filter);
    info!("Configuration loaded from {}", source);

    match run(&config, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &PipelineConfig, command: Command) -> Result<()> {
    let repository = config.open_repository()?;
    let store = ModelStore::load_dir(&config.models.dir, config.models.version.clone());

    if let Command::Status = command {
        let status = Status {
            model_version: store.version().to_string(),
            models: store.readiness(),
            last_real_year: repository.max_year(fiscal_forecast::DataSource::Real)?,
            last_prediction_year: repository.max_year(fiscal_forecast::DataSource::Predicted)?,
            taxpayers: repository.count_taxpayers(&Default::default())?,
        };
        return print_json(&status);
    }

    let adapter = ForecastAdapter::new(&store)?;
    match command {
        Command::Refresh => refresh(repository.as_ref(), &adapter, &config.materialize.tax_types),
        Command::Growth { table, tax_type } => {
            let service = DashboardService::new(repository.as_ref(), &adapter);
            print_json(&service.growth_series(table, tax_type.as_deref())?.to_response())
        }
        Command::Summary => {
            let service = DashboardService::new(repository.as_ref(), &adapter);
            print_json(&service.prediction_summary()?.to_response())
        }
        Command::Status => Ok(()),
    }
}

fn refresh(repository: &dyn Repository, adapter: &ForecastAdapter, tax_types: &[String]) -> Result<()> {
    #[derive(Serialize)]
    struct RefreshReport {
        freshness: fiscal_forecast::FreshnessStatus,
        target_year: Option<i32>,
        predictions: usize,
        skipped_taxpayers: Vec<i64>,
        loads: Vec<fiscal_forecast::LoadReport>,
    }

    let set = FreshnessOrchestrator::new(repository, adapter).ensure_predictions_current()?;
    let loads = materialize_all(repository, tax_types)?;
    print_json(&RefreshReport {
        freshness: set.status,
        target_year: set.target_year,
        predictions: set.predictions.len(),
        skipped_taxpayers: set.skipped_taxpayers,
        loads,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
