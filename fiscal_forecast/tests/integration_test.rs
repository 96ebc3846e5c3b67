mod common;

use common::MODEL_VERSION;
use fiscal_forecast::config::{PipelineConfig, StorageBackend};
use fiscal_forecast::dashboard::DashboardService;
use fiscal_forecast::forecast::ForecastAdapter;
use fiscal_forecast::freshness::{FreshnessOrchestrator, FreshnessStatus};
use fiscal_forecast::materialize::materialize_all;
use fiscal_forecast::models::ModelStore;
use fiscal_forecast::storage::AggregateTable;
use fiscal_forecast::{DataSource, Metric};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_fixture(dir: &Path) {
    fs::write(
        dir.join("taxpayers.csv"),
        "taxpayer_id,inn,full_name,taxpayer_type,tax_type,activity_type,registration_district,has_employees,employees_count\n\
         1,INN0001,Alpha,legal,VAT,retail,central,true,4\n\
         2,INN0002,Beta,individual,PIT,services,north,false,\n",
    )
    .unwrap();

    let mut monthly = String::from("taxpayer_id,year,month,income,transactions,tax,tax_type\n");
    for year in [2024, 2025] {
        for month in 1..=12 {
            monthly.push_str(&format!("1,{},{},1000,10,100,VAT\n", year, month));
            monthly.push_str(&format!("2,{},{},500,5,50,PIT\n", year, month));
        }
    }
    fs::write(dir.join("monthly.csv"), monthly).unwrap();

    let models = dir.join("models");
    fs::create_dir(&models).unwrap();
    for metric in Metric::ALL {
        fs::write(
            models.join(metric.artifact_file_name()),
            r#"{ "intercept": 100.0, "categorical": { "tax_type": { "VAT": 50.0 } } }"#,
        )
        .unwrap();
    }
}

fn config_for(dir: &Path) -> PipelineConfig {
    let text = format!(
        r#"
[models]
dir = "{models}"
version = "{version}"

[storage]
backend = "sqlite"
path = "{db}"

[data]
taxpayers_csv = "{taxpayers}"
monthly_csv = "{monthly}"

[materialize]
tax_types = ["VAT", "PIT"]
"#,
        models = dir.join("models").display(),
        version = MODEL_VERSION,
        db = dir.join("fiscal.db").display(),
        taxpayers = dir.join("taxpayers.csv").display(),
        monthly = dir.join("monthly.csv").display(),
    );
    PipelineConfig::from_toml_str(&text).unwrap()
}

#[test]
fn test_full_refresh_workflow() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);

    // 1. Open and seed the store
    let repository = config.open_repository().unwrap();
    assert_eq!(repository.get_years().unwrap(), vec![2024, 2025]);

    // 2. Load models
    let store = ModelStore::load_dir(&config.models.dir, config.models.version.clone());
    let adapter = ForecastAdapter::new(&store).unwrap();

    // 3. Bring predictions up to date
    let set = FreshnessOrchestrator::new(repository.as_ref(), &adapter)
        .ensure_predictions_current()
        .unwrap();
    assert_eq!(set.status, FreshnessStatus::Regenerated);
    assert_eq!(set.predictions.len(), 24);
    assert_eq!(repository.max_year(DataSource::Predicted).unwrap(), Some(2026));

    // 4. Materialize every table and tax type
    let reports = materialize_all(repository.as_ref(), &config.materialize.tax_types).unwrap();
    assert_eq!(reports.iter().map(|r| r.inserted).sum::<usize>(), 2 * 3 * 3);

    // 5. Read through the dashboard service
    let service = DashboardService::new(repository.as_ref(), &adapter);
    let vat = service
        .growth_series(AggregateTable::General, Some("VAT"))
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(vat.len(), 3);
    assert_eq!(vat[1].income, 12_000.0);
    assert_eq!(vat[1].income_growth, Some(0.0));
    // VAT forecast: 150 per month
    assert_eq!(vat[2].income, 1_800.0);
    let growth = vat[2].income_growth.unwrap();
    assert!((growth + 85.0).abs() < 1e-9);

    // 6. A second refresh is a no-op
    let again = FreshnessOrchestrator::new(repository.as_ref(), &adapter)
        .ensure_predictions_current()
        .unwrap();
    assert_eq!(again.status, FreshnessStatus::Current);
    let reports = materialize_all(repository.as_ref(), &config.materialize.tax_types).unwrap();
    assert!(reports.iter().all(|r| r.inserted == 0));
}

#[test]
fn test_reopen_does_not_reseed() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let config = config_for(dir.path());

    drop(config.open_repository().unwrap());
    let repository = config.open_repository().unwrap();

    assert_eq!(repository.get_monthly_data(DataSource::Real, None).unwrap().len(), 48);
}

#[test]
fn test_memory_backend_from_csv() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let mut config = config_for(dir.path());
    config.storage.backend = StorageBackend::Memory;

    let repository = config.open_repository().unwrap();

    assert_eq!(repository.get_years().unwrap(), vec![2024, 2025]);
    assert!(repository.get_taxpayer("INN0002").unwrap().is_some());
}
