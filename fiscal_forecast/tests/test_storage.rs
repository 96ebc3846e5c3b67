mod common;

use chrono::{TimeZone, Utc};
use common::{fixed_store, profile, year_of};
use fiscal_forecast::data::{DataSource, MonthlyPrediction, TaxpayerFilter};
use fiscal_forecast::features::build_population_rows;
use fiscal_forecast::forecast::ForecastAdapter;
use fiscal_forecast::storage::{
    AggregateKey, AggregateTable, InMemoryRepository, InsertOutcome, MaterializedAggregate,
    Repository, SqliteRepository,
};
use fiscal_forecast::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::tempdir;

fn seeded_sqlite() -> SqliteRepository {
    let repo = SqliteRepository::open_in_memory().unwrap();
    repo.insert_taxpayers(&[profile(1, "VAT"), profile(2, "PIT")]).unwrap();
    let mut rows = year_of(1, 2024, 100.0, "VAT");
    rows.extend(year_of(2, 2025, 50.0, "PIT"));
    repo.insert_observations(&rows).unwrap();
    repo
}

fn seeded_memory() -> InMemoryRepository {
    let mut rows = year_of(1, 2024, 100.0, "VAT");
    rows.extend(year_of(2, 2025, 50.0, "PIT"));
    InMemoryRepository::new()
        .with_taxpayers(vec![profile(1, "VAT"), profile(2, "PIT")])
        .with_observations(rows)
}

fn backend(name: &str) -> Box<dyn Repository> {
    match name {
        "sqlite" => Box::new(seeded_sqlite()),
        _ => Box::new(seeded_memory()),
    }
}

fn predictions(year: i32) -> Vec<MonthlyPrediction> {
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();
    let generated_at = Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap();
    let population = build_population_rows(&[profile(1, "VAT"), profile(2, "PIT")], year);
    adapter.predict_monthly(&population.rows, generated_at).unwrap()
}

fn aggregate(year: i32, tax_type: Option<&str>, income: f64) -> MaterializedAggregate {
    MaterializedAggregate {
        year,
        tax_type: tax_type.map(str::to_string),
        income,
        transactions: 12.0,
        tax: income / 10.0,
        income_growth: None,
        transactions_growth: Some(0.0),
        tax_growth: None,
        created_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
    }
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_reads(#[case] name: &str) {
    let repo = backend(name);

    assert_eq!(repo.get_years().unwrap(), vec![2024, 2025]);
    assert_eq!(repo.max_year(DataSource::Real).unwrap(), Some(2025));
    assert_eq!(repo.max_year(DataSource::Predicted).unwrap(), None);

    let taxpayer = repo.get_taxpayer("INN0002").unwrap().unwrap();
    assert_eq!(taxpayer, profile(2, "PIT"));
    assert!(repo.get_taxpayer("missing").unwrap().is_none());

    let monthly = repo.get_monthly_by_taxpayer("INN0001").unwrap();
    assert_eq!(monthly.len(), 12);
    assert_eq!(monthly[0].month, 1);
    assert!(repo.get_monthly_by_taxpayer("missing").unwrap().is_empty());

    assert_eq!(repo.get_monthly_data(DataSource::Real, Some("PIT")).unwrap().len(), 12);
    assert_eq!(repo.get_monthly_data(DataSource::Real, None).unwrap().len(), 24);
    assert!(repo.get_monthly_data(DataSource::Predicted, None).unwrap().is_empty());
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_taxpayer_filters(#[case] name: &str) {
    let repo = backend(name);

    assert_eq!(repo.count_taxpayers(&TaxpayerFilter::default()).unwrap(), 2);
    assert_eq!(repo.count_taxpayers(&TaxpayerFilter::by_tax_type("VAT")).unwrap(), 1);

    let filter = TaxpayerFilter {
        tax_type: None,
        district: Some("north".to_string()),
    };
    assert!(repo.get_all_taxpayers(&filter).unwrap().is_empty());

    let all = repo.get_all_taxpayers(&TaxpayerFilter::default()).unwrap();
    assert_eq!(all.iter().map(|t| t.taxpayer_id).collect::<Vec<_>>(), vec![1, 2]);
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_materialized_insert_if_absent(#[case] name: &str) {
    let repo = backend(name);
    let table = AggregateTable::General;

    let first = repo.insert_materialized(table, &aggregate(2024, None, 100.0)).unwrap();
    let second = repo.insert_materialized(table, &aggregate(2024, None, 999.0)).unwrap();
    let empty_key = repo.insert_materialized(table, &aggregate(2024, Some(""), 999.0)).unwrap();

    assert_eq!(first, InsertOutcome::Inserted);
    assert_eq!(second, InsertOutcome::AlreadyPresent);
    assert_eq!(empty_key, InsertOutcome::AlreadyPresent);

    let stored = repo.get_materialized(table, &AggregateKey::new(2024, None)).unwrap().unwrap();
    assert_eq!(stored, aggregate(2024, None, 100.0));
    assert!(repo
        .get_materialized(AggregateTable::Median, &AggregateKey::new(2024, None))
        .unwrap()
        .is_none());
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_materialized_listing_and_delete(#[case] name: &str) {
    let repo = backend(name);
    let table = AggregateTable::Median;
    for row in [
        aggregate(2025, Some("VAT"), 2.0),
        aggregate(2024, Some("VAT"), 1.0),
        aggregate(2024, None, 3.0),
    ] {
        repo.insert_materialized(table, &row).unwrap();
    }

    let vat = repo.list_materialized(table, Some("VAT")).unwrap();
    assert_eq!(vat.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2024, 2025]);
    assert_eq!(repo.list_materialized(table, None).unwrap().len(), 1);

    assert_eq!(repo.delete_materialized(table, Some("VAT")).unwrap(), 2);
    assert!(repo.list_materialized(table, Some("VAT")).unwrap().is_empty());
    assert_eq!(repo.list_materialized(table, None).unwrap().len(), 1);
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_replace_predictions(#[case] name: &str) {
    let repo = backend(name);
    let first = predictions(2026);

    assert_eq!(repo.insert_predictions(&first).unwrap(), 24);
    assert_eq!(repo.max_year(DataSource::Predicted).unwrap(), Some(2026));

    let mut second = predictions(2026);
    for p in &mut second {
        p.income += 1.0;
    }
    assert_eq!(repo.replace_predictions(2026, &second).unwrap(), 24);

    let stored = repo.get_predictions(Some(2026)).unwrap();
    assert_eq!(stored.len(), 24);
    assert_eq!(stored, second);
    assert_eq!(repo.get_monthly_data(DataSource::Predicted, Some("PIT")).unwrap().len(), 12);

    assert_eq!(repo.delete_predictions(2026).unwrap(), 24);
    assert!(repo.get_predictions(None).unwrap().is_empty());
}

#[rstest]
#[case("memory")]
#[case("sqlite")]
fn test_failed_replace_keeps_previous_year(#[case] name: &str) {
    let repo = backend(name);
    let original = predictions(2026);
    repo.insert_predictions(&original).unwrap();

    let mut duplicated = predictions(2026);
    duplicated.push(duplicated[0].clone());

    let err = repo.replace_predictions(2026, &duplicated).unwrap_err();
    assert!(matches!(err, ForecastError::StorageError(_)));
    assert_eq!(repo.get_predictions(Some(2026)).unwrap(), original);
}

#[test]
fn test_sqlite_file_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fiscal.db");

    let repo = SqliteRepository::open(&path).unwrap();
    repo.insert_taxpayers(&[profile(1, "VAT")]).unwrap();
    repo.insert_observations(&year_of(1, 2025, 10.0, "VAT")).unwrap();
    repo.insert_materialized(AggregateTable::General, &aggregate(2025, Some("VAT"), 120.0))
        .unwrap();
    repo.close().unwrap();

    let reopened = SqliteRepository::open(&path).unwrap();
    assert_eq!(reopened.get_years().unwrap(), vec![2025]);
    assert_eq!(
        reopened.list_materialized(AggregateTable::General, Some("VAT")).unwrap(),
        vec![aggregate(2025, Some("VAT"), 120.0)]
    );
}

#[test]
fn test_memory_counts_writes() {
    let repo = seeded_memory();
    assert_eq!(repo.write_count().unwrap(), 0);

    repo.insert_materialized(AggregateTable::General, &aggregate(2024, None, 1.0)).unwrap();
    repo.insert_materialized(AggregateTable::General, &aggregate(2024, None, 1.0)).unwrap();
    assert_eq!(repo.write_count().unwrap(), 1);

    repo.delete_predictions(2030).unwrap();
    assert_eq!(repo.write_count().unwrap(), 1);
}
