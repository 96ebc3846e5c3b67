mod common;

use common::{fixed_store, profile, year_of, MODEL_VERSION};
use fiscal_forecast::data::DataSource;
use fiscal_forecast::forecast::ForecastAdapter;
use fiscal_forecast::freshness::{is_stale, FreshnessOrchestrator, FreshnessStatus};
use fiscal_forecast::storage::{InMemoryRepository, Repository};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::thread;

fn repository(taxpayers: i64) -> InMemoryRepository {
    let profiles = (1..=taxpayers).map(|id| profile(id, "VAT")).collect();
    let observations = (1..=taxpayers)
        .flat_map(|id| year_of(id, 2025, 100.0, "VAT"))
        .collect();
    InMemoryRepository::new()
        .with_taxpayers(profiles)
        .with_observations(observations)
}

#[rstest]
#[case(2025, None, true)]
#[case(2025, Some(2024), true)]
#[case(2025, Some(2025), true)]
#[case(2025, Some(2026), false)]
fn test_is_stale(#[case] last_real: i32, #[case] last_predicted: Option<i32>, #[case] expected: bool) {
    assert_eq!(is_stale(last_real, last_predicted), expected);
}

#[test]
fn test_generates_next_year_for_every_taxpayer() {
    let repo = repository(3);
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();
    let orchestrator = FreshnessOrchestrator::new(&repo, &adapter);

    let set = orchestrator.ensure_predictions_current().unwrap();

    assert_eq!(set.status, FreshnessStatus::Regenerated);
    assert_eq!(set.last_real_year, Some(2025));
    assert_eq!(set.target_year, Some(2026));
    assert_eq!(set.predictions.len(), 12 * 3);
    assert!(set.predictions.iter().all(|p| p.year == 2026 && p.model_version == MODEL_VERSION));

    let stored = repo.get_predictions(Some(2026)).unwrap();
    assert_eq!(stored.len(), 36);
    assert_eq!(repo.max_year(DataSource::Predicted).unwrap(), Some(2026));
}

#[test]
fn test_second_call_writes_nothing() {
    let repo = repository(2);
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();
    let orchestrator = FreshnessOrchestrator::new(&repo, &adapter);

    orchestrator.ensure_predictions_current().unwrap();
    let writes = repo.write_count().unwrap();

    let set = orchestrator.ensure_predictions_current().unwrap();

    assert_eq!(set.status, FreshnessStatus::Current);
    assert_eq!(set.target_year, Some(2026));
    assert_eq!(set.predictions.len(), 24);
    assert_eq!(repo.write_count().unwrap(), writes);
}

#[test]
fn test_new_real_year_triggers_regeneration() {
    let repo = repository(1);
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();
    let orchestrator = FreshnessOrchestrator::new(&repo, &adapter);
    orchestrator.ensure_predictions_current().unwrap();

    repo.add_observations(&year_of(1, 2026, 120.0, "VAT")).unwrap();
    let set = orchestrator.ensure_predictions_current().unwrap();

    assert_eq!(set.status, FreshnessStatus::Regenerated);
    assert_eq!(set.target_year, Some(2027));
    assert_eq!(repo.get_predictions(Some(2027)).unwrap().len(), 12);
}

#[test]
fn test_no_real_data_means_no_predictions() {
    let repo = InMemoryRepository::new().with_taxpayers(vec![profile(1, "VAT")]);
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();

    let set = FreshnessOrchestrator::new(&repo, &adapter)
        .ensure_predictions_current()
        .unwrap();

    assert_eq!(set.status, FreshnessStatus::NoRealData);
    assert!(set.predictions.is_empty());
    assert_eq!(repo.write_count().unwrap(), 0);
}

#[test]
fn test_malformed_profiles_are_skipped() {
    let mut broken = profile(2, "VAT");
    broken.registration_district = None;
    let repo = InMemoryRepository::new()
        .with_taxpayers(vec![profile(1, "VAT"), broken])
        .with_observations(year_of(1, 2025, 100.0, "VAT"));
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();

    let set = FreshnessOrchestrator::new(&repo, &adapter)
        .ensure_predictions_current()
        .unwrap();

    assert_eq!(set.skipped_taxpayers, vec![2]);
    assert_eq!(set.predictions.len(), 12);
    assert!(set.predictions.iter().all(|p| p.taxpayer_id == 1));
}

#[test]
fn test_concurrent_callers_generate_once() {
    let repo = repository(2);
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();
    let orchestrator = FreshnessOrchestrator::new(&repo, &adapter);
    let orchestrator = &orchestrator;

    let statuses: Vec<FreshnessStatus> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || orchestrator.ensure_predictions_current().unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().status)
            .collect()
    });

    let regenerated = statuses
        .iter()
        .filter(|s| **s == FreshnessStatus::Regenerated)
        .count();
    assert_eq!(regenerated, 1);
    assert_eq!(repo.get_predictions(None).unwrap().len(), 24);
}

#[test]
fn test_no_usable_profiles_is_not_a_regeneration() {
    let mut broken = profile(1, "VAT");
    broken.taxpayer_type = None;
    let repo = InMemoryRepository::new()
        .with_taxpayers(vec![broken])
        .with_observations(year_of(1, 2025, 100.0, "VAT"));
    let adapter = ForecastAdapter::new(&fixed_store()).unwrap();

    let set = FreshnessOrchestrator::new(&repo, &adapter)
        .ensure_predictions_current()
        .unwrap();

    assert_eq!(set.status, FreshnessStatus::NoProfiles);
    assert_eq!(set.target_year, None);
    assert_eq!(set.skipped_taxpayers, vec![1]);
    assert_eq!(repo.write_count().unwrap(), 0);
}
