mod common;

use common::profile;
use fiscal_forecast::features::{build_future_rows, build_population_rows, Season, MONTHS_PER_YEAR};
use fiscal_forecast::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(1, Season::Winter)]
#[case(2, Season::Winter)]
#[case(3, Season::Spring)]
#[case(5, Season::Spring)]
#[case(6, Season::Summer)]
#[case(8, Season::Summer)]
#[case(9, Season::Autumn)]
#[case(11, Season::Autumn)]
#[case(12, Season::Winter)]
fn test_season_mapping(#[case] month: u32, #[case] expected: Season) {
    assert_eq!(Season::from_month(month), expected);
}

#[test]
fn test_twelve_rows_for_target_year() {
    let rows = build_future_rows(&profile(7, "VAT"), 2026).unwrap();

    assert_eq!(rows.len(), MONTHS_PER_YEAR as usize);
    let months: Vec<u32> = rows.iter().map(|r| r.month).collect();
    assert_eq!(months, (1..=12).collect::<Vec<u32>>());

    for row in &rows {
        assert_eq!(row.taxpayer_id, 7);
        assert_eq!(row.year, 2026);
        assert_eq!(row.season, Season::from_month(row.month));
        assert_eq!(row.tax_type, "VAT");
        assert_eq!(row.taxpayer_type, "individual");
        assert_eq!(row.activity_type, "retail");
        assert_eq!(row.registration_district, "central");
        assert!(row.has_employees);
        assert_eq!(row.employees_count, Some(3));
    }
}

#[test]
fn test_profile_attributes_repeat_every_month() {
    let rows = build_future_rows(&profile(1, "VAT"), 2030).unwrap();
    let first = &rows[0];
    assert!(rows.iter().all(|r| r.activity_type == first.activity_type
        && r.registration_district == first.registration_district
        && r.employees_count == first.employees_count));
}

#[test]
fn test_tax_type_falls_back_to_taxpayer_type() {
    let mut p = profile(1, "VAT");
    p.tax_type = None;

    let rows = build_future_rows(&p, 2026).unwrap();
    assert!(rows.iter().all(|r| r.tax_type == "individual"));
}

#[rstest]
#[case("taxpayer_type")]
#[case("activity_type")]
#[case("registration_district")]
#[case("has_employees")]
fn test_missing_field_is_rejected(#[case] field: &str) {
    let mut p = profile(42, "VAT");
    match field {
        "taxpayer_type" => p.taxpayer_type = None,
        "activity_type" => p.activity_type = None,
        "registration_district" => p.registration_district = None,
        _ => p.has_employees = None,
    }

    match build_future_rows(&p, 2026) {
        Err(ForecastError::MissingProfileField { taxpayer_id, field: missing }) => {
            assert_eq!(taxpayer_id, 42);
            assert_eq!(missing, field);
        }
        other => panic!("expected MissingProfileField, got {:?}", other),
    }
}

#[test]
fn test_population_skips_malformed_profiles() {
    let mut broken = profile(2, "VAT");
    broken.activity_type = None;
    let profiles = vec![profile(1, "VAT"), broken, profile(3, "PIT")];

    let population = build_population_rows(&profiles, 2026);

    assert_eq!(population.rows.len(), 24);
    assert_eq!(population.skipped, vec![2]);
    assert!(population.rows.iter().all(|r| r.taxpayer_id != 2));
}
