// Walks one refresh cycle over a small in-memory population
use fiscal_forecast::data::{MonthlyObservation, TaxpayerProfile};
use fiscal_forecast::features::FeatureRow;
use fiscal_forecast::freshness::FreshnessOrchestrator;
use fiscal_forecast::materialize::materialize_all;
use fiscal_forecast::models::{model_fn, ModelStore};
use fiscal_forecast::storage::{AggregateTable, InMemoryRepository, Repository};
use fiscal_forecast::{ForecastAdapter, Metric, Result};

fn main() -> Result<()> {
    println!("Exploring the fiscal forecast pipeline\n");

    let repository = InMemoryRepository::new()
        .with_taxpayers(vec![taxpayer(1, "VAT"), taxpayer(2, "PIT")])
        .with_observations(history());

    // Seasonal toy models: winter months earn less
    let seasonal = |base: f64| {
        model_fn(move |rows: &[FeatureRow]| -> Result<Vec<f64>> {
            Ok(rows
                .iter()
                .map(|r| if r.season.as_str() == "winter" { base * 0.8 } else { base })
                .collect())
        })
    };
    let store = ModelStore::new("demo_v1")
        .with_model(Metric::Income, seasonal(1200.0))
        .with_model(Metric::Transactions, seasonal(14.0))
        .with_model(Metric::Tax, seasonal(120.0));
    let adapter = ForecastAdapter::new(&store)?;

    println!("=== Freshness ===");
    let set = FreshnessOrchestrator::new(&repository, &adapter).ensure_predictions_current()?;
    println!(
        "{:?}: {} predictions for {:?}",
        set.status,
        set.predictions.len(),
        set.target_year
    );

    println!("\n=== Materialization ===");
    for report in materialize_all(&repository, &["VAT".to_string(), "PIT".to_string()])? {
        println!(
            "{} {:?}: inserted {}, skipped {}",
            report.table, report.tax_type, report.inserted, report.skipped
        );
    }

    println!("\n=== General growth (all taxpayers) ===");
    for row in repository.list_materialized(AggregateTable::General, None)? {
        println!(
            "{}: income {:.2}, growth {}",
            row.year,
            row.income,
            row.income_growth
                .map(|g| format!("{:.1}%", g))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    println!("\nDone exploring");
    Ok(())
}

fn taxpayer(taxpayer_id: i64, tax_type: &str) -> TaxpayerProfile {
    TaxpayerProfile {
        taxpayer_id,
        inn: format!("DEMO{:03}", taxpayer_id),
        full_name: None,
        taxpayer_type: Some("legal".to_string()),
        tax_type: Some(tax_type.to_string()),
        activity_type: Some("retail".to_string()),
        registration_district: Some("central".to_string()),
        has_employees: Some(false),
        employees_count: None,
    }
}

fn history() -> Vec<MonthlyObservation> {
    let mut rows = Vec::new();
    for (taxpayer_id, tax_type, income) in [(1, "VAT", 1000.0), (2, "PIT", 400.0)] {
        for year in 2023..=2024 {
            for month in 1..=12 {
                rows.push(MonthlyObservation {
                    taxpayer_id,
                    year,
                    month,
                    income: income * f64::from(year - 2022),
                    transactions: 10,
                    tax: income / 10.0,
                    tax_type: Some(tax_type.to_string()),
                });
            }
        }
    }
    rows
}
