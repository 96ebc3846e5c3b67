//! Monthly and yearly rollups and year-over-year growth
//!
//! Every function here is pure: identical input rows give identical output
//! rows, and groups come out ordered by their key.

use crate::data::MonthlyObservation;
use crate::error::Result;
use fiscal_math::growth_rates;
pub use fiscal_math::Statistic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rollup of one (year, month) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub transactions: f64,
    pub tax: f64,
}

/// Rollup of one year.
///
/// The columns hold totals or medians depending on the statistic used;
/// the shape is the same either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    pub year: i32,
    pub income: f64,
    pub transactions: f64,
    pub tax: f64,
}

/// A yearly rollup with percent change against the previous year.
///
/// Growth is `None` for the earliest year and wherever the previous value
/// is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    pub year: i32,
    pub income: f64,
    pub transactions: f64,
    pub tax: f64,
    pub income_growth: Option<f64>,
    pub transactions_growth: Option<f64>,
    pub tax_growth: Option<f64>,
}

#[derive(Default)]
struct MetricColumns {
    income: Vec<f64>,
    transactions: Vec<f64>,
    tax: Vec<f64>,
}

impl MetricColumns {
    fn push(&mut self, row: &MonthlyObservation) {
        self.income.push(row.income);
        self.transactions.push(row.transactions as f64);
        self.tax.push(row.tax);
    }

    fn reduce(&self, stat: Statistic) -> Result<(f64, f64, f64)> {
        Ok((
            stat.summarize(&self.income)?,
            stat.summarize(&self.transactions)?,
            stat.summarize(&self.tax)?,
        ))
    }
}

/// Group rows by (year, month) and reduce each metric with `stat`
pub fn aggregate_monthly(rows: &[MonthlyObservation], stat: Statistic) -> Result<Vec<MonthlyAggregate>> {
    let mut groups: BTreeMap<(i32, u32), MetricColumns> = BTreeMap::new();
    for row in rows {
        groups.entry((row.year, row.month)).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|((year, month), columns)| {
            let (income, transactions, tax) = columns.reduce(stat)?;
            Ok(MonthlyAggregate {
                year,
                month,
                income,
                transactions,
                tax,
            })
        })
        .collect()
}

/// Group rows by year and reduce each metric with `stat`
pub fn aggregate_yearly(rows: &[MonthlyObservation], stat: Statistic) -> Result<Vec<YearlyAggregate>> {
    let mut groups: BTreeMap<i32, MetricColumns> = BTreeMap::new();
    for row in rows {
        groups.entry(row.year).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(year, columns)| {
            let (income, transactions, tax) = columns.reduce(stat)?;
            Ok(YearlyAggregate {
                year,
                income,
                transactions,
                tax,
            })
        })
        .collect()
}

/// Year-over-year percent growth of every metric.
///
/// Rows are ordered by year first (stable, so equal years keep their input
/// order); each row is then compared with the row just before it.
pub fn calculate_growth(yearly: &[YearlyAggregate]) -> Vec<GrowthRecord> {
    let mut ordered = yearly.to_vec();
    ordered.sort_by_key(|row| row.year);

    let column = |f: fn(&YearlyAggregate) -> f64| -> Vec<f64> { ordered.iter().map(f).collect() };
    let income_growth = growth_rates(&column(|r| r.income));
    let transactions_growth = growth_rates(&column(|r| r.transactions));
    let tax_growth = growth_rates(&column(|r| r.tax));

    ordered
        .iter()
        .enumerate()
        .map(|(i, row)| GrowthRecord {
            year: row.year,
            income: row.income,
            transactions: row.transactions,
            tax: row.tax,
            income_growth: income_growth[i],
            transactions_growth: transactions_growth[i],
            tax_growth: tax_growth[i],
        })
        .collect()
}
