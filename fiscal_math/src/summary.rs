//! Summary statistics over metric columns
//!
//! A rollup reduces every value of a metric inside a group to one number.
//! Two reductions exist: the total (`Sum`) and the middle value (`Median`).

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::fmt;
use std::str::FromStr;

/// Reduction applied to a group of metric values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Sum,
    Median,
}

impl Statistic {
    /// Reduce `values` to a single number.
    ///
    /// Empty input is rejected: a group always contains at least one row,
    /// so an empty slice means the caller grouped incorrectly.
    pub fn summarize(&self, values: &[f64]) -> Result<f64> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(format!(
                "Cannot compute {} of an empty group",
                self
            )));
        }

        Ok(match self {
            Statistic::Sum => values.iter().sum(),
            Statistic::Median => Data::new(values.to_vec()).median(),
        })
    }

    /// Lowercase name used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Sum => "sum",
            Statistic::Median => "median",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" | "general" | "total" => Ok(Statistic::Sum),
            "median" => Ok(Statistic::Median),
            other => Err(MathError::InvalidInput(format!(
                "Unknown statistic: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Statistic::Sum, &[100.0, 200.0], 300.0)]
    #[case(Statistic::Median, &[100.0, 200.0], 150.0)]
    #[case(Statistic::Median, &[7.0, 5.0], 6.0)]
    #[case(Statistic::Median, &[3.0, 1.0, 2.0], 2.0)]
    #[case(Statistic::Sum, &[42.5], 42.5)]
    fn test_summarize(#[case] stat: Statistic, #[case] values: &[f64], #[case] expected: f64) {
        let value = stat.summarize(values).unwrap();
        assert!((value - expected).abs() < 1e-9, "{} != {}", value, expected);
    }

    #[test]
    fn test_summarize_empty_group() {
        assert!(matches!(
            Statistic::Median.summarize(&[]),
            Err(MathError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_parse_statistic() {
        assert_eq!("general".parse::<Statistic>().unwrap(), Statistic::Sum);
        assert_eq!("MEDIAN".parse::<Statistic>().unwrap(), Statistic::Median);
        assert!("mean".parse::<Statistic>().is_err());
    }
}
