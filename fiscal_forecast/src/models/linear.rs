//! Linear regression over one-hot encoded categorical features

use crate::error::{ForecastError, Result};
use crate::features::FeatureRow;
use crate::models::RegressionModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Categorical inputs, one-hot encoded by the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFeature {
    Season,
    TaxType,
    TaxpayerType,
    ActivityType,
    RegistrationDistrict,
}

impl CategoricalFeature {
    /// The category `row` falls into for this feature
    pub fn value<'a>(&self, row: &'a FeatureRow) -> &'a str {
        match self {
            CategoricalFeature::Season => row.season.as_str(),
            CategoricalFeature::TaxType => &row.tax_type,
            CategoricalFeature::TaxpayerType => &row.taxpayer_type,
            CategoricalFeature::ActivityType => &row.activity_type,
            CategoricalFeature::RegistrationDistrict => &row.registration_district,
        }
    }
}

/// Coefficients of the numeric inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericWeights {
    #[serde(default)]
    pub year: f64,
    #[serde(default)]
    pub month: f64,
    #[serde(default)]
    pub has_employees: f64,
    #[serde(default)]
    pub employees_count: f64,
}

/// Linear model read from a JSON artifact.
///
/// A category absent from the artifact contributes nothing, matching an
/// encoder that ignores unknown categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_name")]
    pub name: String,
    pub intercept: f64,
    #[serde(default)]
    pub numeric: NumericWeights,
    #[serde(default)]
    pub categorical: BTreeMap<CategoricalFeature, BTreeMap<String, f64>>,
}

fn default_name() -> String {
    "linear_regression".to_string()
}

impl LinearModel {
    /// Create a model with only an intercept
    pub fn new(name: impl Into<String>, intercept: f64) -> Self {
        Self {
            name: name.into(),
            intercept,
            numeric: NumericWeights::default(),
            categorical: BTreeMap::new(),
        }
    }

    /// Add a one-hot weight for `category` of `feature`
    pub fn with_category(
        mut self,
        feature: CategoricalFeature,
        category: impl Into<String>,
        weight: f64,
    ) -> Self {
        self.categorical
            .entry(feature)
            .or_default()
            .insert(category.into(), weight);
        self
    }

    /// Load and validate a JSON artifact
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let model: LinearModel = serde_json::from_reader(BufReader::new(file))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let numeric = [
            self.intercept,
            self.numeric.year,
            self.numeric.month,
            self.numeric.has_employees,
            self.numeric.employees_count,
        ];
        let all_finite = numeric.iter().all(|w| w.is_finite())
            && self
                .categorical
                .values()
                .flat_map(|weights| weights.values())
                .all(|w| w.is_finite());

        if !all_finite {
            return Err(ForecastError::ModelError(format!(
                "Artifact `{}` contains non-finite coefficients",
                self.name
            )));
        }
        Ok(())
    }

    fn predict_row(&self, row: &FeatureRow) -> f64 {
        let numeric = self.intercept
            + self.numeric.year * f64::from(row.year)
            + self.numeric.month * f64::from(row.month)
            + self.numeric.has_employees * if row.has_employees { 1.0 } else { 0.0 }
            + self.numeric.employees_count * f64::from(row.employees_count.unwrap_or(0));

        let categorical: f64 = self
            .categorical
            .iter()
            .filter_map(|(feature, weights)| weights.get(feature.value(row)))
            .sum();

        numeric + categorical
    }
}

impl RegressionModel for LinearModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
