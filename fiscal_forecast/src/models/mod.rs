//! Trained regression models used for inference
//!
//! Training happens elsewhere. Here a model is an opaque function from a
//! batch of feature rows to one numeric prediction per row.

use crate::error::Result;
use crate::features::FeatureRow;
use std::sync::Arc;

pub mod linear;
pub mod store;

pub use linear::{CategoricalFeature, LinearModel, NumericWeights};
pub use store::{ModelReadiness, ModelStore};

/// Inference interface of a trained regression model
pub trait RegressionModel: Send + Sync {
    /// One raw prediction per input row, in input order
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> RegressionModel for F
where
    F: Fn(&[FeatureRow]) -> Result<Vec<f64>> + Send + Sync,
{
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        self(rows)
    }
}

/// Wrap a plain function as a shareable model
pub fn model_fn<F>(f: F) -> Arc<dyn RegressionModel>
where
    F: Fn(&[FeatureRow]) -> Result<Vec<f64>> + Send + Sync + 'static,
{
    Arc::new(f)
}
