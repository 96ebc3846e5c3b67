//! Loaded model instances, one slot per metric

use crate::data::Metric;
use crate::models::{LinearModel, RegressionModel};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Whether each metric model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelReadiness {
    pub income: bool,
    pub transactions: bool,
    pub tax: bool,
}

impl ModelReadiness {
    pub fn get(&self, metric: Metric) -> bool {
        match metric {
            Metric::Income => self.income,
            Metric::Transactions => self.transactions,
            Metric::Tax => self.tax,
        }
    }

    /// True when all three models are loaded
    pub fn is_ready(&self) -> bool {
        self.income && self.transactions && self.tax
    }
}

/// Holds the trained models for the lifetime of the process.
///
/// Built once at startup and handed to whatever needs inference; nothing
/// reaches it through global state.
#[derive(Clone)]
pub struct ModelStore {
    version: String,
    income: Option<Arc<dyn RegressionModel>>,
    transactions: Option<Arc<dyn RegressionModel>>,
    tax: Option<Arc<dyn RegressionModel>>,
}

impl ModelStore {
    /// An empty store; every metric reports not ready
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            income: None,
            transactions: None,
            tax: None,
        }
    }

    /// Load `<metric>_model.json` artifacts from `dir`.
    ///
    /// A missing or unreadable artifact leaves its slot empty; the failure
    /// surfaces through [`ModelStore::readiness`] and when an adapter is built.
    pub fn load_dir<P: AsRef<Path>>(dir: P, version: impl Into<String>) -> Self {
        let dir = dir.as_ref();
        let mut store = Self::new(version);

        for metric in Metric::ALL {
            let path = dir.join(metric.artifact_file_name());
            match LinearModel::from_json_file(&path) {
                Ok(model) => {
                    info!("Loaded {} model from {}", metric, path.display());
                    store.insert(metric, Arc::new(model));
                }
                Err(err) => warn!(
                    "Could not load {} model from {}: {}",
                    metric,
                    path.display(),
                    err
                ),
            }
        }

        store
    }

    /// Set the model for `metric`, replacing any previous one
    pub fn insert(&mut self, metric: Metric, model: Arc<dyn RegressionModel>) {
        let slot = match metric {
            Metric::Income => &mut self.income,
            Metric::Transactions => &mut self.transactions,
            Metric::Tax => &mut self.tax,
        };
        *slot = Some(model);
    }

    /// Builder form of [`ModelStore::insert`]
    pub fn with_model(mut self, metric: Metric, model: Arc<dyn RegressionModel>) -> Self {
        self.insert(metric, model);
        self
    }

    pub fn model(&self, metric: Metric) -> Option<Arc<dyn RegressionModel>> {
        match metric {
            Metric::Income => self.income.clone(),
            Metric::Transactions => self.transactions.clone(),
            Metric::Tax => self.tax.clone(),
        }
    }

    pub fn readiness(&self) -> ModelReadiness {
        ModelReadiness {
            income: self.income.is_some(),
            transactions: self.transactions.is_some(),
            tax: self.tax.is_some(),
        }
    }

    /// Version tag stamped on every prediction
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelStore")
            .field("version", &self.version)
            .field("readiness", &self.readiness())
            .finish()
    }
}
