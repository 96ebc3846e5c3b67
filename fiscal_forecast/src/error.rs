//! Error types for the fiscal_forecast crate

use crate::data::Metric;
use thiserror::Error;

/// Custom error types for the fiscal_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A taxpayer or series does not exist. Read paths turn this into a
    /// "no data" outcome instead of failing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A regression model was never loaded
    #[error("Model unavailable: {0} model is not loaded")]
    ModelUnavailable(Metric),

    /// A taxpayer profile lacks a classification field needed for features
    #[error("Taxpayer {taxpayer_id} is missing required field `{field}`")]
    MissingProfileField {
        taxpayer_id: i64,
        field: &'static str,
    },

    /// Repository I/O failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Model produced unusable output or the artifact is malformed
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error in configuration loading or validation
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ForecastError {
    /// True when the error only means "there is nothing to show"
    pub fn is_no_data(&self) -> bool {
        matches!(self, ForecastError::NotFound(_))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        ForecastError::StorageError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::DataError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

impl From<fiscal_math::MathError> for ForecastError {
    fn from(err: fiscal_math::MathError) -> Self {
        ForecastError::InvalidParameter(err.to_string())
    }
}
