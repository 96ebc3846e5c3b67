//! # Fiscal Math
//!
//! Numeric primitives behind fiscal rollups.
//! This crate provides the summary statistics, year-over-year growth rates
//! and post-processing helpers (rounding, clipping) used by the forecast
//! pipeline.

use thiserror::Error;

pub mod growth;
pub mod rounding;
pub mod summary;

pub use growth::{growth_rates, percent_change};
pub use rounding::{clip_non_negative, round_count, round_to};
pub use summary::Statistic;

/// Errors that can occur in fiscal calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for fiscal math operations
pub type Result<T> = std::result::Result<T, MathError>;
