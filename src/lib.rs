//! # Fiscal Outlook
//!
//! Workspace facade over the fiscal forecasting crates.
//!
//! - [`fiscal_math`]: rounding, growth rates and summary statistics
//! - [`fiscal_forecast`]: the forecast and materialization pipeline
//!
//! ## Example
//!
//! ```
//! use fiscal_outlook_workspace::fiscal_math::percent_change;
//!
//! assert_eq!(percent_change(100.0, 150.0), Some(50.0));
//! assert_eq!(percent_change(0.0, 50.0), None);
//! ```

pub use fiscal_forecast;
pub use fiscal_math;

/// Version of the workspace facade
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports_resolve() {
        assert_eq!(fiscal_forecast::NAME, "fiscal_forecast");
        assert_eq!(fiscal_math::round_to(1.005, 1), 1.0);
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
