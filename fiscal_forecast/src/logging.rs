//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber writing to stderr. `RUST_LOG` wins over
/// `default_filter`.
///
/// Returns false when a global subscriber is already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
