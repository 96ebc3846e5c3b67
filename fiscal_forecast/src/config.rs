//! Pipeline configuration
//!
//! Resolution order for the configuration file: explicit path (command line),
//! then the `FISCAL_FORECAST_CONFIG` environment variable, then built-in
//! defaults. Every section is optional in the TOML file.

use crate::data::DataLoader;
use crate::error::{ForecastError, Result};
use crate::storage::{InMemoryRepository, Repository, SqliteRepository};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "FISCAL_FORECAST_CONFIG";

pub const DEFAULT_MODEL_VERSION: &str = "linear_regression_v1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding `<metric>_model.json` artifacts
    pub dir: PathBuf,
    /// Version string stamped on every stored prediction
    pub version: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file for the sqlite backend
    pub path: Option<PathBuf>,
}

/// CSV exports used to seed an empty store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub taxpayers_csv: Option<PathBuf>,
    pub monthly_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializeConfig {
    /// Tax types materialized in addition to the all-taxpayers key
    pub tax_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Where the configuration file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    /// Named by [`CONFIG_ENV_VAR`]
    Environment(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Pick the first source present: `cli_path`, then [`CONFIG_ENV_VAR`]
    pub fn locate(cli_path: Option<&Path>) -> Self {
        if let Some(path) = cli_path {
            return ConfigSource::CommandLine(path.to_path_buf());
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => ConfigSource::Environment(PathBuf::from(path.trim())),
            _ => ConfigSource::Defaults,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CommandLine(path) => write!(f, "{}", path.display()),
            ConfigSource::Environment(path) => write!(f, "{} ({})", path.display(), CONFIG_ENV_VAR),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub models: ModelsConfig,
    pub storage: StorageConfig,
    pub data: DataConfig,
    pub materialize: MaterializeConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ForecastError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `cli_path`, else from the file named by
    /// [`CONFIG_ENV_VAR`], else fall back to defaults
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        Self::from_source(&ConfigSource::locate(cli_path))
    }

    pub fn from_source(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::CommandLine(path) | ConfigSource::Environment(path) => Self::from_file(path),
            ConfigSource::Defaults => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.version.trim().is_empty() {
            return Err(ForecastError::ConfigError(
                "models.version must not be empty".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.path.is_none() {
            return Err(ForecastError::ConfigError(
                "storage.path is required for the sqlite backend".to_string(),
            ));
        }
        if self.data.taxpayers_csv.is_some() != self.data.monthly_csv.is_some() {
            return Err(ForecastError::ConfigError(
                "data.taxpayers_csv and data.monthly_csv must be set together".to_string(),
            ));
        }
        if self.materialize.tax_types.iter().any(|t| t.trim().is_empty()) {
            return Err(ForecastError::ConfigError(
                "materialize.tax_types must not contain empty names".to_string(),
            ));
        }
        Ok(())
    }

    fn seed_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.data.taxpayers_csv, &self.data.monthly_csv) {
            (Some(taxpayers), Some(monthly)) => Some((taxpayers.as_path(), monthly.as_path())),
            _ => None,
        }
    }

    /// Open the configured backend. A store with no real observations is
    /// seeded from the CSV exports when they are configured.
    pub fn open_repository(&self) -> Result<Box<dyn Repository>> {
        match self.storage.backend {
            StorageBackend::Memory => {
                let repository = match self.seed_paths() {
                    Some((taxpayers, monthly)) => InMemoryRepository::from_csv(taxpayers, monthly)?,
                    None => InMemoryRepository::new(),
                };
                Ok(Box::new(repository))
            }
            StorageBackend::Sqlite => {
                let path = self.storage.path.as_deref().ok_or_else(|| {
                    ForecastError::ConfigError("storage.path is required for the sqlite backend".to_string())
                })?;
                let repository = SqliteRepository::open(path)?;
                if let Some((taxpayers, monthly)) = self.seed_paths() {
                    if repository.get_years()?.is_empty() {
                        let inserted = repository.insert_taxpayers(&DataLoader::taxpayers_from_csv(taxpayers)?)?;
                        let rows = repository.insert_observations(&DataLoader::observations_from_csv(monthly)?)?;
                        info!("Seeded {} with {} taxpayers and {} monthly rows", path.display(), inserted, rows);
                    }
                }
                Ok(Box::new(repository))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.models.version, DEFAULT_MODEL_VERSION);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_command_line_path_wins() {
        let source = ConfigSource::locate(Some(Path::new("/etc/fiscal.toml")));
        assert_eq!(source, ConfigSource::CommandLine(PathBuf::from("/etc/fiscal.toml")));
        assert_eq!(source.to_string(), "/etc/fiscal.toml");
        assert_eq!(ConfigSource::Defaults.to_string(), "built-in defaults");
    }

    #[test]
    fn test_sqlite_requires_path() {
        let err = PipelineConfig::from_toml_str("[storage]\nbackend = \"sqlite\"\n").unwrap_err();
        assert!(matches!(err, ForecastError::ConfigError(_)));
    }

    #[test]
    fn test_csv_paths_come_in_pairs() {
        let err = PipelineConfig::from_toml_str("[data]\ntaxpayers_csv = \"t.csv\"\n").unwrap_err();
        assert!(matches!(err, ForecastError::ConfigError(_)));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = PipelineConfig::from_toml_str("[storage]\nbackend = \"postgres\"\n").unwrap_err();
        assert!(matches!(err, ForecastError::ConfigError(_)));
    }
}
