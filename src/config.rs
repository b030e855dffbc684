//! Settings loading and validation.
//!
//! Settings come from a TOML file with three optional keys:
//!
//! ```toml
//! interval = 30                  # seconds between captures
//! limit = 500                    # storage budget in megabytes
//! path = "/var/lib/screenshoter" # capture directory
//! ```
//!
//! Command line overrides are applied on top, then every value is validated
//! once into an immutable [`Config`].

use crate::cli::Cli;
use crate::constants::{
    APP_CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BUDGET_MB, DEFAULT_INTERVAL_SECS,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Raw values as they appear in the settings file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub path: Option<String>,
}

impl Settings {
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Command line values win over file values.
    pub fn with_overrides(self, cli: &Cli) -> Self {
        Settings {
            interval: cli.interval.or(self.interval),
            limit: cli.limit.or(self.limit),
            path: cli.path.clone().or(self.path),
        }
    }
}

/// Validated configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub interval_secs: u64,
    pub budget_mb: u64,
    pub storage_path: PathBuf,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<Settings> for Config {
    fn from(settings: Settings) -> Self {
        Config {
            interval_secs: positive_or(settings.interval, DEFAULT_INTERVAL_SECS),
            budget_mb: positive_or(settings.limit, DEFAULT_BUDGET_MB),
            storage_path: settings
                .path
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

fn positive_or(value: Option<i64>, default: u64) -> u64 {
    match value {
        Some(v) if v > 0 => v as u64,
        _ => default,
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    Some(
        dirs::config_dir()?
            .join(APP_CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

/// Resolve the settings source and build the process configuration.
///
/// An explicit `--config` file must load. The default location is optional:
/// a missing file means defaults, a broken one is reported and ignored.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => load_default_settings(),
    };
    Ok(settings.with_overrides(cli).into())
}

fn load_default_settings() -> Settings {
    let Some(path) = default_settings_path() else {
        debug!("No config_dir available, using defaults only");
        return Settings::default();
    };

    if !path.exists() {
        debug!(?path, "Settings file does not exist, using defaults");
        return Settings::default();
    }

    match Settings::from_file(&path) {
        Ok(settings) => {
            debug!(?path, "Settings loaded");
            settings
        }
        Err(err) => {
            warn!(error = %err, "Failed to load settings, using defaults");
            Settings::default()
        }
    }
}
