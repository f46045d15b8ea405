//! Configuration loading and database path resolution
//!
//! A small TOML bootstrap file holds the database location, log level and
//! the default conflict policy for imports. Every key is optional.
//!
//! # Database path priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `OAK_DATABASE` environment variable
//! 3. `database_path` in the TOML config file
//! 4. OS-dependent default under the platform data directory

use crate::merge::ConflictPolicy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the database location
pub const DATABASE_ENV_VAR: &str = "OAK_DATABASE";

/// Default database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "oak.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Bulk import defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    /// What to do with conflicting values when no policy is given on the command line
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file; a malformed file is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the explicit path if given, else the platform default location
    ///
    /// A missing file yields defaults; only an unreadable or malformed file
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit.is_some() {
                warn!("Config file {} not found - using defaults", path.display());
            }
            return Ok(Self::default());
        }

        debug!("Loading config from {}", path.display());
        Self::from_file(&path)
    }
}

/// `<config dir>/oak/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("oak").join("config.toml"))
}

/// OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("oak"))
        .unwrap_or_else(|| PathBuf::from("./oak_data"))
        .join(DATABASE_FILE_NAME)
}

/// Resolve the database path following the priority order above
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.database_path {
        return path.clone();
    }

    // Priority 4: OS-dependent default
    default_database_path()
}
