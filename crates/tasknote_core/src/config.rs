//! Application configuration.
//!
//! Loaded from a JSON document; every field has a default so an empty
//! object (`{}`) is a valid configuration.

use crate::clock::{EpochMs, DAY_MS};
use crate::logging;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Timing of debounce, cleanup and archive behaviour (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Quiet period before an edited note is saved remotely.
    pub save_debounce_ms: EpochMs,
    /// Age of a completion after which the sweep removes the task.
    pub archive_after_ms: EpochMs,
    pub sweep_interval_ms: EpochMs,
    /// Delay before an empty note is deleted after the editor loses focus.
    pub blur_cleanup_ms: EpochMs,
    /// Window in which a completed task is reported as archiving soon.
    pub archive_warning_ms: EpochMs,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 500,
            archive_after_ms: DAY_MS,
            sweep_interval_ms: 60_000,
            blur_cleanup_ms: 300,
            archive_warning_ms: 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub log_level: String,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// SQLite file backing the bundled record store and cache; `None`
    /// keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: logging::default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// # Errors
    /// - `ConfigError::Invalid` for an unknown log level, a relative log
    ///   directory, or a non-positive interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        logging::normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }

        let sync = &self.sync;
        for (name, value) in [
            ("save_debounce_ms", sync.save_debounce_ms),
            ("archive_after_ms", sync.archive_after_ms),
            ("sweep_interval_ms", sync.sweep_interval_ms),
            ("blur_cleanup_ms", sync.blur_cleanup_ms),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "sync.{name} must be positive, got {value}"
                )));
            }
        }
        if sync.archive_warning_ms < 0 || sync.archive_warning_ms > sync.archive_after_ms {
            return Err(ConfigError::Invalid(format!(
                "sync.archive_warning_ms must be within 0..={}, got {}",
                sync.archive_after_ms, sync.archive_warning_ms
            )));
        }
        Ok(())
    }
}
