//! Configuration management for the backup engine.
//!
//! Loads configuration from a TOML file (every field optional) and applies
//! environment variable overrides on top. A `.env` file in the working
//! directory is read first.

use crate::staleness::{DEFAULT_ALERT_THRESHOLD_DAYS, MAX_ALERT_THRESHOLD_DAYS};
use crate::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub staleness: StalenessConfig,
    pub log: LogConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding fingerprints and run history
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessConfig {
    /// Days without a full or smart run before the check reports overdue
    #[serde(default = "default_alert_threshold_days")]
    pub alert_threshold_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also append logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Follow symbolic links while scanning the source
    #[serde(default)]
    pub follow_links: bool,

    /// File names containing any of these are not backed up
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

// Default values
fn data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".backup_manager")
}

fn default_db_path() -> PathBuf {
    data_dir().join("backups.db")
}

fn default_alert_threshold_days() -> i64 {
    DEFAULT_ALERT_THRESHOLD_DAYS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            alert_threshold_days: default_alert_threshold_days(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| BackupError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// File (or defaults) plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("BACKUP_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }
        if let Some(days) = lookup("BACKUP_ALERT_DAYS") {
            self.staleness.alert_threshold_days = days
                .trim()
                .parse()
                .map_err(|_| BackupError::Config(format!("BACKUP_ALERT_DAYS: invalid number '{days}'")))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(file) = lookup("BACKUP_LOG_FILE") {
            self.log.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_ALERT_THRESHOLD_DAYS).contains(&self.staleness.alert_threshold_days) {
            return Err(BackupError::Config(format!(
                "staleness.alert_threshold_days must be between 0 and {MAX_ALERT_THRESHOLD_DAYS}, got {}",
                self.staleness.alert_threshold_days
            )));
        }
        if self.store.db_path.as_os_str().is_empty() {
            return Err(BackupError::Config("store.db_path must not be empty".into()));
        }
        Ok(())
    }
}
