//! CLI configuration.
//!
//! Read from `config/gvbridge.toml` (or the `--config` path). Every field
//! has a default, and a missing file means "all defaults".

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gvbridge_store::DbOptions;
use serde::Deserialize;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/gvbridge.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn options(&self) -> DbOptions {
        DbOptions {
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/gvbridge.db")
}

fn default_busy_timeout_ms() -> u32 {
    gvbridge_store::db::DEFAULT_BUSY_TIMEOUT_MS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CliConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.path, PathBuf::from("data/gvbridge.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = CliConfig::parse(
            r#"
            [database]
            path = "/var/lib/gvbridge/bridge.db"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/gvbridge/bridge.db")
        );
        assert_eq!(config.database.options().busy_timeout_ms, 5_000);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[database\npath = 3").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(CliConfig::parse("[logging]\nformat = \"xml\"").is_err());
    }
}
