//! Configuration management for exports
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Environment variable overriding the missing-number fallback
pub const NUMBER_MISSING_VALUE_ENV: &str = "NUMBER_MISSING_VALUE";

/// Environment variable overriding the missing-string fallback
pub const STRING_MISSING_VALUE_ENV: &str = "STRING_MISSING_VALUE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fallbacks for absent numeric and string values
    #[serde(default)]
    pub missing: MissingValues,

    /// Export pipeline settings
    #[serde(default)]
    pub export: ExportSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values substituted for absent fields that declare no default of their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    /// Used for numeric fields
    #[serde(default = "default_missing_number")]
    pub number: f64,

    /// Used for string fields
    #[serde(default = "default_missing_string")]
    pub string: String,
}

/// Export pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Cursor batch size requested from the server
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// How delimiter characters inside string cells are handled
    #[serde(default)]
    pub escape: EscapeMode,

    /// Field sorted on (descending) when a model export gives no sort
    #[serde(default = "default_sort_field")]
    pub default_sort_field: String,

    /// Log progress every N records
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

/// Handling of commas inside string cells
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// Replace every `,` with `;` before serialization.
    ///
    /// Keeps output byte-compatible with files produced by earlier exporters.
    #[default]
    Semicolon,

    /// Leave strings untouched and rely on CSV quoting.
    Quote,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_missing_number() -> f64 {
    0.0
}

fn default_missing_string() -> String {
    "NA".to_string()
}

fn default_batch_size() -> u32 {
    1000
}

fn default_delimiter() -> char {
    ','
}

fn default_sort_field() -> String {
    "updatedAt".to_string()
}

fn default_progress_interval() -> u64 {
    10_000
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for MissingValues {
    fn default() -> Self {
        Self {
            number: default_missing_number(),
            string: default_missing_string(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delimiter: default_delimiter(),
            escape: EscapeMode::default(),
            default_sort_field: default_sort_field(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// A missing file at the default location is not an error; an explicitly
    /// requested file that does not exist is.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Recognises `NUMBER_MISSING_VALUE` and `STRING_MISSING_VALUE`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(NUMBER_MISSING_VALUE_ENV) {
            self.missing.number =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: NUMBER_MISSING_VALUE_ENV.to_string(),
                        value: value.clone(),
                    })?;
        }

        if let Some(value) = lookup(STRING_MISSING_VALUE_ENV) {
            self.missing.string = value;
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mongo-exportable")
            .join("config.toml")
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.export.delimiter_byte()?;

        if self.export.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if !self.missing.number.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "missing.number".to_string(),
                value: self.missing.number.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl ExportSettings {
    /// Delimiter as the single byte the CSV writer expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() && !matches!(self.delimiter, '"' | '\n' | '\r') {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::InvalidValue {
                field: "export.delimiter".to_string(),
                value: self.delimiter.to_string(),
            }
            .into())
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.missing.number, 0.0);
        assert_eq!(config.missing.string, "NA");
        assert_eq!(config.export.escape, EscapeMode::Semicolon);
        assert_eq!(config.export.default_sort_field, "updatedAt");
        assert_eq!(config.export.delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [missing]
            string = "N/A"

            [export]
            escape = "quote"
            delimiter = ";"
            "#,
        )
        .unwrap();

        assert_eq!(config.missing.string, "N/A");
        assert_eq!(config.missing.number, 0.0);
        assert_eq!(config.export.escape, EscapeMode::Quote);
        assert_eq!(config.export.delimiter_byte().unwrap(), b';');
        assert_eq!(config.export.batch_size, 1000);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[export]\nbatch_size = \"many\"").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportableError::Config(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(Config::from_toml("[export]\nbatch_size = 0").is_err());
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let mut config = Config::default();
        config.export.delimiter = '§';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (NUMBER_MISSING_VALUE_ENV, "-1"),
            (STRING_MISSING_VALUE_ENV, "unknown"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.missing.number, -1.0);
        assert_eq!(config.missing.string, "unknown");
    }

    #[test]
    fn test_bad_number_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == NUMBER_MISSING_VALUE_ENV).then(|| "zero".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(NUMBER_MISSING_VALUE_ENV));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/exportable.toml"))).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportableError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join("mongo_exportable_config_roundtrip.toml");
        let mut config = Config::default();
        config.missing.string = "-".to_string();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.missing.string, "-");

        std::fs::remove_file(&path).ok();
    }
}
