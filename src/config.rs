//! Cache configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Unknown keys are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Page size for every bulk-load phase.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Categories bulk-loaded by `init`.
    #[serde(default)]
    pub preload_categories: Vec<String>,

    /// Category of the reference loaded when a session is authorized.
    #[serde(default = "default_account_category")]
    pub account_category: String,

    /// Category of the reference loaded when a character is linked.
    #[serde(default = "default_character_category")]
    pub character_category: String,

    /// Share a single in-flight fetch between concurrent loads of one key.
    #[serde(default = "default_coalesce_loads")]
    pub coalesce_loads: bool,

    /// Per-subscriber outbound event buffer.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins
    /// when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include the event target (module path).
    #[serde(default = "default_true")]
    pub target: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
    /// Condensed single-line output.
    Compact,
}

fn default_page_size() -> usize {
    100
}

fn default_account_category() -> String {
    "ACCOUNT".to_string()
}

fn default_character_category() -> String {
    "CHARACTER".to_string()
}

fn default_coalesce_loads() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            preload_categories: Vec::new(),
            account_category: default_account_category(),
            character_category: default_character_category(),
            coalesce_loads: default_coalesce_loads(),
            event_capacity: default_event_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            target: true,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl CacheConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse { message: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(invalid("page_size", "must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", "must be > 0"));
        }
        if self.account_category.is_empty() {
            return Err(invalid("account_category", "must not be empty"));
        }
        if self.character_category.is_empty() {
            return Err(invalid("character_category", "must not be empty"));
        }
        if let Some(empty) = self.preload_categories.iter().position(String::is_empty) {
            return Err(invalid("preload_categories", format!("entry {empty} is empty")));
        }
        self.logging.validate()
    }
}

impl LoggingConfig {
    /// Validate the logging section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}
