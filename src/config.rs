//! Configuration management for prom2hny
//!
//! Handles loading and validating configuration from YAML files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Longest accepted polling interval (one year)
pub const MAX_INTERVAL_SECS: u64 = 86_400 * 365;

/// Environment variable consulted when no writekey is configured
pub const WRITEKEY_ENV: &str = "HONEYCOMB_WRITEKEY";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exposition endpoint configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Honeycomb delivery configuration
    #[serde(default)]
    pub honeycomb: HoneycombConfig,

    /// Seconds between polling cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

/// kube-state-metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Exposition endpoint URL
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_source_timeout")]
    pub timeout_ms: u64,

    /// Optional bearer token sent with each scrape
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// Honeycomb configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneycombConfig {
    /// Honeycomb API host
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Dataset events are sent to
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Team writekey; falls back to `HONEYCOMB_WRITEKEY`
    #[serde(default)]
    pub writekey: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_send_timeout")]
    pub timeout_ms: u64,

    /// Maximum events per batch request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

// Default value functions
fn default_source_url() -> String {
    "http://localhost:8080/metrics".to_string()
}

fn default_source_timeout() -> u64 {
    5000
}

fn default_api_host() -> String {
    "https://api.honeycomb.io".to_string()
}

fn default_dataset() -> String {
    "kubernetes".to_string()
}

fn default_send_timeout() -> u64 {
    10000
}

fn default_max_batch_size() -> usize {
    50
}

fn default_interval() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            honeycomb: HoneycombConfig::default(),
            interval_secs: default_interval(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_ms: default_source_timeout(),
            bearer_token: None,
        }
    }
}

impl Default for HoneycombConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            dataset: default_dataset(),
            writekey: None,
            timeout_ms: default_send_timeout(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    ///
    /// # Note
    /// - If the file doesn't exist, returns `ConfigError::ReadError`
    /// - Use `Config::load_or_default()` if you want fallback to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not found
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Writekey from the config, or from `HONEYCOMB_WRITEKEY`
    pub fn resolve_writekey(&self) -> Option<String> {
        self.honeycomb
            .writekey
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(WRITEKEY_ENV).ok().filter(|key| !key.is_empty()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url("source url", &self.source.url)?;
        check_http_url("Honeycomb api_host", &self.honeycomb.api_host)?;

        if self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "interval_secs must be between 1 and {}",
                MAX_INTERVAL_SECS
            )));
        }

        if self.source.timeout_ms == 0 || self.honeycomb.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.honeycomb.max_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.honeycomb.dataset.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Honeycomb dataset must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value).map_err(|e| {
        ConfigError::ValidationError(format!("Invalid {} '{}': {}", field, value, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "Invalid {} '{}': scheme must be http or https",
            field, value
        )));
    }

    Ok(())
}
