//! CLI argument parsing for prom2hny
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: PROM2HNY_CONFIG)
//! - `--url`: kube-state-metrics exposition URL (env: PROM2HNY_URL)
//! - `--dataset`: Honeycomb dataset (env: PROM2HNY_DATASET)
//! - `--writekey`: Honeycomb writekey (env: HONEYCOMB_WRITEKEY)
//! - `--apihost`: Honeycomb API host (env: PROM2HNY_APIHOST)
//! - `--interval`: Seconds between scrapes (env: PROM2HNY_INTERVAL)
//! - `--bearer-token`: Bearer token for the scrape endpoint (env: PROM2HNY_BEARER_TOKEN)
//! - `--validate`: Validate configuration and exit
//! - `--dry-run`: Scrape once, print the events as JSON lines and exit
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: PROM2HNY_LOG_LEVEL)
//! - `--log-format`: Log output format (text/json, env: PROM2HNY_LOG_FORMAT)
//! - `--output-format`: Output format for --validate (text/json/yaml)
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// prom2hny - kube-state-metrics to Honeycomb events
///
/// Scrapes a kube-state-metrics endpoint on an interval, groups the metrics
/// into one event per Kubernetes object and sends the events to Honeycomb.
#[derive(Parser, Debug)]
#[command(name = "prom2hny")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "PROM2HNY_CONFIG"
    )]
    pub config: PathBuf,

    /// kube-state-metrics exposition URL (overrides config file)
    #[arg(long, value_name = "URL", env = "PROM2HNY_URL")]
    pub url: Option<String>,

    /// Honeycomb dataset (overrides config file)
    #[arg(long, value_name = "DATASET", env = "PROM2HNY_DATASET")]
    pub dataset: Option<String>,

    /// Honeycomb writekey (overrides config file)
    #[arg(long, value_name = "KEY", env = "HONEYCOMB_WRITEKEY", hide_env_values = true)]
    pub writekey: Option<String>,

    /// Honeycomb API host (overrides config file)
    #[arg(long, value_name = "URL", env = "PROM2HNY_APIHOST")]
    pub apihost: Option<String>,

    /// Seconds between scrapes (overrides config file)
    #[arg(long, value_name = "SECONDS", env = "PROM2HNY_INTERVAL")]
    pub interval: Option<u64>,

    /// Bearer token for the scrape endpoint (overrides config file)
    #[arg(
        long,
        value_name = "TOKEN",
        env = "PROM2HNY_BEARER_TOKEN",
        hide_env_values = true
    )]
    pub bearer_token: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Scrape once, print the events as JSON lines and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "PROM2HNY_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "PROM2HNY_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Output format for --validate
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Apply command-line and environment overrides on top of a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.source.url = url.clone();
        }
        if let Some(token) = &self.bearer_token {
            config.source.bearer_token = Some(token.clone());
        }
        if let Some(dataset) = &self.dataset {
            config.honeycomb.dataset = dataset.clone();
        }
        if let Some(writekey) = &self.writekey {
            config.honeycomb.writekey = Some(writekey.clone());
        }
        if let Some(apihost) = &self.apihost {
            config.honeycomb.api_host = apihost.clone();
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Output format options for validate mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}
