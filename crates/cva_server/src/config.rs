//! Server configuration.
//!
//! Layered sources, highest precedence first: CLI arguments, environment
//! variables (`CVA_*`), a TOML file, built-in defaults. Every load path ends
//! in `validate`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port number: {0}, must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid {field}: must be at least 1")]
    InvalidBound { field: &'static str },

    #[error("pricer endpoint must not be empty")]
    MissingPricerEndpoint,

    #[error("configuration file error: {0}")]
    FileError(String),
}

/// Log levels supported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

/// Server configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Log level
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    /// URL of the external pricing engine's batch endpoint
    pub pricer_endpoint: String,
    /// Per-batch pricing call deadline, seconds
    pub pricing_timeout_secs: u64,
    /// Default items per pricing batch
    pub batch_size: usize,
    /// Default maximum pricing batches in flight
    pub fan_out: usize,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    LogLevel::from_str(&s).map_err(serde::de::Error::custom)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: LogLevel::Info,
            pricer_endpoint: "http://127.0.0.1:50001/price".to_string(),
            pricing_timeout_secs: 10,
            batch_size: 200,
            fan_out: 4,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CVA_SERVER_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("CVA_SERVER_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidPort(0))?;
        }
        if let Ok(log_level) = std::env::var("CVA_LOG_LEVEL") {
            config.log_level = LogLevel::from_str(&log_level)?;
        }
        if let Ok(endpoint) = std::env::var("CVA_PRICER_ENDPOINT") {
            config.pricer_endpoint = endpoint;
        }
        if let Ok(timeout) = std::env::var("CVA_PRICING_TIMEOUT_SECS") {
            config.pricing_timeout_secs = timeout.parse().unwrap_or(10);
        }
        if let Ok(batch_size) = std::env::var("CVA_BATCH_SIZE") {
            config.batch_size = batch_size
                .parse()
                .map_err(|_| ConfigError::InvalidBound { field: "batch_size" })?;
        }
        if let Ok(fan_out) = std::env::var("CVA_FAN_OUT") {
            config.fan_out = fan_out
                .parse()
                .map_err(|_| ConfigError::InvalidBound { field: "fan_out" })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("failed to read config file: {e}")))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::FileError(format!("failed to parse TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBound { field: "batch_size" });
        }
        if self.fan_out == 0 {
            return Err(ConfigError::InvalidBound { field: "fan_out" });
        }
        if self.pricer_endpoint.is_empty() {
            return Err(ConfigError::MissingPricerEndpoint);
        }
        Ok(())
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(log_level) = &cli.log_level {
            if let Ok(level) = LogLevel::from_str(log_level) {
                self.log_level = level;
            }
        }
        if let Some(endpoint) = &cli.pricer_endpoint {
            self.pricer_endpoint = endpoint.clone();
        }
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Host address override
    pub host: Option<String>,
    /// Port override
    pub port: Option<u16>,
    /// Log level override
    pub log_level: Option<String>,
    /// Pricing engine endpoint override
    pub pricer_endpoint: Option<String>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<ServerConfig, ConfigError> {
    let mut config = if let Some(config_path) = &cli.config_file {
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::default()
    };

    if let Ok(env_config) = ServerConfig::from_env() {
        if std::env::var("CVA_SERVER_HOST").is_ok() {
            config.host = env_config.host;
        }
        if std::env::var("CVA_SERVER_PORT").is_ok() {
            config.port = env_config.port;
        }
        if std::env::var("CVA_LOG_LEVEL").is_ok() {
            config.log_level = env_config.log_level;
        }
        if std::env::var("CVA_PRICER_ENDPOINT").is_ok() {
            config.pricer_endpoint = env_config.pricer_endpoint;
        }
        if std::env::var("CVA_PRICING_TIMEOUT_SECS").is_ok() {
            config.pricing_timeout_secs = env_config.pricing_timeout_secs;
        }
        if std::env::var("CVA_BATCH_SIZE").is_ok() {
            config.batch_size = env_config.batch_size;
        }
        if std::env::var("CVA_FAN_OUT").is_ok() {
            config.fan_out = env_config.fan_out;
        }
    }

    config.merge_with_cli(cli);
    config.validate()?;
    Ok(config)
}
