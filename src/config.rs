//! Configuration management for uwsgi-exporter
//!
//! Handles loading and validating configuration from YAML files.
//!
//! ```yaml
//! servers:
//!   - "tcp://127.0.0.1:1717"
//!   - "unix:///run/uwsgi/stats.sock"
//!   - "http://127.0.0.1:1718"
//! timeout_ms: 5000
//! fail_fast: false
//! server:
//!   port: 9717
//!   path: /metrics
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::collector::Target;

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
    /// uWSGI stats server targets, polled in order
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Dial timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// HTTP time-to-first-response-header in milliseconds
    #[serde(default = "default_timeout")]
    pub response_header_timeout_ms: u64,

    /// Total HTTP request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Abort the whole sweep on the first failing target
    #[serde(default)]
    pub fail_fast: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

// Default value functions
fn default_servers() -> Vec<String> {
    vec!["tcp://127.0.0.1:1717".to_string()]
}

fn default_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    20000
}

fn default_port() -> u16 {
    9717
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            timeout_ms: default_timeout(),
            response_header_timeout_ms: default_timeout(),
            request_timeout_ms: default_request_timeout(),
            fail_fast: false,
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_metrics_path(),
            bind_address: default_bind_address(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file without validating it
    ///
    /// Used when CLI overrides still have to be applied before validation.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Parse a YAML file, falling back to defaults if not found
    pub fn read_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::read(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one stats server must be configured".to_string(),
            ));
        }

        for server in &self.servers {
            Target::parse(server).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.timeout_ms == 0
            || self.response_header_timeout_ms == 0
            || self.request_timeout_ms == 0
        {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "Metrics path must start with '/'".to_string(),
            ));
        }

        if self.server.path == "/" || self.server.path == "/health" {
            return Err(ConfigError::ValidationError(format!(
                "Metrics path '{}' conflicts with a built-in endpoint",
                self.server.path
            )));
        }

        Ok(())
    }
}
