//! CLI argument parsing for uwsgi-exporter
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: UWSGI_EXPORTER_CONFIG)
//! - `--port` / `-p`: Server port (env: UWSGI_EXPORTER_PORT)
//! - `--bind-address`: Server bind address (env: UWSGI_EXPORTER_BIND_ADDRESS)
//! - `--metrics-path`: Metrics endpoint path (env: UWSGI_EXPORTER_METRICS_PATH)
//! - `--server` / `-s`: Stats server target, repeatable, taken verbatim
//! - `UWSGI_EXPORTER_SERVERS`: Comma-separated targets, used when no `--server` is given
//! - `--timeout`: Dial timeout in milliseconds (env: UWSGI_EXPORTER_TIMEOUT)
//! - `--fail-fast`: Abort a sweep on the first failing target
//! - `--validate`: Validate configuration without starting server
//! - `--once`: Poll every target once, print the records and exit
//! - `--log-level` / `-l`: Log level (env: UWSGI_EXPORTER_LOG_LEVEL)
//! - `--log-format`: Log output format, text or json (env: UWSGI_EXPORTER_LOG_FORMAT)
//! - `--output-format`: Output format for --validate and --once (text/json/yaml)
//!
//! # Precedence
//!
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// uwsgi-exporter - uWSGI stats server poller
///
/// Polls uWSGI stats servers over tcp, unix sockets or http and exports
/// overview, worker and application metrics in Prometheus format.
#[derive(Parser, Debug)]
#[command(name = "uwsgi-exporter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "UWSGI_EXPORTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Server port (overrides config file)
    #[arg(short, long, value_name = "PORT", env = "UWSGI_EXPORTER_PORT")]
    pub port: Option<u16>,

    /// Server bind address (overrides config file)
    #[arg(long, value_name = "ADDRESS", env = "UWSGI_EXPORTER_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Metrics endpoint path (overrides config file)
    /// Must start with '/' and not conflict with '/' or '/health'
    #[arg(long, value_name = "PATH", env = "UWSGI_EXPORTER_METRICS_PATH")]
    pub metrics_path: Option<String>,

    /// uWSGI stats server, e.g. tcp://127.0.0.1:1717 or unix:///run/uwsgi/stats.sock
    /// (repeatable, replaces the servers from the config file)
    #[arg(short = 's', long = "server", value_name = "URL")]
    pub servers: Vec<String>,

    /// Comma-separated stats servers from the environment
    ///
    /// Kept apart from `--server` so a comma inside a URL passed on the
    /// command line is never split.
    #[arg(
        long = "server-list",
        hide = true,
        value_name = "URLS",
        env = "UWSGI_EXPORTER_SERVERS",
        value_delimiter = ','
    )]
    pub env_servers: Vec<String>,

    /// Dial timeout in milliseconds (overrides config file)
    #[arg(long, value_name = "MS", env = "UWSGI_EXPORTER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Abort a sweep on the first failing target
    #[arg(long)]
    pub fail_fast: bool,

    /// Validate configuration without starting server
    #[arg(long)]
    pub validate: bool,

    /// Poll every target once, print the records and exit
    #[arg(long, conflicts_with = "validate")]
    pub once: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "UWSGI_EXPORTER_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "text",
        env = "UWSGI_EXPORTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Output format for --validate and --once
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Apply CLI and environment overrides on top of a loaded config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind_address) = &self.bind_address {
            config.server.bind_address = bind_address.clone();
        }
        if let Some(path) = &self.metrics_path {
            config.server.path = path.clone();
        }
        if !self.servers.is_empty() {
            config.servers = self.servers.clone();
        } else if !self.env_servers.is_empty() {
            config.servers = self.env_servers.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if self.fail_fast {
            config.fail_fast = true;
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
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(level)
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Output format options for validate and once modes
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (line protocol for --once)
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
