//! uwsgi-exporter library
//!
//! Polls uWSGI stats servers (tcp, unix socket or http), decodes their JSON
//! stats document and turns it into `uwsgi_overview`, `uwsgi_workers` and
//! `uwsgi_apps` records, exported in Prometheus format.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod sink;
pub mod transformer;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::cli::LogFormat;

/// Initialize the logging subsystem
///
/// Logs go to stderr so `--once` output on stdout stays machine readable.
/// `RUST_LOG` takes precedence over `level`.
///
/// # Arguments
/// * `level` - Log level string (trace, debug, info, warn, error)
/// * `format` - Plain text or JSON lines
///
/// # Errors
/// Returns an error if the logging system fails to initialize
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
