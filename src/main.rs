//! uwsgi-exporter - uWSGI stats server poller
//!
//! Serves a Prometheus endpoint, or with `--once` prints a single sweep.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use uwsgi_exporter::cli::{Cli, OutputFormat};
use uwsgi_exporter::collector::{CollectConfig, Collector};
use uwsgi_exporter::config::Config;
use uwsgi_exporter::server;
use uwsgi_exporter::sink::Metric;
use uwsgi_exporter::transformer::format_lines;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    uwsgi_exporter::init_logging(&cli.log_level.to_string(), cli.log_format)?;

    let mut config = Config::read_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    cli.apply_to(&mut config);
    config.validate()?;

    if cli.validate {
        print_validation(&config, cli.output_format)?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.once {
        return run_once(config, cli.output_format).await;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        servers = config.servers.len(),
        "Starting uwsgi-exporter"
    );

    let port = config.server.port;
    server::run(config, port).await?;

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    valid: bool,
    config: &'a Config,
}

fn print_validation(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Configuration is valid");
            for server in &config.servers {
                println!("  server: {}", server);
            }
            println!(
                "  listen: {}:{}{}",
                config.server.bind_address, config.server.port, config.server.path
            );
        }
        OutputFormat::Json => {
            let out = ValidationOutput { valid: true, config };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Yaml => {
            let out = ValidationOutput { valid: true, config };
            print!("{}", serde_yaml::to_string(&out)?);
        }
    }
    Ok(())
}

/// Poll every target once and print the records to stdout
///
/// Exits non-zero when any target failed, after printing what was collected.
async fn run_once(config: Config, format: OutputFormat) -> Result<ExitCode> {
    let collector = Collector::new(CollectConfig::from(&config))?;

    let mut records: Vec<Metric> = Vec::new();
    let report = collector.gather(&mut records).await?;

    match format {
        OutputFormat::Text => print!("{}", format_lines(&records)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&records)?),
    }

    if report.errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        for e in &report.errors {
            eprintln!("error: {}", e);
        }
        Ok(ExitCode::FAILURE)
    }
}
