//! HTTP request handlers

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::AppState;
use crate::error::AppResult;
use crate::sink::Metric;
use crate::transformer::{to_prometheus, MetricType, PrometheusFormatter, PrometheusMetric};

/// Prometheus text exposition content type
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    /// Number of configured stats servers
    servers: usize,
}

/// Root endpoint - displays basic info
pub async fn root(State(state): State<AppState>) -> Html<String> {
    let targets: String = state
        .config
        .servers
        .iter()
        .map(|s| format!("        <li><code>{}</code></li>\n", html_escape(s)))
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>uwsgi-exporter</title>
</head>
<body>
    <h1>uwsgi-exporter</h1>
    <p>Version: {}</p>
    <ul>
        <li><a href="/health">Health Check</a></li>
        <li><a href="{}">Metrics</a></li>
    </ul>
    <h2>Stats servers</h2>
    <ul>
{}    </ul>
</body>
</html>"#,
        env!("CARGO_PKG_VERSION"),
        state.config.server.path,
        targets
    );
    Html(html)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        servers: state.config.servers.len(),
    })
}

/// Metrics endpoint - polls every stats server and returns Prometheus text
///
/// Failing targets only show up in the error counter and internal metrics,
/// unless `fail_fast` is set, in which case the scrape answers 502.
#[instrument(skip(state), name = "metrics_handler")]
pub async fn metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let start = Instant::now();

    let mut records: Vec<Metric> = Vec::new();
    let report = state.collector.gather(&mut records).await?;

    let samples = to_prometheus(&records);
    let formatter = PrometheusFormatter::new();
    let mut output = formatter.format(&samples);

    let scrape_duration = start.elapsed().as_secs_f64();
    formatter.format_into(
        &mut output,
        &exporter_metrics(scrape_duration, report.errors.len(), report.records),
    );
    output.push_str(&state.collector.internal_metrics().format_prometheus());

    debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        records = report.records,
        samples = samples.len(),
        errors = report.errors.len(),
        "Metrics collection complete"
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        output,
    ))
}

fn exporter_metrics(scrape_duration: f64, errors: usize, records: usize) -> Vec<PrometheusMetric> {
    vec![
        PrometheusMetric::new("uwsgi_exporter_info", 1.0)
            .with_type(MetricType::Gauge)
            .with_help("uwsgi-exporter information")
            .with_label("version", env!("CARGO_PKG_VERSION")),
        PrometheusMetric::new("uwsgi_exporter_scrape_duration_seconds", scrape_duration)
            .with_type(MetricType::Gauge)
            .with_help("Time spent polling all stats servers"),
        PrometheusMetric::new("uwsgi_exporter_scrape_errors_total", errors as f64)
            .with_type(MetricType::Counter)
            .with_help("Number of stats servers that failed during this scrape"),
        PrometheusMetric::new("uwsgi_exporter_records_scraped", records as f64)
            .with_type(MetricType::Gauge)
            .with_help("Number of records collected during this scrape"),
    ]
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
