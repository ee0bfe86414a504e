//! Internal observability metrics for uwsgi-exporter
//!
//! Tracks how polling of each configured stats server went, so a dead
//! target is visible even though it emits no `uwsgi_*` records.
//!
//! # Metrics
//!
//! - `uwsgi_exporter_target_scrape_success_total{target="..."}` - Counter of successful polls
//! - `uwsgi_exporter_target_scrape_failure_total{target="..."}` - Counter of failed polls
//! - `uwsgi_exporter_target_scrape_duration_seconds{target="..."}` - Histogram of poll durations

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::transformer::{MetricType, PrometheusFormatter, PrometheusMetric};

/// Upper bounds (seconds) of the poll duration buckets
pub const POLL_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0,
];

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lock-free duration histogram
///
/// Each observation lands in exactly one slot; cumulative bucket counts are
/// computed when read. The last slot is the implicit `+Inf` bucket.
#[derive(Debug)]
pub struct DurationHistogram {
    bounds: &'static [f64],
    slots: Box<[AtomicU64]>,
    sum_nanos: AtomicU64,
}

impl DurationHistogram {
    /// Histogram over the given ascending upper bounds (seconds)
    pub fn new(bounds: &'static [f64]) -> Self {
        Self {
            bounds,
            slots: (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect(),
            sum_nanos: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let slot = self.bounds.partition_point(|&bound| bound < secs);
        self.slots[slot].fetch_add(1, Ordering::Relaxed);

        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Total observations
    pub fn count(&self) -> u64 {
        self.slots.iter().map(|s| s.load(Ordering::Relaxed)).sum()
    }

    /// Sum of observations in seconds
    pub fn sum_seconds(&self) -> f64 {
        Duration::from_nanos(self.sum_nanos.load(Ordering::Relaxed)).as_secs_f64()
    }

    /// `(upper bound, cumulative count)` pairs ending with `+Inf`
    pub fn cumulative_buckets(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(self.slots.iter())
            .map(|(bound, slot)| {
                running += slot.load(Ordering::Relaxed);
                (bound, running)
            })
            .collect()
    }
}

impl Default for DurationHistogram {
    fn default() -> Self {
        Self::new(POLL_DURATION_BUCKETS)
    }
}

/// Poll outcome metrics of one target
#[derive(Debug, Default)]
pub struct TargetMetrics {
    pub scrape_success_total: Counter,
    pub scrape_failure_total: Counter,
    pub scrape_duration_seconds: DurationHistogram,
}

/// Per-target registry, shared between the collector and the HTTP handler
///
/// Cloning shares the underlying registry.
#[derive(Debug, Clone, Default)]
pub struct InternalMetrics {
    /// Keyed by the configured target string, sorted for stable output
    targets: Arc<RwLock<BTreeMap<String, Arc<TargetMetrics>>>>,
}

impl InternalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics of a target, created on first use
    pub fn target(&self, target: &str) -> Arc<TargetMetrics> {
        if let Some(metrics) = self
            .targets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(target)
        {
            return Arc::clone(metrics);
        }

        let mut targets = self.targets.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(targets.entry(target.to_string()).or_default())
    }

    pub fn record_scrape_success(&self, target: &str, elapsed: Duration) {
        let metrics = self.target(target);
        metrics.scrape_success_total.inc();
        metrics.scrape_duration_seconds.observe(elapsed);
    }

    pub fn record_scrape_failure(&self, target: &str, elapsed: Duration) {
        let metrics = self.target(target);
        metrics.scrape_failure_total.inc();
        metrics.scrape_duration_seconds.observe(elapsed);
    }

    /// Samples for every known target
    pub fn to_prometheus_metrics(&self) -> Vec<PrometheusMetric> {
        let targets = self.targets.read().unwrap_or_else(|e| e.into_inner());
        let mut samples = Vec::with_capacity(targets.len() * (POLL_DURATION_BUCKETS.len() + 5));

        for (target, metrics) in targets.iter() {
            samples.push(
                PrometheusMetric::new(
                    "uwsgi_exporter_target_scrape_success_total",
                    metrics.scrape_success_total.get() as f64,
                )
                .with_type(MetricType::Counter)
                .with_help("Polls of a stats server that produced records")
                .with_label("target", target),
            );
            samples.push(
                PrometheusMetric::new(
                    "uwsgi_exporter_target_scrape_failure_total",
                    metrics.scrape_failure_total.get() as f64,
                )
                .with_type(MetricType::Counter)
                .with_help("Polls of a stats server that failed to parse or connect")
                .with_label("target", target),
            );

            let histogram = &metrics.scrape_duration_seconds;
            for (bound, count) in histogram.cumulative_buckets() {
                let le = if bound.is_infinite() {
                    "+Inf".to_string()
                } else {
                    bound.to_string()
                };
                samples.push(
                    PrometheusMetric::new(
                        "uwsgi_exporter_target_scrape_duration_seconds_bucket",
                        count as f64,
                    )
                    .with_help("Time spent connecting to and reading a stats server")
                    .with_label("target", target)
                    .with_label("le", le),
                );
            }
            samples.push(
                PrometheusMetric::new(
                    "uwsgi_exporter_target_scrape_duration_seconds_sum",
                    histogram.sum_seconds(),
                )
                .with_label("target", target),
            );
            samples.push(
                PrometheusMetric::new(
                    "uwsgi_exporter_target_scrape_duration_seconds_count",
                    histogram.count() as f64,
                )
                .with_label("target", target),
            );
        }

        samples
    }

    /// Render as Prometheus exposition text
    pub fn format_prometheus(&self) -> String {
        PrometheusFormatter::new().format(&self.to_prometheus_metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::default();
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        static BOUNDS: &[f64] = &[0.1, 0.5, 1.0];
        let histogram = DurationHistogram::new(BOUNDS);

        histogram.observe(Duration::from_millis(50));
        histogram.observe(Duration::from_millis(100));
        histogram.observe(Duration::from_millis(300));
        histogram.observe(Duration::from_secs(2));

        assert_eq!(
            histogram.cumulative_buckets(),
            vec![(0.1, 2), (0.5, 3), (1.0, 3), (f64::INFINITY, 4)]
        );
        assert_eq!(histogram.count(), 4);
        assert!((histogram.sum_seconds() - 2.45).abs() < 1e-9);
    }

    #[test]
    fn test_default_histogram_has_inf_bucket() {
        let buckets = DurationHistogram::default().cumulative_buckets();
        assert_eq!(buckets.len(), POLL_DURATION_BUCKETS.len() + 1);
        assert!(buckets[buckets.len() - 1].0.is_infinite());
    }

    #[test]
    fn test_record_per_target() {
        let metrics = InternalMetrics::new();

        metrics.record_scrape_success("tcp://localhost:1717", Duration::from_millis(5));
        metrics.record_scrape_success("tcp://localhost:1717", Duration::from_millis(10));
        metrics.record_scrape_failure("tcp://localhost:1717", Duration::from_millis(500));
        metrics.record_scrape_failure("unix:///tmp/stats.sock", Duration::ZERO);

        let tcp = metrics.target("tcp://localhost:1717");
        assert_eq!(tcp.scrape_success_total.get(), 2);
        assert_eq!(tcp.scrape_failure_total.get(), 1);
        assert_eq!(tcp.scrape_duration_seconds.count(), 3);

        let unix = metrics.target("unix:///tmp/stats.sock");
        assert_eq!(unix.scrape_success_total.get(), 0);
        assert_eq!(unix.scrape_failure_total.get(), 1);
    }

    #[test]
    fn test_clone_shares_registry() {
        let metrics = InternalMetrics::new();
        metrics
            .clone()
            .record_scrape_failure("unix:///tmp/stats.sock", Duration::from_millis(1));

        assert_eq!(
            metrics
                .target("unix:///tmp/stats.sock")
                .scrape_failure_total
                .get(),
            1
        );
    }

    #[test]
    fn test_format_prometheus() {
        let metrics = InternalMetrics::new();
        metrics.record_scrape_success("tcp://localhost:1717", Duration::from_millis(50));

        let output = metrics.format_prometheus();

        assert!(output.contains(
            "uwsgi_exporter_target_scrape_success_total{target=\"tcp://localhost:1717\"} 1"
        ));
        assert!(output.contains("# TYPE uwsgi_exporter_target_scrape_failure_total counter"));
        assert!(output.contains(
            "uwsgi_exporter_target_scrape_duration_seconds_bucket{le=\"0.05\",target=\"tcp://localhost:1717\"} 1"
        ));
        assert!(output.contains(
            "uwsgi_exporter_target_scrape_duration_seconds_bucket{le=\"0.01\",target=\"tcp://localhost:1717\"} 0"
        ));
        assert!(output.contains("le=\"+Inf\""));
    }

    #[test]
    fn test_empty_registry_formats_nothing() {
        assert!(InternalMetrics::new().format_prometheus().is_empty());
    }
}
