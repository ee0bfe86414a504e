//! Record to Prometheus sample conversion
//!
//! Each numeric field of a record becomes one sample named
//! `<measurement>_<field>`, labelled with the record's tags. String fields
//! become an `_info` sample with the string carried as a label and value 1.
//!
//! ```text
//! uwsgi_workers{pid="200",url="tcp://...",worker_id="1"} requests=5i status="idle"
//!   -> uwsgi_workers_requests{pid="200",url="tcp://...",worker_id="1"} 5
//!   -> uwsgi_workers_status_info{pid="200",status="idle",url="tcp://...",worker_id="1"} 1
//! ```
//!
//! App records carry no `url` tag. Their samples take the `url` of the
//! overview record that precedes them, so identical apps on two stats
//! servers stay separate series.

use std::collections::HashMap;

use crate::collector::{APPS_MEASUREMENT, OVERVIEW_MEASUREMENT, WORKERS_MEASUREMENT};
use crate::sink::{FieldValue, Metric};

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    /// A value that can go up and down
    Gauge,
    /// A monotonically increasing value
    Counter,
    /// Type is not specified
    #[default]
    Untyped,
}

impl MetricType {
    /// Returns the Prometheus type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::Untyped => "untyped",
        }
    }
}

/// Fields that only ever grow while the process lives
const COUNTER_FIELDS: &[(&str, &str)] = &[
    (OVERVIEW_MEASUREMENT, "listen_queue_errors"),
    (WORKERS_MEASUREMENT, "requests"),
    (WORKERS_MEASUREMENT, "harakiri_count"),
    (WORKERS_MEASUREMENT, "signals"),
    (WORKERS_MEASUREMENT, "respawn_count"),
    (WORKERS_MEASUREMENT, "tx"),
    (APPS_MEASUREMENT, "requests"),
    (APPS_MEASUREMENT, "exceptions"),
];

/// Classify a record field
pub fn metric_type_for(measurement: &str, field: &str) -> MetricType {
    if COUNTER_FIELDS
        .iter()
        .any(|(m, f)| *m == measurement && *f == field)
    {
        MetricType::Counter
    } else {
        MetricType::Gauge
    }
}

fn help_for(measurement: &str, field: &str) -> String {
    let scope = match measurement {
        OVERVIEW_MEASUREMENT => "uWSGI server",
        WORKERS_MEASUREMENT => "uWSGI worker",
        APPS_MEASUREMENT => "uWSGI application",
        other => other,
    };
    format!("{} {}", scope, field.replace('_', " "))
}

/// Convert emitted records into Prometheus samples, preserving record order
pub fn to_prometheus(records: &[Metric]) -> Vec<PrometheusMetric> {
    let mut metrics = Vec::with_capacity(records.len() * 4);
    let mut current_url: Option<&str> = None;

    for record in records {
        if record.measurement == OVERVIEW_MEASUREMENT {
            current_url = record.tag("url");
        }
        let inherited_url = current_url
            .filter(|_| record.measurement == APPS_MEASUREMENT && record.tag("url").is_none());

        for (field, value) in &record.fields {
            let metric = match value {
                FieldValue::Str(s) => PrometheusMetric::new(
                    format!("{}_{}_info", record.measurement, field),
                    1.0,
                )
                .with_type(MetricType::Gauge)
                .with_help(help_for(&record.measurement, field))
                .with_label(field.clone(), s.clone()),
                numeric => PrometheusMetric::new(
                    format!("{}_{}", record.measurement, field),
                    numeric.as_f64().unwrap_or_default(),
                )
                .with_type(metric_type_for(&record.measurement, field))
                .with_help(help_for(&record.measurement, field)),
            };

            let mut metric = record
                .tags
                .iter()
                .fold(metric, |m, (k, v)| m.with_label(k.clone(), v.clone()));
            if let Some(url) = inherited_url {
                metric = metric.with_label("url", url);
            }
            metrics.push(metric);
        }
    }

    metrics
}

/// A single Prometheus sample
#[derive(Debug, Clone, PartialEq)]
pub struct PrometheusMetric {
    /// Metric name
    pub name: String,
    /// Metric type (gauge, counter, untyped)
    pub metric_type: MetricType,
    /// Help text
    pub help: Option<String>,
    /// Labels
    pub labels: HashMap<String, String>,
    /// Metric value
    pub value: f64,
}

impl PrometheusMetric {
    /// Create a new metric
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Untyped,
            help: None,
            labels: HashMap::new(),
            value,
        }
    }

    /// Set the metric type
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}
