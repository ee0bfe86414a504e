//! Output rendering for collected records
//!
//! - [`engine`] turns records into Prometheus samples
//! - [`formatter`] renders samples as Prometheus exposition text
//! - [`line_protocol`] renders records as InfluxDB line protocol

pub mod engine;
pub mod formatter;
pub mod line_protocol;

pub use engine::{metric_type_for, to_prometheus, MetricType, PrometheusMetric};
pub use formatter::PrometheusFormatter;
pub use line_protocol::{format_line, format_lines};
