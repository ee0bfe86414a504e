//! Prometheus text exposition output (version 0.0.4)
//!
//! ```text
//! # HELP <metric_name> <help_text>
//! # TYPE <metric_name> <type>
//! <metric_name>{<label1>="<value1>",<label2>="<value2>"} <value>
//! ```

use std::collections::HashMap;
use std::fmt::Write;

use super::engine::PrometheusMetric;

/// Renders `PrometheusMetric` samples as exposition text
///
/// # Example
///
/// ```ignore
/// use uwsgi_exporter::transformer::{to_prometheus, PrometheusFormatter};
///
/// let body = PrometheusFormatter::new().format(&to_prometheus(&records));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusFormatter;

impl PrometheusFormatter {
    /// Create a new formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Format samples into a fresh string
    ///
    /// Samples sharing a name are grouped under one HELP/TYPE header, in
    /// order of first appearance. Labels are sorted by key.
    pub fn format(&self, metrics: &[PrometheusMetric]) -> String {
        let mut output = String::with_capacity(metrics.len() * 96);
        self.format_into(&mut output, metrics);
        output
    }

    /// Append formatted samples to an existing buffer
    pub fn format_into(&self, output: &mut String, metrics: &[PrometheusMetric]) {
        for group in group_by_name(metrics) {
            let head = group[0];

            if let Some(help) = &head.help {
                let _ = writeln!(output, "# HELP {} {}", head.name, escape_help(help));
            }
            let _ = writeln!(output, "# TYPE {} {}", head.name, head.metric_type.as_str());

            for metric in group {
                write_sample(output, metric);
            }
        }
    }
}

fn write_sample(output: &mut String, metric: &PrometheusMetric) {
    output.push_str(&metric.name);

    if !metric.labels.is_empty() {
        let mut labels: Vec<_> = metric.labels.iter().collect();
        labels.sort_unstable_by(|a, b| a.0.cmp(b.0));

        output.push('{');
        for (i, (key, value)) in labels.into_iter().enumerate() {
            if i > 0 {
                output.push(',');
            }
            let _ = write!(output, "{}=\"{}\"", key, escape_label_value(value));
        }
        output.push('}');
    }

    output.push(' ');
    output.push_str(&format_value(metric.value));
    output.push('\n');
}

/// Group samples by name, keeping the order names first appear in
fn group_by_name(metrics: &[PrometheusMetric]) -> Vec<Vec<&PrometheusMetric>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&PrometheusMetric>> = Vec::new();

    for metric in metrics {
        match index.get(metric.name.as_str()).copied() {
            Some(i) => groups[i].push(metric),
            None => {
                index.insert(metric.name.as_str(), groups.len());
                groups.push(vec![metric]);
            }
        }
    }

    groups
}

/// Render a sample value
///
/// Whole numbers below 1e15 print without a decimal point so that
/// integer counters such as `rss` stay exact.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let inf = if value.is_sign_positive() { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
