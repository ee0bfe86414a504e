//! InfluxDB line protocol rendering, used by `--once`
//!
//! ```text
//! uwsgi_workers,pid=200,url=tcp://127.0.0.1:1717,worker_id=1 avg_rt=0,requests=5i,status="idle"
//! ```
//!
//! Tags with empty values are dropped since line protocol cannot carry them.

use std::fmt::Write;

use crate::sink::{FieldValue, Metric};

/// Render a single record as one line (without trailing newline)
pub fn format_line(metric: &Metric) -> String {
    let mut line = String::with_capacity(128);
    escape_into(&mut line, &metric.measurement, &[',', ' ']);

    for (key, value) in metric.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape_into(&mut line, value, &[',', '=', ' ']);
    }

    for (i, (key, value)) in metric.fields.iter().enumerate() {
        line.push(if i == 0 { ' ' } else { ',' });
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        match value {
            FieldValue::Int(v) => {
                let _ = write!(line, "{}i", v);
            }
            FieldValue::Float(v) => {
                let _ = write!(line, "{}", v);
            }
            FieldValue::Str(s) => {
                line.push('"');
                escape_into(&mut line, s, &['"', '\\']);
                line.push('"');
            }
        }
    }

    line
}

/// Render records, one per line
pub fn format_lines(metrics: &[Metric]) -> String {
    let mut output = String::with_capacity(metrics.len() * 128);
    for metric in metrics {
        output.push_str(&format_line(metric));
        output.push('\n');
    }
    output
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
