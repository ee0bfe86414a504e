//! Metric records and the sink they are pushed into
//!
//! A record is a `(measurement, fields, tags)` triple. Everything the
//! collector produces flows through [`MetricSink::add_fields`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Field map of a single record, ordered by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// Tag map of a single record, ordered by tag name
pub type Tags = BTreeMap<String, String>;

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer counter or gauge
    Int(i64),
    /// Floating point gauge
    Float(f64),
    /// Free-form string (e.g. worker status)
    Str(String),
}

impl FieldValue {
    /// Numeric view of the value, `None` for strings
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Str(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One emitted measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Measurement name (`uwsgi_overview`, `uwsgi_workers`, `uwsgi_apps`)
    pub measurement: String,
    /// Field map
    pub fields: Fields,
    /// Tag map
    pub tags: Tags,
}

impl Metric {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Look up a tag by name
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Receiver of emitted records
pub trait MetricSink {
    /// Accept one record
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags);
}

impl MetricSink for Vec<Metric> {
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        self.push(Metric {
            measurement: measurement.to_string(),
            fields,
            tags,
        });
    }
}

impl<S: MetricSink + ?Sized> MetricSink for &mut S {
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        (**self).add_fields(measurement, fields, tags);
    }
}
