//! Types for the record module.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RecordError;

/// Attribute mapping keyed by attribute name.
///
/// Keys are unique and iterate in sorted order, which keeps debug output and
/// fingerprint encoding stable regardless of insertion order.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute (or body) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<AttributeValue>),
    Map(Attributes),
}

impl AttributeValue {
    /// Returns the string content if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Checks that the value can be represented downstream.
    ///
    /// `location` names where the value lives (e.g. `resource.host`) and is
    /// carried into the error.
    fn check(&self, location: &str) -> Result<(), RecordError> {
        match self {
            Self::Double(d) if !d.is_finite() => Err(RecordError::NonFiniteFloat {
                location: location.to_string(),
            }),
            Self::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    item.check(&format!("{}[{}]", location, idx))?;
                }
                Ok(())
            }
            Self::Map(map) => check_attributes(map, location),
            _ => Ok(()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

fn check_attributes(attributes: &Attributes, location: &str) -> Result<(), RecordError> {
    for (key, value) in attributes {
        if key.is_empty() {
            return Err(RecordError::EmptyKey {
                location: location.to_string(),
            });
        }
        value.check(&format!("{}.{}", location, key))?;
    }
    Ok(())
}

/// Log severity, numbered like the OpenTelemetry log data model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Unspecified,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// OpenTelemetry severity number (the first number of each range).
    pub fn number(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }

    /// Upper-case short name, as used for severity text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

/// Trace correlation carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub flags: u8,
}

/// One parsed log event.
///
/// Built once by the upstream parser through the `with_*` methods and never
/// mutated after it is handed to the emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    timestamp: DateTime<Utc>,
    observed_timestamp: DateTime<Utc>,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity_text: Option<String>,
    body: AttributeValue,
    attributes: Attributes,
    resource: Attributes,
    scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<TraceContext>,
}

impl Record {
    /// Creates a record with the given body, timestamped now.
    pub fn new(body: impl Into<AttributeValue>) -> Self {
        let now = Utc::now();
        Self {
            timestamp: now,
            observed_timestamp: now,
            severity: Severity::Unspecified,
            severity_text: None,
            body: body.into(),
            attributes: Attributes::new(),
            resource: Attributes::new(),
            scope: String::new(),
            trace: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_severity_text(mut self, text: impl Into<String>) -> Self {
        self.severity_text = Some(text.into());
        self
    }

    /// Adds (or replaces) a record-level attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds (or replaces) a resource-level attribute.
    pub fn with_resource(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.resource.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole resource mapping.
    pub fn with_resource_attributes(mut self, resource: Attributes) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn observed_timestamp(&self) -> DateTime<Utc> {
        self.observed_timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Severity text, falling back to the severity's short name.
    pub fn severity_text(&self) -> &str {
        self.severity_text
            .as_deref()
            .unwrap_or_else(|| self.severity.as_str())
    }

    pub fn body(&self) -> &AttributeValue {
        &self.body
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn resource(&self) -> &Attributes {
        &self.resource
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Checks that every key is non-empty and every float is finite.
    pub fn validate(&self) -> Result<(), RecordError> {
        check_attributes(&self.resource, "resource")?;
        check_attributes(&self.attributes, "attributes")?;
        self.body.check("body")
    }
}
