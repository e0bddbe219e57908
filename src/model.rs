//! Telemetry model shared by the OTLP decoders and the HEC translator.
//!
//! Batches are produced by the receiver, handed to exporters by reference and
//! dropped once the batch has been written. Nothing here is retained across
//! batches.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A single attribute or body value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttributeValue {
    #[default]
    Empty,
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<AttributeValue>),
    Map(Attributes),
}

impl AttributeValue {
    /// Canonical textual form used for HEC `fields` and template output.
    pub fn as_display_string(&self) -> String {
        match self {
            AttributeValue::Empty => String::new(),
            AttributeValue::Str(s) => s.clone(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Double(f) => format_double(*f),
            AttributeValue::Bytes(b) => BASE64.encode(b),
            AttributeValue::Array(_) | AttributeValue::Map(_) => self.to_json().to_string(),
        }
    }

    /// Raw JSON form, preserving structure.
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Empty => JsonValue::Null,
            AttributeValue::Str(s) => JsonValue::String(s.clone()),
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Int(i) => JsonValue::Number((*i).into()),
            AttributeValue::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            AttributeValue::Bytes(b) => JsonValue::String(BASE64.encode(b)),
            AttributeValue::Array(items) => {
                JsonValue::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Map(map) => map.to_json(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Double(f)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

pub(crate) fn format_double(f: f64) -> String {
    if f.is_infinite() {
        if f.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        // Display for f64 is the shortest round-trip form without an exponent
        f.to_string()
    }
}

/// Attribute set with unique keys in first-insertion order. Inserting an
/// existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
    index: HashMap<String, usize>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_json_map())
    }

    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// Epoch timestamp in nanoseconds. Zero means "not set".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Seconds since the epoch, floored to millisecond precision.
    pub fn as_seconds_millis(self) -> f64 {
        (self.0 / 1_000_000) as f64 / 1_000.0
    }

    pub fn as_epoch_seconds(self) -> i64 {
        (self.0 / 1_000_000_000) as i64
    }

    /// RFC 3339 in UTC with second precision, e.g. `2024-01-01T00:00:00Z`.
    pub fn to_rfc3339(self) -> String {
        let secs = self.as_epoch_seconds();
        let nanos = (self.0 % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nanos)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceId(pub [u8; 16]);

impl TraceId {
    /// Ids of the wrong length are treated as unset.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut id = [0u8; 16];
        if bytes.len() == id.len() {
            id.copy_from_slice(bytes);
        }
        TraceId(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex_or_empty(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            hex::encode(self.0)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut id = [0u8; 8];
        if bytes.len() == id.len() {
            id.copy_from_slice(bytes);
        }
        SpanId(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex_or_empty(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            hex::encode(self.0)
        }
    }
}

/// The entity that emitted a group of records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub attributes: Attributes,
}

impl Resource {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub observed_timestamp: Timestamp,
    pub severity_text: String,
    pub severity_number: i32,
    pub body: AttributeValue,
    pub attributes: Attributes,
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn from_i32(kind: i32) -> Self {
        match kind {
            1 => SpanKind::Internal,
            2 => SpanKind::Server,
            3 => SpanKind::Client,
            4 => SpanKind::Producer,
            5 => SpanKind::Consumer,
            _ => SpanKind::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Unspecified => "SPAN_KIND_UNSPECIFIED",
            SpanKind::Internal => "SPAN_KIND_INTERNAL",
            SpanKind::Server => "SPAN_KIND_SERVER",
            SpanKind::Client => "SPAN_KIND_CLIENT",
            SpanKind::Producer => "SPAN_KIND_PRODUCER",
            SpanKind::Consumer => "SPAN_KIND_CONSUMER",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    pub fn from_i32(code: i32) -> Self {
        match code {
            1 => StatusCode::Ok,
            2 => StatusCode::Error,
            _ => StatusCode::Unset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Unset => "STATUS_CODE_UNSET",
            StatusCode::Ok => "STATUS_CODE_OK",
            StatusCode::Error => "STATUS_CODE_ERROR",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
    pub message: String,
    pub code: StatusCode,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: Timestamp,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanLink {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_state: String,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: SpanId,
    pub trace_state: String,
    pub name: String,
    pub kind: SpanKind,
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
    pub status: Status,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberDataPoint {
    pub attributes: Attributes,
    pub timestamp: Timestamp,
    pub value: Option<NumberValue>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistogramDataPoint {
    pub attributes: Attributes,
    pub timestamp: Timestamp,
    pub count: u64,
    pub sum: Option<f64>,
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ValueAtQuantile {
    pub quantile: f64,
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryDataPoint {
    pub attributes: Attributes,
    pub timestamp: Timestamp,
    pub count: u64,
    pub sum: f64,
    pub quantiles: Vec<ValueAtQuantile>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum MetricData {
    #[default]
    Empty,
    Gauge(Vec<NumberDataPoint>),
    Sum(Vec<NumberDataPoint>),
    Histogram(Vec<HistogramDataPoint>),
    /// Exponential histograms have no HEC representation; only the point count is kept.
    ExponentialHistogram(usize),
    Summary(Vec<SummaryDataPoint>),
}

impl MetricData {
    pub fn data_point_count(&self) -> usize {
        match self {
            MetricData::Empty => 0,
            MetricData::Gauge(points) | MetricData::Sum(points) => points.len(),
            MetricData::Histogram(points) => points.len(),
            MetricData::ExponentialHistogram(count) => *count,
            MetricData::Summary(points) => points.len(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data: MetricData,
}

/// Headers of the request that delivered a batch, keyed by lower-cased name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientMetadata(HashMap<String, Vec<String>>);

impl ClientMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value recorded for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceLogs {
    pub resource: Resource,
    pub records: Vec<LogRecord>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogsBatch {
    pub resource_logs: Vec<ResourceLogs>,
    pub metadata: ClientMetadata,
}

impl LogsBatch {
    pub fn record_count(&self) -> usize {
        self.resource_logs.iter().map(|rl| rl.records.len()).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSpans {
    pub resource: Resource,
    pub spans: Vec<Span>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TracesBatch {
    pub resource_spans: Vec<ResourceSpans>,
    pub metadata: ClientMetadata,
}

impl TracesBatch {
    pub fn span_count(&self) -> usize {
        self.resource_spans.iter().map(|rs| rs.spans.len()).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub metrics: Vec<Metric>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsBatch {
    pub resource_metrics: Vec<ResourceMetrics>,
    pub metadata: ClientMetadata,
}

impl MetricsBatch {
    pub fn data_point_count(&self) -> usize {
        self.resource_metrics
            .iter()
            .flat_map(|rm| rm.metrics.iter())
            .map(|m| m.data.data_point_count())
            .sum()
    }
}
