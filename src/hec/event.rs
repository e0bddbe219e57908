use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use super::fields::ExtractedFields;
use super::traces::HecSpan;
use crate::model::Timestamp;

/// Marker written as the payload of every metric event.
pub const METRIC_EVENT: &str = "metric";

/// Per-kind event payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Log body, kept in its native structure.
    Body(JsonValue),
    Span(Box<HecSpan>),
    Metric,
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Body(value) => value.serialize(serializer),
            Payload::Span(span) => span.serialize(serializer),
            Payload::Metric => serializer.serialize_str(METRIC_EVENT),
        }
    }
}

/// One HEC event, the unit written to the output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub time: f64,
    pub host: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sourcetype: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index: String,
    pub event: Payload,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, JsonValue>,
}

impl Event {
    /// Builds an event from extracted reserved fields. The access token is
    /// dropped here and never reaches the output.
    pub fn new(timestamp: Timestamp, extracted: ExtractedFields, event: Payload) -> Self {
        Self {
            time: timestamp.as_seconds_millis(),
            host: extracted.host,
            source: extracted.source,
            sourcetype: extracted.sourcetype,
            index: extracted.index,
            event,
            fields: extracted.fields,
        }
    }

    pub fn is_metric(&self) -> bool {
        matches!(self.event, Payload::Metric)
    }
}
