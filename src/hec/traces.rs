use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::event::{Event, Payload};
use super::Translator;
use crate::model::{Resource, Span, SpanEvent, SpanLink};

/// Span event as exported inside a HEC span payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HecSpanEvent {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
    pub name: String,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HecLink {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
    pub trace_id: String,
    pub span_id: String,
    pub trace_state: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HecSpanStatus {
    pub message: String,
    pub code: &'static str,
}

/// A span re-expressed as a HEC event payload. Timestamps are epoch nanoseconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HecSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
    pub end_time: u64,
    pub kind: &'static str,
    pub status: HecSpanStatus,
    pub start_time: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<HecSpanEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<HecLink>,
}

impl From<&SpanEvent> for HecSpanEvent {
    fn from(event: &SpanEvent) -> Self {
        Self {
            attributes: event.attributes.to_json_map(),
            name: event.name.clone(),
            timestamp: event.timestamp.0,
        }
    }
}

impl From<&SpanLink> for HecLink {
    fn from(link: &SpanLink) -> Self {
        Self {
            attributes: link.attributes.to_json_map(),
            trace_id: link.trace_id.to_hex_or_empty(),
            span_id: link.span_id.to_hex_or_empty(),
            trace_state: link.trace_state.clone(),
        }
    }
}

impl From<&Span> for HecSpan {
    fn from(span: &Span) -> Self {
        Self {
            trace_id: span.trace_id.to_hex_or_empty(),
            span_id: span.span_id.to_hex_or_empty(),
            parent_span_id: span.parent_span_id.to_hex_or_empty(),
            name: span.name.clone(),
            attributes: span.attributes.to_json_map(),
            end_time: span.end_timestamp.0,
            kind: span.kind.as_str(),
            status: HecSpanStatus {
                message: span.status.message.clone(),
                code: span.status.code.as_str(),
            },
            start_time: span.start_timestamp.0,
            events: span.events.iter().map(HecSpanEvent::from).collect(),
            links: span.links.iter().map(HecLink::from).collect(),
        }
    }
}

impl Translator {
    /// One event per span. Span attributes stay inside the payload; only the
    /// resource contributes structural fields and `fields`.
    pub fn translate_span(&self, resource: &Resource, span: &Span) -> Event {
        let extracted = self.extractor().extract(&resource.attributes);
        Event::new(
            span.start_timestamp,
            extracted,
            Payload::Span(Box::new(HecSpan::from(span))),
        )
    }
}
