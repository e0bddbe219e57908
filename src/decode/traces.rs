// src/decode/traces.rs
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::{
    span::{Event as ProtoEvent, Link as ProtoLink},
    ResourceSpans as ProtoResourceSpans, ScopeSpans, Span as ProtoSpan, Status as ProtoStatus,
};
use prost::Message;
use serde::Deserialize;

use super::common::{
    attributes, hex_id, json_attributes, json_u64, resource, JsonInt, JsonKeyValue, JsonResource,
};
use super::{DecodeError, DecodeFormat};
use crate::model::{
    ResourceSpans, Span, SpanEvent, SpanId, SpanKind, SpanLink, Status, StatusCode, Timestamp,
    TraceId, TracesBatch,
};

/// Decode an OTLP traces export body.
pub fn decode_traces(body: &[u8], format: DecodeFormat) -> Result<TracesBatch, DecodeError> {
    let request = match format {
        DecodeFormat::Protobuf => ExportTraceServiceRequest::decode(body)?,
        DecodeFormat::Json => serde_json::from_slice::<JsonExportTraceServiceRequest>(body)?
            .into_proto()?,
    };
    Ok(traces_from_proto(&request))
}

pub fn traces_from_proto(request: &ExportTraceServiceRequest) -> TracesBatch {
    let resource_spans = request
        .resource_spans
        .iter()
        .map(|rs| ResourceSpans {
            resource: resource(rs.resource.as_ref()),
            spans: rs
                .scope_spans
                .iter()
                .flat_map(|ss| ss.spans.iter())
                .map(span)
                .collect(),
        })
        .collect();

    TracesBatch {
        resource_spans,
        ..TracesBatch::default()
    }
}

fn span(span: &ProtoSpan) -> Span {
    Span {
        trace_id: TraceId::from_slice(&span.trace_id),
        span_id: SpanId::from_slice(&span.span_id),
        parent_span_id: SpanId::from_slice(&span.parent_span_id),
        trace_state: span.trace_state.clone(),
        name: span.name.clone(),
        kind: SpanKind::from_i32(span.kind),
        start_timestamp: Timestamp(span.start_time_unix_nano),
        end_timestamp: Timestamp(span.end_time_unix_nano),
        attributes: attributes(&span.attributes),
        events: span
            .events
            .iter()
            .map(|e| SpanEvent {
                name: e.name.clone(),
                timestamp: Timestamp(e.time_unix_nano),
                attributes: attributes(&e.attributes),
            })
            .collect(),
        links: span
            .links
            .iter()
            .map(|l| SpanLink {
                trace_id: TraceId::from_slice(&l.trace_id),
                span_id: SpanId::from_slice(&l.span_id),
                trace_state: l.trace_state.clone(),
                attributes: attributes(&l.attributes),
            })
            .collect(),
        status: span
            .status
            .as_ref()
            .map(|s| Status {
                message: s.message.clone(),
                code: StatusCode::from_i32(s.code),
            })
            .unwrap_or_default(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonExportTraceServiceRequest {
    #[serde(default)]
    resource_spans: Vec<JsonResourceSpans>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonResourceSpans {
    #[serde(default)]
    resource: JsonResource,
    #[serde(default)]
    scope_spans: Vec<JsonScopeSpans>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonScopeSpans {
    #[serde(default)]
    spans: Vec<JsonSpan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSpan {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    trace_state: String,
    #[serde(default)]
    parent_span_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: i32,
    #[serde(default)]
    start_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    end_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
    #[serde(default)]
    events: Vec<JsonSpanEvent>,
    #[serde(default)]
    links: Vec<JsonSpanLink>,
    #[serde(default)]
    status: Option<JsonStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSpanEvent {
    #[serde(default)]
    time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSpanLink {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    trace_state: String,
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
}

#[derive(Debug, Deserialize)]
struct JsonStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i32,
}

impl JsonExportTraceServiceRequest {
    fn into_proto(self) -> Result<ExportTraceServiceRequest, DecodeError> {
        let resource_spans = self
            .resource_spans
            .into_iter()
            .map(|rs| {
                let scope_spans = rs
                    .scope_spans
                    .into_iter()
                    .map(|ss| {
                        let spans = ss
                            .spans
                            .into_iter()
                            .map(JsonSpan::into_proto)
                            .collect::<Result<_, _>>()?;
                        Ok(ScopeSpans {
                            spans,
                            ..Default::default()
                        })
                    })
                    .collect::<Result<_, DecodeError>>()?;
                Ok(ProtoResourceSpans {
                    resource: Some(rs.resource.into_proto()?),
                    scope_spans,
                    ..Default::default()
                })
            })
            .collect::<Result<_, DecodeError>>()?;
        Ok(ExportTraceServiceRequest { resource_spans })
    }
}

impl JsonSpan {
    fn into_proto(self) -> Result<ProtoSpan, DecodeError> {
        let events = self
            .events
            .into_iter()
            .map(|e| {
                Ok(ProtoEvent {
                    time_unix_nano: json_u64(&e.time_unix_nano, "event.timeUnixNano")?,
                    name: e.name,
                    attributes: json_attributes(e.attributes)?,
                    ..Default::default()
                })
            })
            .collect::<Result<_, DecodeError>>()?;
        let links = self
            .links
            .into_iter()
            .map(|l| {
                Ok(ProtoLink {
                    trace_id: hex_id(&l.trace_id, "link.traceId")?,
                    span_id: hex_id(&l.span_id, "link.spanId")?,
                    trace_state: l.trace_state,
                    attributes: json_attributes(l.attributes)?,
                    ..Default::default()
                })
            })
            .collect::<Result<_, DecodeError>>()?;

        Ok(ProtoSpan {
            trace_id: hex_id(&self.trace_id, "traceId")?,
            span_id: hex_id(&self.span_id, "spanId")?,
            trace_state: self.trace_state,
            parent_span_id: hex_id(&self.parent_span_id, "parentSpanId")?,
            name: self.name,
            kind: self.kind,
            start_time_unix_nano: json_u64(&self.start_time_unix_nano, "startTimeUnixNano")?,
            end_time_unix_nano: json_u64(&self.end_time_unix_nano, "endTimeUnixNano")?,
            attributes: json_attributes(self.attributes)?,
            events,
            links,
            status: self.status.map(|s| ProtoStatus {
                message: s.message,
                code: s.code,
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;

    const SPAN_JSON: &str = r#"{
        "resourceSpans": [{
            "resource": {"attributes": [{"key": "host.name", "value": {"stringValue": "myhost"}}]},
            "scopeSpans": [{
                "scope": {"name": "lib"},
                "spans": [{
                    "traceId": "5b8efff798038103d269b633813fc60c",
                    "spanId": "eee19b7ec3c1b174",
                    "parentSpanId": "eee19b7ec3c1b173",
                    "name": "GET /users",
                    "kind": 2,
                    "startTimeUnixNano": "1544712660000000000",
                    "endTimeUnixNano": "1544712661000000000",
                    "attributes": [{"key": "http.method", "value": {"stringValue": "GET"}}],
                    "events": [{"timeUnixNano": "1544712660500000000", "name": "cache-miss"}],
                    "links": [{"traceId": "5b8efff798038103d269b633813fc60c", "spanId": "eee19b7ec3c1b172", "traceState": "k=v"}],
                    "status": {"code": 2, "message": "boom"}
                }]
            }]
        }]
    }"#;

    #[test]
    fn decodes_json_spans() {
        let batch = decode_traces(SPAN_JSON.as_bytes(), DecodeFormat::Json).unwrap();
        assert_eq!(batch.span_count(), 1);

        let rs = &batch.resource_spans[0];
        assert_eq!(
            rs.resource.attributes.get("host.name"),
            Some(&AttributeValue::from("myhost"))
        );
        let span = &rs.spans[0];
        assert_eq!(span.name, "GET /users");
        assert_eq!(span.kind, SpanKind::Server);
        assert_eq!(span.trace_id.to_hex_or_empty(), "5b8efff798038103d269b633813fc60c");
        assert_eq!(span.parent_span_id.to_hex_or_empty(), "eee19b7ec3c1b173");
        assert_eq!(span.start_timestamp, Timestamp(1_544_712_660_000_000_000));
        assert_eq!(span.events[0].name, "cache-miss");
        assert_eq!(span.links[0].trace_state, "k=v");
        assert_eq!(span.status.code, StatusCode::Error);
        assert_eq!(span.status.message, "boom");
    }

    #[test]
    fn protobuf_round_trips_through_the_wire() {
        let json: JsonExportTraceServiceRequest = serde_json::from_str(SPAN_JSON).unwrap();
        let body = json.into_proto().unwrap().encode_to_vec();

        let from_proto = decode_traces(&body, DecodeFormat::Protobuf).unwrap();
        let from_json = decode_traces(SPAN_JSON.as_bytes(), DecodeFormat::Json).unwrap();
        assert_eq!(from_proto, from_json);
    }

    #[test]
    fn missing_status_is_unset() {
        let body = r#"{"resourceSpans":[{"scopeSpans":[{"spans":[{"name":"s"}]}]}]}"#;
        let batch = decode_traces(body.as_bytes(), DecodeFormat::Json).unwrap();
        let span = &batch.resource_spans[0].spans[0];
        assert_eq!(span.status, Status::default());
        assert!(span.trace_id.is_empty());
        assert!(batch.resource_spans[0].resource.attributes.is_empty());
    }
}
