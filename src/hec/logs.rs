use serde_json::Value as JsonValue;

use super::event::{Event, Payload};
use super::Translator;
use crate::model::{LogRecord, Resource};

pub const SEVERITY_TEXT_FIELD: &str = "otel.log.severity.text";
pub const SEVERITY_NUMBER_FIELD: &str = "otel.log.severity.number";
pub const TRACE_ID_FIELD: &str = "trace_id";
pub const SPAN_ID_FIELD: &str = "span_id";

impl Translator {
    /// Resource attributes are applied first, then record attributes, so a
    /// record-level `com.splunk.index` overrides the resource's.
    pub fn translate_log(&self, resource: &Resource, record: &LogRecord) -> Event {
        let mut extracted = self
            .extractor()
            .extract_layered([&resource.attributes, &record.attributes]);

        let fields = &mut extracted.fields;
        if !record.severity_text.is_empty() {
            fields.insert(
                SEVERITY_TEXT_FIELD.to_string(),
                JsonValue::String(record.severity_text.clone()),
            );
        }
        if record.severity_number != 0 {
            fields.insert(
                SEVERITY_NUMBER_FIELD.to_string(),
                JsonValue::from(record.severity_number),
            );
        }
        if !record.trace_id.is_empty() {
            fields.insert(
                TRACE_ID_FIELD.to_string(),
                JsonValue::String(record.trace_id.to_hex_or_empty()),
            );
        }
        if !record.span_id.is_empty() {
            fields.insert(
                SPAN_ID_FIELD.to_string(),
                JsonValue::String(record.span_id.to_hex_or_empty()),
            );
        }

        Event::new(record.timestamp, extracted, Payload::Body(record.body.to_json()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hec::fields::{HEC_TOKEN_KEY, HOST_NAME_KEY, INDEX_KEY, SOURCETYPE_KEY, SOURCE_KEY};
    use crate::model::{AttributeValue, Attributes, SpanId, Timestamp, TraceId};
    use serde_json::json;

    fn record(body: AttributeValue, attributes: Attributes) -> LogRecord {
        LogRecord {
            body,
            attributes,
            ..LogRecord::default()
        }
    }

    #[test]
    fn plain_log_record() {
        let record = LogRecord {
            timestamp: Timestamp(1_700_000_000_123_456_789),
            ..record("hello".into(), [("env", "prod")].into_iter().collect())
        };

        let event = Translator::default().translate_log(&Resource::default(), &record);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "time": 1_700_000_000.123,
                "host": "unknown",
                "event": "hello",
                "fields": {"env": "prod"}
            })
        );
    }

    #[test]
    fn record_attributes_override_resource() {
        let resource = Resource::new(
            [
                (HOST_NAME_KEY, "resource-host"),
                (INDEX_KEY, "resource-index"),
                (SOURCE_KEY, "otel"),
                ("team", "infra"),
            ]
            .into_iter()
            .collect(),
        );
        let record = record(
            "test log".into(),
            [
                (INDEX_KEY, "record-index"),
                (SOURCETYPE_KEY, "st-otel"),
                ("custom", "custom"),
            ]
            .into_iter()
            .collect(),
        );

        let event = Translator::default().translate_log(&resource, &record);
        assert_eq!(event.host, "resource-host");
        assert_eq!(event.index, "record-index");
        assert_eq!(event.source, "otel");
        assert_eq!(event.sourcetype, "st-otel");
        assert_eq!(event.fields["team"], "infra");
        assert_eq!(event.fields["custom"], "custom");
        assert_eq!(event.time, 0.0);
    }

    #[test]
    fn body_keeps_native_structure() {
        let body: Attributes = [
            ("msg", AttributeValue::from("ok")),
            ("code", AttributeValue::Int(200)),
        ]
        .into_iter()
        .collect();
        let event = Translator::default()
            .translate_log(&Resource::default(), &record(AttributeValue::Map(body), Attributes::new()));
        assert_eq!(
            serde_json::to_value(&event.event).unwrap(),
            json!({"msg": "ok", "code": 200})
        );

        let empty = Translator::default()
            .translate_log(&Resource::default(), &record(AttributeValue::Empty, Attributes::new()));
        assert_eq!(serde_json::to_value(&empty.event).unwrap(), JsonValue::Null);
    }

    #[test]
    fn token_is_never_emitted() {
        let resource = Resource::new([(HEC_TOKEN_KEY, "resource-secret")].into_iter().collect());
        let record = record(
            "x".into(),
            [(HEC_TOKEN_KEY, "record-secret")].into_iter().collect(),
        );
        let event = Translator::default().translate_log(&resource, &record);
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains("secret"));
        assert!(!line.contains(HEC_TOKEN_KEY));
    }

    #[test]
    fn severity_and_correlation_fields() {
        let record = LogRecord {
            severity_text: "WARN".to_string(),
            severity_number: 13,
            trace_id: TraceId([0xab; 16]),
            span_id: SpanId([0xcd; 8]),
            ..record("careful".into(), Attributes::new())
        };
        let event = Translator::default().translate_log(&Resource::default(), &record);
        assert_eq!(event.fields[SEVERITY_TEXT_FIELD], "WARN");
        assert_eq!(event.fields[SEVERITY_NUMBER_FIELD], 13);
        assert_eq!(event.fields[TRACE_ID_FIELD], "ab".repeat(16));
        assert_eq!(event.fields[SPAN_ID_FIELD], "cd".repeat(8));
    }
}
