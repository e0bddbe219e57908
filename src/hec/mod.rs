// src/hec/mod.rs
//! Translation of OTLP records into Splunk HEC events.
//!
//! Every translation is pure: the same resource and record always produce the
//! same event(s), and nothing fails. Attributes named by [`ReservedKeys`]
//! become the structural `host`/`source`/`sourcetype`/`index` fields; the HEC
//! access token is read but never emitted.

mod event;
mod fields;
mod logs;
mod metrics;
mod traces;

pub use event::{Event, Payload, METRIC_EVENT};
pub use fields::{
    ExtractedFields, ReservedFieldExtractor, ReservedKeys, HEC_TOKEN_KEY, HOST_NAME_KEY,
    INDEX_KEY, SOURCETYPE_KEY, SOURCE_KEY, UNKNOWN_HOST,
};
pub use logs::{SEVERITY_NUMBER_FIELD, SEVERITY_TEXT_FIELD, SPAN_ID_FIELD, TRACE_ID_FIELD};
pub use metrics::{BUCKET_BOUND_FIELD, METRIC_NAME_PREFIX, METRIC_TYPE_FIELD, QUANTILE_FIELD};
pub use traces::{HecLink, HecSpan, HecSpanEvent, HecSpanStatus};

use crate::model::{LogsBatch, MetricsBatch, TracesBatch};

#[derive(Clone, Debug, Default)]
pub struct Translator {
    extractor: ReservedFieldExtractor,
}

impl Translator {
    pub fn new(keys: ReservedKeys) -> Self {
        Self {
            extractor: ReservedFieldExtractor::new(keys),
        }
    }

    pub fn extractor(&self) -> &ReservedFieldExtractor {
        &self.extractor
    }

    /// One event per log record, in batch order.
    pub fn logs_events(&self, batch: &LogsBatch) -> Vec<Event> {
        batch
            .resource_logs
            .iter()
            .flat_map(|rl| {
                rl.records
                    .iter()
                    .map(move |record| self.translate_log(&rl.resource, record))
            })
            .collect()
    }

    /// One event per span, in batch order.
    pub fn traces_events(&self, batch: &TracesBatch) -> Vec<Event> {
        batch
            .resource_spans
            .iter()
            .flat_map(|rs| {
                rs.spans
                    .iter()
                    .map(move |span| self.translate_span(&rs.resource, span))
            })
            .collect()
    }

    /// Every event produced by every metric, in batch order.
    pub fn metrics_events(&self, batch: &MetricsBatch) -> Vec<Event> {
        batch
            .resource_metrics
            .iter()
            .flat_map(|rm| {
                rm.metrics
                    .iter()
                    .flat_map(move |metric| self.translate_metric(&rm.resource, metric))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Metric, MetricData, NumberDataPoint, NumberValue, Resource, ResourceMetrics,
        ResourceSpans, Span, Timestamp,
    };

    #[test]
    fn batch_translation_preserves_order() {
        let resource = Resource::new([("host.name", "h")].into_iter().collect());
        let batch = TracesBatch {
            resource_spans: vec![ResourceSpans {
                resource: resource.clone(),
                spans: ["first", "second"]
                    .iter()
                    .map(|name| Span {
                        name: name.to_string(),
                        ..Span::default()
                    })
                    .collect(),
            }],
            ..TracesBatch::default()
        };

        let events = Translator::default().traces_events(&batch);
        let names: Vec<_> = events
            .iter()
            .map(|e| match &e.event {
                Payload::Span(span) => span.name.clone(),
                other => panic!("unexpected payload {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn metrics_batch_flattens_points() {
        let point = |v: i64| NumberDataPoint {
            timestamp: Timestamp(1_000_000_000),
            value: Some(NumberValue::Int(v)),
            ..NumberDataPoint::default()
        };
        let batch = MetricsBatch {
            resource_metrics: vec![ResourceMetrics {
                resource: Resource::default(),
                metrics: vec![Metric {
                    name: "requests".to_string(),
                    data: MetricData::Gauge(vec![point(1), point(2)]),
                    ..Metric::default()
                }],
            }],
            ..MetricsBatch::default()
        };

        let events = Translator::default().metrics_events(&batch);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Event::is_metric));
    }
}
