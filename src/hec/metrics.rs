use serde_json::{Number, Value as JsonValue};
use tracing::debug;

use super::event::{Event, Payload};
use super::fields::ExtractedFields;
use super::Translator;
use crate::model::{
    format_double, Attributes, HistogramDataPoint, Metric, MetricData, NumberDataPoint,
    NumberValue, Resource, SummaryDataPoint, Timestamp,
};

pub const METRIC_TYPE_FIELD: &str = "metric_type";
pub const METRIC_NAME_PREFIX: &str = "metric_name:";
pub const BUCKET_BOUND_FIELD: &str = "le";
pub const QUANTILE_FIELD: &str = "qt";
const INFINITY_BOUND: &str = "+Inf";

impl Translator {
    /// One event per numeric value carried by the metric. Histograms and
    /// summaries fan out into `_sum`, `_count` and bucket/quantile events.
    pub fn translate_metric(&self, resource: &Resource, metric: &Metric) -> Vec<Event> {
        let mut events = Vec::new();
        match &metric.data {
            MetricData::Gauge(points) => {
                for point in points {
                    self.push_number(&mut events, resource, &metric.name, "Gauge", point);
                }
            }
            MetricData::Sum(points) => {
                for point in points {
                    self.push_number(&mut events, resource, &metric.name, "Sum", point);
                }
            }
            MetricData::Histogram(points) => {
                for point in points {
                    self.push_histogram(&mut events, resource, &metric.name, point);
                }
            }
            MetricData::Summary(points) => {
                for point in points {
                    self.push_summary(&mut events, resource, &metric.name, point);
                }
            }
            MetricData::ExponentialHistogram(count) => {
                debug!(metric = %metric.name, points = count, "skipping exponential histogram");
            }
            MetricData::Empty => {
                debug!(metric = %metric.name, "metric has no data");
            }
        }
        events
    }

    fn base_fields(
        &self,
        resource: &Resource,
        attributes: &Attributes,
        metric_type: &str,
    ) -> ExtractedFields {
        let mut extracted = self
            .extractor()
            .extract_layered([&resource.attributes, attributes]);
        extracted.fields.insert(
            METRIC_TYPE_FIELD.to_string(),
            JsonValue::String(metric_type.to_string()),
        );
        extracted
    }

    fn push_number(
        &self,
        events: &mut Vec<Event>,
        resource: &Resource,
        name: &str,
        metric_type: &str,
        point: &NumberDataPoint,
    ) {
        let value = match point.value {
            Some(NumberValue::Int(i)) => JsonValue::from(i),
            Some(NumberValue::Double(d)) => match finite(d) {
                Some(v) => v,
                None => {
                    debug!(metric = name, value = d, "skipping non-finite data point");
                    return;
                }
            },
            None => {
                debug!(metric = name, "skipping data point without value");
                return;
            }
        };
        let base = self.base_fields(resource, &point.attributes, metric_type);
        events.push(metric_event(point.timestamp, base, name, value));
    }

    fn push_histogram(
        &self,
        events: &mut Vec<Event>,
        resource: &Resource,
        name: &str,
        point: &HistogramDataPoint,
    ) {
        let base = self.base_fields(resource, &point.attributes, "Histogram");

        if let Some(sum) = point.sum.and_then(finite) {
            events.push(metric_event(
                point.timestamp,
                base.clone(),
                &format!("{name}_sum"),
                sum,
            ));
        }
        events.push(metric_event(
            point.timestamp,
            base.clone(),
            &format!("{name}_count"),
            JsonValue::from(point.count),
        ));

        if point.bucket_counts.is_empty()
            || point.explicit_bounds.len() + 1 != point.bucket_counts.len()
        {
            debug!(
                metric = name,
                bounds = point.explicit_bounds.len(),
                buckets = point.bucket_counts.len(),
                "skipping histogram buckets"
            );
            return;
        }

        let bucket_name = format!("{name}_bucket");
        let mut cumulative = 0u64;
        for (bound, count) in point.explicit_bounds.iter().zip(&point.bucket_counts) {
            cumulative = cumulative.saturating_add(*count);
            let mut extracted = base.clone();
            extracted.fields.insert(
                BUCKET_BOUND_FIELD.to_string(),
                JsonValue::String(format_double(*bound)),
            );
            events.push(metric_event(
                point.timestamp,
                extracted,
                &bucket_name,
                JsonValue::from(cumulative),
            ));
        }

        let last = point.bucket_counts.last().copied().unwrap_or_default();
        let mut extracted = base;
        extracted.fields.insert(
            BUCKET_BOUND_FIELD.to_string(),
            JsonValue::String(INFINITY_BOUND.to_string()),
        );
        events.push(metric_event(
            point.timestamp,
            extracted,
            &bucket_name,
            JsonValue::from(cumulative.saturating_add(last)),
        ));
    }

    fn push_summary(
        &self,
        events: &mut Vec<Event>,
        resource: &Resource,
        name: &str,
        point: &SummaryDataPoint,
    ) {
        let base = self.base_fields(resource, &point.attributes, "Summary");

        if let Some(sum) = finite(point.sum) {
            events.push(metric_event(
                point.timestamp,
                base.clone(),
                &format!("{name}_sum"),
                sum,
            ));
        }
        events.push(metric_event(
            point.timestamp,
            base.clone(),
            &format!("{name}_count"),
            JsonValue::from(point.count),
        ));

        for quantile in &point.quantiles {
            let Some(value) = finite(quantile.value) else {
                continue;
            };
            let mut extracted = base.clone();
            extracted.fields.insert(
                QUANTILE_FIELD.to_string(),
                JsonValue::String(format_double(quantile.quantile)),
            );
            events.push(metric_event(point.timestamp, extracted, name, value));
        }
    }
}

fn finite(value: f64) -> Option<JsonValue> {
    Number::from_f64(value).map(JsonValue::Number)
}

fn metric_event(
    timestamp: Timestamp,
    mut extracted: ExtractedFields,
    name: &str,
    value: JsonValue,
) -> Event {
    extracted
        .fields
        .insert(format!("{METRIC_NAME_PREFIX}{name}"), value);
    Event::new(timestamp, extracted, Payload::Metric)
}
