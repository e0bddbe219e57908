use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, summary_data_point, ExponentialHistogram,
    ExponentialHistogramDataPoint, Gauge, Histogram, HistogramDataPoint as ProtoHistogramPoint,
    Metric as ProtoMetric, NumberDataPoint as ProtoNumberPoint,
    ResourceMetrics as ProtoResourceMetrics, ScopeMetrics, Sum, Summary,
    SummaryDataPoint as ProtoSummaryPoint,
};
use prost::Message;
use serde::Deserialize;

use super::common::{
    attributes, json_attributes, json_u64, resource, JsonDouble, JsonInt, JsonKeyValue,
    JsonResource,
};
use super::{DecodeError, DecodeFormat};
use crate::model::{
    HistogramDataPoint, Metric, MetricData, MetricsBatch, NumberDataPoint, NumberValue,
    ResourceMetrics, SummaryDataPoint, Timestamp, ValueAtQuantile,
};

/// Decode an OTLP metrics export body.
pub fn decode_metrics(body: &[u8], format: DecodeFormat) -> Result<MetricsBatch, DecodeError> {
    let request = match format {
        DecodeFormat::Protobuf => ExportMetricsServiceRequest::decode(body)?,
        DecodeFormat::Json => serde_json::from_slice::<JsonExportMetricsServiceRequest>(body)?
            .into_proto()?,
    };
    Ok(metrics_from_proto(&request))
}

pub fn metrics_from_proto(request: &ExportMetricsServiceRequest) -> MetricsBatch {
    let resource_metrics = request
        .resource_metrics
        .iter()
        .map(|rm| ResourceMetrics {
            resource: resource(rm.resource.as_ref()),
            metrics: rm
                .scope_metrics
                .iter()
                .flat_map(|sm| sm.metrics.iter())
                .map(metric)
                .collect(),
        })
        .collect();

    MetricsBatch {
        resource_metrics,
        ..MetricsBatch::default()
    }
}

fn metric(metric: &ProtoMetric) -> Metric {
    let data = match &metric.data {
        None => MetricData::Empty,
        Some(Data::Gauge(g)) => MetricData::Gauge(g.data_points.iter().map(number_point).collect()),
        Some(Data::Sum(s)) => MetricData::Sum(s.data_points.iter().map(number_point).collect()),
        Some(Data::Histogram(h)) => {
            MetricData::Histogram(h.data_points.iter().map(histogram_point).collect())
        }
        Some(Data::ExponentialHistogram(e)) => {
            MetricData::ExponentialHistogram(e.data_points.len())
        }
        Some(Data::Summary(s)) => {
            MetricData::Summary(s.data_points.iter().map(summary_point).collect())
        }
    };

    Metric {
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        data,
    }
}

fn number_point(point: &ProtoNumberPoint) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attributes(&point.attributes),
        timestamp: Timestamp(point.time_unix_nano),
        value: point.value.as_ref().map(|v| match v {
            number_data_point::Value::AsInt(i) => NumberValue::Int(*i),
            number_data_point::Value::AsDouble(d) => NumberValue::Double(*d),
        }),
    }
}

fn histogram_point(point: &ProtoHistogramPoint) -> HistogramDataPoint {
    HistogramDataPoint {
        attributes: attributes(&point.attributes),
        timestamp: Timestamp(point.time_unix_nano),
        count: point.count,
        sum: point.sum,
        bucket_counts: point.bucket_counts.clone(),
        explicit_bounds: point.explicit_bounds.clone(),
    }
}

fn summary_point(point: &ProtoSummaryPoint) -> SummaryDataPoint {
    SummaryDataPoint {
        attributes: attributes(&point.attributes),
        timestamp: Timestamp(point.time_unix_nano),
        count: point.count,
        sum: point.sum,
        quantiles: point
            .quantile_values
            .iter()
            .map(|q| ValueAtQuantile {
                quantile: q.quantile,
                value: q.value,
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonExportMetricsServiceRequest {
    #[serde(default)]
    resource_metrics: Vec<JsonResourceMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonResourceMetrics {
    #[serde(default)]
    resource: JsonResource,
    #[serde(default)]
    scope_metrics: Vec<JsonScopeMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonScopeMetrics {
    #[serde(default)]
    metrics: Vec<JsonMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetric {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    gauge: Option<JsonNumberPoints>,
    #[serde(default)]
    sum: Option<JsonNumberPoints>,
    #[serde(default)]
    histogram: Option<JsonHistogram>,
    #[serde(default)]
    exponential_histogram: Option<JsonExponentialHistogram>,
    #[serde(default)]
    summary: Option<JsonSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonNumberPoints {
    #[serde(default)]
    data_points: Vec<JsonNumberDataPoint>,
    #[serde(default)]
    aggregation_temporality: i32,
    #[serde(default)]
    is_monotonic: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonNumberDataPoint {
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
    #[serde(default)]
    start_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    as_double: Option<JsonDouble>,
    #[serde(default)]
    as_int: Option<JsonInt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonHistogram {
    #[serde(default)]
    data_points: Vec<JsonHistogramDataPoint>,
    #[serde(default)]
    aggregation_temporality: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonHistogramDataPoint {
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
    #[serde(default)]
    start_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    count: Option<JsonInt>,
    #[serde(default)]
    sum: Option<JsonDouble>,
    #[serde(default)]
    bucket_counts: Vec<JsonInt>,
    #[serde(default)]
    explicit_bounds: Vec<JsonDouble>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonExponentialHistogram {
    // Only the number of points is kept.
    #[serde(default)]
    data_points: Vec<serde_json::Value>,
    #[serde(default)]
    aggregation_temporality: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    #[serde(default)]
    data_points: Vec<JsonSummaryDataPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummaryDataPoint {
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
    #[serde(default)]
    start_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    count: Option<JsonInt>,
    #[serde(default)]
    sum: Option<JsonDouble>,
    #[serde(default)]
    quantile_values: Vec<JsonValueAtQuantile>,
}

#[derive(Debug, Deserialize)]
struct JsonValueAtQuantile {
    #[serde(default)]
    quantile: Option<JsonDouble>,
    #[serde(default)]
    value: Option<JsonDouble>,
}

fn json_f64(value: &Option<JsonDouble>, field: &'static str) -> Result<f64, DecodeError> {
    value.as_ref().map_or(Ok(0.0), |v| v.to_f64(field))
}

impl JsonExportMetricsServiceRequest {
    fn into_proto(self) -> Result<ExportMetricsServiceRequest, DecodeError> {
        let resource_metrics = self
            .resource_metrics
            .into_iter()
            .map(|rm| {
                let scope_metrics = rm
                    .scope_metrics
                    .into_iter()
                    .map(|sm| {
                        let metrics = sm
                            .metrics
                            .into_iter()
                            .map(JsonMetric::into_proto)
                            .collect::<Result<_, _>>()?;
                        Ok(ScopeMetrics {
                            metrics,
                            ..Default::default()
                        })
                    })
                    .collect::<Result<_, DecodeError>>()?;
                Ok(ProtoResourceMetrics {
                    resource: Some(rm.resource.into_proto()?),
                    scope_metrics,
                    ..Default::default()
                })
            })
            .collect::<Result<_, DecodeError>>()?;
        Ok(ExportMetricsServiceRequest { resource_metrics })
    }
}

impl JsonMetric {
    fn into_proto(self) -> Result<ProtoMetric, DecodeError> {
        let data = if let Some(gauge) = self.gauge {
            Some(Data::Gauge(Gauge {
                data_points: number_points(gauge.data_points)?,
            }))
        } else if let Some(sum) = self.sum {
            Some(Data::Sum(Sum {
                data_points: number_points(sum.data_points)?,
                aggregation_temporality: sum.aggregation_temporality,
                is_monotonic: sum.is_monotonic,
            }))
        } else if let Some(histogram) = self.histogram {
            Some(Data::Histogram(Histogram {
                data_points: histogram
                    .data_points
                    .into_iter()
                    .map(JsonHistogramDataPoint::into_proto)
                    .collect::<Result<_, _>>()?,
                aggregation_temporality: histogram.aggregation_temporality,
            }))
        } else if let Some(exponential) = self.exponential_histogram {
            Some(Data::ExponentialHistogram(ExponentialHistogram {
                data_points: exponential
                    .data_points
                    .iter()
                    .map(|_| ExponentialHistogramDataPoint::default())
                    .collect(),
                aggregation_temporality: exponential.aggregation_temporality,
            }))
        } else if let Some(summary) = self.summary {
            Some(Data::Summary(Summary {
                data_points: summary
                    .data_points
                    .into_iter()
                    .map(JsonSummaryDataPoint::into_proto)
                    .collect::<Result<_, _>>()?,
            }))
        } else {
            None
        };

        Ok(ProtoMetric {
            name: self.name,
            description: self.description,
            unit: self.unit,
            data,
            ..Default::default()
        })
    }
}

fn number_points(points: Vec<JsonNumberDataPoint>) -> Result<Vec<ProtoNumberPoint>, DecodeError> {
    points
        .into_iter()
        .map(|p| {
            let value = if let Some(d) = &p.as_double {
                Some(number_data_point::Value::AsDouble(d.to_f64("asDouble")?))
            } else if let Some(i) = &p.as_int {
                Some(number_data_point::Value::AsInt(i.to_i64("asInt")?))
            } else {
                None
            };
            Ok(ProtoNumberPoint {
                attributes: json_attributes(p.attributes)?,
                start_time_unix_nano: json_u64(&p.start_time_unix_nano, "startTimeUnixNano")?,
                time_unix_nano: json_u64(&p.time_unix_nano, "timeUnixNano")?,
                value,
                ..Default::default()
            })
        })
        .collect()
}

impl JsonHistogramDataPoint {
    fn into_proto(self) -> Result<ProtoHistogramPoint, DecodeError> {
        Ok(ProtoHistogramPoint {
            attributes: json_attributes(self.attributes)?,
            start_time_unix_nano: json_u64(&self.start_time_unix_nano, "startTimeUnixNano")?,
            time_unix_nano: json_u64(&self.time_unix_nano, "timeUnixNano")?,
            count: json_u64(&self.count, "count")?,
            sum: self.sum.map(|s| s.to_f64("sum")).transpose()?,
            bucket_counts: self
                .bucket_counts
                .iter()
                .map(|c| c.to_u64("bucketCounts"))
                .collect::<Result<_, _>>()?,
            explicit_bounds: self
                .explicit_bounds
                .iter()
                .map(|b| b.to_f64("explicitBounds"))
                .collect::<Result<_, _>>()?,
            ..Default::default()
        })
    }
}

impl JsonSummaryDataPoint {
    fn into_proto(self) -> Result<ProtoSummaryPoint, DecodeError> {
        Ok(ProtoSummaryPoint {
            attributes: json_attributes(self.attributes)?,
            start_time_unix_nano: json_u64(&self.start_time_unix_nano, "startTimeUnixNano")?,
            time_unix_nano: json_u64(&self.time_unix_nano, "timeUnixNano")?,
            count: json_u64(&self.count, "count")?,
            sum: json_f64(&self.sum, "sum")?,
            quantile_values: self
                .quantile_values
                .iter()
                .map(|q| {
                    Ok(summary_data_point::ValueAtQuantile {
                        quantile: json_f64(&q.quantile, "quantile")?,
                        value: json_f64(&q.value, "value")?,
                    })
                })
                .collect::<Result<_, DecodeError>>()?,
            ..Default::default()
        })
    }
}
