// src/decode/logs.rs
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::{
    LogRecord as ProtoLogRecord, ResourceLogs as ProtoResourceLogs, ScopeLogs,
};
use prost::Message;
use serde::Deserialize;

use super::common::{
    any_value, attributes, hex_id, json_attributes, json_u64, resource, JsonAnyValue, JsonInt,
    JsonKeyValue, JsonResource,
};
use super::{DecodeError, DecodeFormat};
use crate::model::{LogRecord, LogsBatch, ResourceLogs, SpanId, Timestamp, TraceId};

/// Decode an OTLP logs export body.
pub fn decode_logs(body: &[u8], format: DecodeFormat) -> Result<LogsBatch, DecodeError> {
    let request = match format {
        DecodeFormat::Protobuf => ExportLogsServiceRequest::decode(body)?,
        DecodeFormat::Json => serde_json::from_slice::<JsonExportLogsServiceRequest>(body)?
            .into_proto()?,
    };
    Ok(logs_from_proto(&request))
}

pub fn logs_from_proto(request: &ExportLogsServiceRequest) -> LogsBatch {
    let resource_logs = request
        .resource_logs
        .iter()
        .map(|rl| ResourceLogs {
            resource: resource(rl.resource.as_ref()),
            records: rl
                .scope_logs
                .iter()
                .flat_map(|sl| sl.log_records.iter())
                .map(log_record)
                .collect(),
        })
        .collect();

    LogsBatch {
        resource_logs,
        ..LogsBatch::default()
    }
}

fn log_record(record: &ProtoLogRecord) -> LogRecord {
    LogRecord {
        timestamp: Timestamp(record.time_unix_nano),
        observed_timestamp: Timestamp(record.observed_time_unix_nano),
        severity_text: record.severity_text.clone(),
        severity_number: record.severity_number,
        body: record.body.as_ref().map(any_value).unwrap_or_default(),
        attributes: attributes(&record.attributes),
        trace_id: TraceId::from_slice(&record.trace_id),
        span_id: SpanId::from_slice(&record.span_id),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonExportLogsServiceRequest {
    #[serde(default)]
    resource_logs: Vec<JsonResourceLogs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonResourceLogs {
    #[serde(default)]
    resource: JsonResource,
    #[serde(default)]
    scope_logs: Vec<JsonScopeLogs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonScopeLogs {
    #[serde(default)]
    log_records: Vec<JsonLogRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonLogRecord {
    #[serde(default)]
    time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    observed_time_unix_nano: Option<JsonInt>,
    #[serde(default)]
    severity_number: i32,
    #[serde(default)]
    severity_text: String,
    #[serde(default)]
    body: Option<JsonAnyValue>,
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
}

impl JsonExportLogsServiceRequest {
    fn into_proto(self) -> Result<ExportLogsServiceRequest, DecodeError> {
        let resource_logs = self
            .resource_logs
            .into_iter()
            .map(|rl| {
                let scope_logs = rl
                    .scope_logs
                    .into_iter()
                    .map(|sl| {
                        let log_records = sl
                            .log_records
                            .into_iter()
                            .map(JsonLogRecord::into_proto)
                            .collect::<Result<_, _>>()?;
                        Ok(ScopeLogs {
                            log_records,
                            ..Default::default()
                        })
                    })
                    .collect::<Result<_, DecodeError>>()?;
                Ok(ProtoResourceLogs {
                    resource: Some(rl.resource.into_proto()?),
                    scope_logs,
                    ..Default::default()
                })
            })
            .collect::<Result<_, DecodeError>>()?;
        Ok(ExportLogsServiceRequest { resource_logs })
    }
}

impl JsonLogRecord {
    fn into_proto(self) -> Result<ProtoLogRecord, DecodeError> {
        Ok(ProtoLogRecord {
            time_unix_nano: json_u64(&self.time_unix_nano, "timeUnixNano")?,
            observed_time_unix_nano: json_u64(
                &self.observed_time_unix_nano,
                "observedTimeUnixNano",
            )?,
            severity_number: self.severity_number,
            severity_text: self.severity_text,
            body: self.body.map(JsonAnyValue::into_proto).transpose()?,
            attributes: json_attributes(self.attributes)?,
            trace_id: hex_id(&self.trace_id, "traceId")?,
            span_id: hex_id(&self.span_id, "spanId")?,
            ..Default::default()
        })
    }
}
