//! Shared OTLP/JSON shapes and protobuf -> model conversions.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, KeyValue, KeyValueList,
};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;
use serde::Deserialize;

use super::DecodeError;
use crate::model::{AttributeValue, Attributes, Resource};

/// OTLP/JSON encodes 64-bit integers as strings, but numbers are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum JsonInt {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl JsonInt {
    pub(super) fn to_u64(&self, field: &'static str) -> Result<u64, DecodeError> {
        match self {
            JsonInt::Unsigned(v) => Ok(*v),
            JsonInt::Signed(v) => u64::try_from(*v).map_err(|_| DecodeError::Field {
                field,
                reason: format!("negative value {v}"),
            }),
            JsonInt::Text(s) => s.trim().parse().map_err(|_| DecodeError::Field {
                field,
                reason: format!("not an unsigned integer: {s:?}"),
            }),
        }
    }

    pub(super) fn to_i64(&self, field: &'static str) -> Result<i64, DecodeError> {
        match self {
            JsonInt::Unsigned(v) => i64::try_from(*v).map_err(|_| DecodeError::Field {
                field,
                reason: format!("{v} out of range"),
            }),
            JsonInt::Signed(v) => Ok(*v),
            JsonInt::Text(s) => s.trim().parse().map_err(|_| DecodeError::Field {
                field,
                reason: format!("not an integer: {s:?}"),
            }),
        }
    }
}

/// Missing timestamps decode to zero.
pub(super) fn json_u64(value: &Option<JsonInt>, field: &'static str) -> Result<u64, DecodeError> {
    value.as_ref().map_or(Ok(0), |v| v.to_u64(field))
}

/// Doubles may be numbers or the strings `NaN`, `Infinity`, `-Infinity`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum JsonDouble {
    Number(f64),
    Text(String),
}

impl JsonDouble {
    pub(super) fn to_f64(&self, field: &'static str) -> Result<f64, DecodeError> {
        match self {
            JsonDouble::Number(v) => Ok(*v),
            JsonDouble::Text(s) => s.trim().parse().map_err(|_| DecodeError::Field {
                field,
                reason: format!("not a number: {s:?}"),
            }),
        }
    }
}

/// Trace and span ids are hex strings in OTLP/JSON.
pub(super) fn hex_id(value: &str, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(value).map_err(|e| DecodeError::Field {
        field,
        reason: e.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JsonAnyValue {
    string_value: Option<String>,
    bool_value: Option<bool>,
    int_value: Option<JsonInt>,
    double_value: Option<JsonDouble>,
    array_value: Option<JsonArrayValue>,
    kvlist_value: Option<JsonKeyValueList>,
    bytes_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct JsonArrayValue {
    #[serde(default)]
    values: Vec<JsonAnyValue>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct JsonKeyValueList {
    #[serde(default)]
    values: Vec<JsonKeyValue>,
}

#[derive(Debug, Deserialize)]
pub(super) struct JsonKeyValue {
    key: String,
    #[serde(default)]
    value: Option<JsonAnyValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JsonResource {
    #[serde(default)]
    attributes: Vec<JsonKeyValue>,
}

impl JsonAnyValue {
    pub(super) fn into_proto(self) -> Result<AnyValue, DecodeError> {
        let value = if let Some(s) = self.string_value {
            Some(any_value::Value::StringValue(s))
        } else if let Some(b) = self.bool_value {
            Some(any_value::Value::BoolValue(b))
        } else if let Some(i) = self.int_value {
            Some(any_value::Value::IntValue(i.to_i64("intValue")?))
        } else if let Some(d) = self.double_value {
            Some(any_value::Value::DoubleValue(d.to_f64("doubleValue")?))
        } else if let Some(array) = self.array_value {
            let values = array
                .values
                .into_iter()
                .map(JsonAnyValue::into_proto)
                .collect::<Result<_, _>>()?;
            Some(any_value::Value::ArrayValue(ArrayValue { values }))
        } else if let Some(kvlist) = self.kvlist_value {
            Some(any_value::Value::KvlistValue(KeyValueList {
                values: json_attributes(kvlist.values)?,
            }))
        } else if let Some(b64) = self.bytes_value {
            let bytes = BASE64.decode(b64.as_bytes()).map_err(|e| DecodeError::Field {
                field: "bytesValue",
                reason: e.to_string(),
            })?;
            Some(any_value::Value::BytesValue(bytes))
        } else {
            None
        };
        Ok(AnyValue { value })
    }
}

pub(super) fn json_attributes(attrs: Vec<JsonKeyValue>) -> Result<Vec<KeyValue>, DecodeError> {
    attrs
        .into_iter()
        .map(|kv| {
            Ok(KeyValue {
                key: kv.key,
                value: kv.value.map(JsonAnyValue::into_proto).transpose()?,
            })
        })
        .collect()
}

impl JsonResource {
    pub(super) fn into_proto(self) -> Result<ProtoResource, DecodeError> {
        Ok(ProtoResource {
            attributes: json_attributes(self.attributes)?,
            ..Default::default()
        })
    }
}

pub(super) fn any_value(value: &AnyValue) -> AttributeValue {
    match &value.value {
        None => AttributeValue::Empty,
        Some(any_value::Value::StringValue(s)) => AttributeValue::Str(s.clone()),
        Some(any_value::Value::BoolValue(b)) => AttributeValue::Bool(*b),
        Some(any_value::Value::IntValue(i)) => AttributeValue::Int(*i),
        Some(any_value::Value::DoubleValue(d)) => AttributeValue::Double(*d),
        Some(any_value::Value::BytesValue(b)) => AttributeValue::Bytes(b.clone()),
        Some(any_value::Value::ArrayValue(array)) => {
            AttributeValue::Array(array.values.iter().map(any_value).collect())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            AttributeValue::Map(attributes(&kvlist.values))
        }
    }
}

pub(super) fn attributes(kvs: &[KeyValue]) -> Attributes {
    kvs.iter()
        .map(|kv| {
            let value = kv.value.as_ref().map(any_value).unwrap_or_default();
            (kv.key.as_str(), value)
        })
        .collect()
}

pub(super) fn resource(resource: Option<&ProtoResource>) -> Resource {
    resource
        .map(|r| Resource::new(attributes(&r.attributes)))
        .unwrap_or_default()
}
