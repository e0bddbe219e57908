// src/decode/mod.rs
//! OTLP export requests (protobuf or JSON) into the telemetry model.
//!
//! JSON bodies are first lifted into the generated protobuf types, so both
//! encodings share one conversion into [`crate::model`]. Instrumentation
//! scopes are flattened away.

mod common;
mod logs;
mod metrics;
mod traces;

pub use logs::{decode_logs, logs_from_proto};
pub use metrics::{decode_metrics, metrics_from_proto};
pub use traces::{decode_traces, traces_from_proto};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFormat {
    Protobuf,
    Json,
}

impl DecodeFormat {
    /// `application/json` selects JSON; anything else, including a missing
    /// header, is treated as protobuf.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let is_json = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false);
        if is_json {
            DecodeFormat::Json
        } else {
            DecodeFormat::Protobuf
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DecodeFormat::Protobuf => "application/x-protobuf",
            DecodeFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Field { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_selects_format() {
        assert_eq!(
            DecodeFormat::from_content_type(Some("application/json")),
            DecodeFormat::Json
        );
        assert_eq!(
            DecodeFormat::from_content_type(Some("Application/JSON; charset=utf-8")),
            DecodeFormat::Json
        );
        assert_eq!(
            DecodeFormat::from_content_type(Some("application/x-protobuf")),
            DecodeFormat::Protobuf
        );
        assert_eq!(DecodeFormat::from_content_type(None), DecodeFormat::Protobuf);
    }
}
