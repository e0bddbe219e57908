use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use prost::Message;
use std::sync::Arc;

use super::handler::{
    handle_signal, LogsHandler, MetricsHandler, SignalHandler, TracesHandler,
    MAX_DECOMPRESSED_SIZE,
};
use super::{client_metadata, Consumers};
use crate::decode::DecodeFormat;
use crate::signal::Signal;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceResponse;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceResponse;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceResponse;

struct HttpState {
    consumers: Consumers,
    include_metadata: bool,
}

/// OTLP/HTTP routes. A signal without a consumer gets no route.
pub fn build_router(consumers: Consumers, include_metadata: bool) -> Router {
    let mut router = Router::new().route("/health", get(|| async { "ok" }));

    if consumers.logs.is_some() {
        router = router.route(Signal::Logs.path(), post(handle_logs));
    }
    if consumers.traces.is_some() {
        router = router.route(Signal::Traces.path(), post(handle_traces));
    }
    if consumers.metrics.is_some() {
        router = router.route(Signal::Metrics.path(), post(handle_metrics));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_DECOMPRESSED_SIZE))
        .with_state(Arc::new(HttpState {
            consumers,
            include_metadata,
        }))
}

fn parse_content_metadata(headers: &HeaderMap) -> (bool, DecodeFormat) {
    let header = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    let is_gzipped = header(header::CONTENT_ENCODING)
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);
    (is_gzipped, DecodeFormat::from_content_type(header(header::CONTENT_TYPE)))
}

/// Runs the shared handler and renders either the empty export response or
/// the error text.
async fn handle_http_signal<H: SignalHandler, R: Message + Default>(
    state: &HttpState,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (is_gzipped, format) = parse_content_metadata(&headers);
    let metadata = state.include_metadata.then(|| client_metadata(&headers));

    match handle_signal::<H>(body, is_gzipped, format, metadata, &state.consumers).await {
        Ok(_) => {
            let body = match format {
                DecodeFormat::Protobuf => R::default().encode_to_vec(),
                DecodeFormat::Json => b"{}".to_vec(),
            };
            ([(header::CONTENT_TYPE, format.content_type())], body).into_response()
        }
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string()).into_response()
        }
    }
}

async fn handle_logs(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_http_signal::<LogsHandler, ExportLogsServiceResponse>(&state, headers, body).await
}

async fn handle_traces(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_http_signal::<TracesHandler, ExportTraceServiceResponse>(&state, headers, body).await
}

async fn handle_metrics(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_http_signal::<MetricsHandler, ExportMetricsServiceResponse>(&state, headers, body)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        headers.insert(header::CONTENT_ENCODING, "GZIP".parse().unwrap());
        assert_eq!(parse_content_metadata(&headers), (true, DecodeFormat::Json));

        assert_eq!(
            parse_content_metadata(&HeaderMap::new()),
            (false, DecodeFormat::Protobuf)
        );
    }
}
