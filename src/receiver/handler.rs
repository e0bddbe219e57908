use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{debug, error, info, Span};

use super::Consumers;
use crate::decode::{
    decode_logs, decode_metrics, decode_traces, logs_from_proto, metrics_from_proto,
    traces_from_proto, DecodeError, DecodeFormat,
};
use crate::error::ConsumeError;
use crate::model::{ClientMetadata, LogsBatch, MetricsBatch, TracesBatch};
use crate::signal::Signal;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

pub(crate) const MAX_DECOMPRESSED_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("decompress error: {0}")]
    Decompress(String),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Consume(#[from] ConsumeError),
}

impl HandleError {
    /// Whether the request itself was at fault, as opposed to the pipeline.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, HandleError::Consume(_))
    }
}

/// Signal-specific decoding and delivery.
#[async_trait::async_trait]
pub trait SignalHandler {
    const SIGNAL: Signal;

    type Request: Send + 'static;
    type Batch: Send + 'static;

    fn decode(body: &[u8], format: DecodeFormat) -> Result<Self::Batch, DecodeError>;

    fn from_request(request: &Self::Request) -> Self::Batch;

    fn count(batch: &Self::Batch) -> usize;

    fn attach_metadata(batch: &mut Self::Batch, metadata: ClientMetadata);

    async fn consume(consumers: &Consumers, batch: Self::Batch) -> Result<(), ConsumeError>;
}

pub struct LogsHandler;
pub struct TracesHandler;
pub struct MetricsHandler;

#[async_trait::async_trait]
impl SignalHandler for LogsHandler {
    const SIGNAL: Signal = Signal::Logs;

    type Request = ExportLogsServiceRequest;
    type Batch = LogsBatch;

    fn decode(body: &[u8], format: DecodeFormat) -> Result<LogsBatch, DecodeError> {
        decode_logs(body, format)
    }

    fn from_request(request: &ExportLogsServiceRequest) -> LogsBatch {
        logs_from_proto(request)
    }

    fn count(batch: &LogsBatch) -> usize {
        batch.record_count()
    }

    fn attach_metadata(batch: &mut LogsBatch, metadata: ClientMetadata) {
        batch.metadata = metadata;
    }

    async fn consume(consumers: &Consumers, batch: LogsBatch) -> Result<(), ConsumeError> {
        match &consumers.logs {
            Some(consumer) => consumer.consume_logs(batch).await,
            None => Err(ConsumeError::NoConsumer(Self::SIGNAL.name())),
        }
    }
}

#[async_trait::async_trait]
impl SignalHandler for TracesHandler {
    const SIGNAL: Signal = Signal::Traces;

    type Request = ExportTraceServiceRequest;
    type Batch = TracesBatch;

    fn decode(body: &[u8], format: DecodeFormat) -> Result<TracesBatch, DecodeError> {
        decode_traces(body, format)
    }

    fn from_request(request: &ExportTraceServiceRequest) -> TracesBatch {
        traces_from_proto(request)
    }

    fn count(batch: &TracesBatch) -> usize {
        batch.span_count()
    }

    fn attach_metadata(batch: &mut TracesBatch, metadata: ClientMetadata) {
        batch.metadata = metadata;
    }

    async fn consume(consumers: &Consumers, batch: TracesBatch) -> Result<(), ConsumeError> {
        match &consumers.traces {
            Some(consumer) => consumer.consume_traces(batch).await,
            None => Err(ConsumeError::NoConsumer(Self::SIGNAL.name())),
        }
    }
}

#[async_trait::async_trait]
impl SignalHandler for MetricsHandler {
    const SIGNAL: Signal = Signal::Metrics;

    type Request = ExportMetricsServiceRequest;
    type Batch = MetricsBatch;

    fn decode(body: &[u8], format: DecodeFormat) -> Result<MetricsBatch, DecodeError> {
        decode_metrics(body, format)
    }

    fn from_request(request: &ExportMetricsServiceRequest) -> MetricsBatch {
        metrics_from_proto(request)
    }

    fn count(batch: &MetricsBatch) -> usize {
        batch.data_point_count()
    }

    fn attach_metadata(batch: &mut MetricsBatch, metadata: ClientMetadata) {
        batch.metadata = metadata;
    }

    async fn consume(consumers: &Consumers, batch: MetricsBatch) -> Result<(), ConsumeError> {
        match &consumers.metrics {
            Some(consumer) => consumer.consume_metrics(batch).await,
            None => Err(ConsumeError::NoConsumer(Self::SIGNAL.name())),
        }
    }
}

pub(crate) fn decompress_if_gzipped(body: Bytes, is_gzipped: bool) -> Result<Bytes, HandleError> {
    if !is_gzipped && body.len() > MAX_DECOMPRESSED_SIZE {
        error!(
            bytes_read = body.len(),
            max = MAX_DECOMPRESSED_SIZE,
            "uncompressed body exceeds limit"
        );
        return Err(HandleError::Decompress(format!(
            "exceeds {}MB limit",
            MAX_DECOMPRESSED_SIZE / 1024 / 1024
        )));
    }

    if !is_gzipped {
        return Ok(body);
    }

    debug!(compressed_size = body.len(), "decompressing gzipped body");
    let decoder = GzDecoder::new(body.as_ref());
    let mut decompressed = Vec::with_capacity(body.len().saturating_mul(2));
    let bytes_read = decoder
        .take((MAX_DECOMPRESSED_SIZE + 1) as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| {
            error!(error = %e, "gzip decompression failed");
            HandleError::Decompress(e.to_string())
        })?;
    if bytes_read > MAX_DECOMPRESSED_SIZE {
        error!(
            bytes_read,
            max = MAX_DECOMPRESSED_SIZE,
            "decompressed size exceeds limit"
        );
        return Err(HandleError::Decompress(format!(
            "exceeds {}MB limit",
            MAX_DECOMPRESSED_SIZE / 1024 / 1024
        )));
    }
    debug!(decompressed_size = bytes_read, "decompression complete");
    Ok(Bytes::from(decompressed))
}

/// Decodes an OTLP/HTTP body and hands the batch to the signal's consumer.
/// Returns the number of items delivered.
#[tracing::instrument(
    name = "ingest",
    skip(body, metadata, consumers),
    fields(
        signal = %H::SIGNAL,
        format = ?format,
        gzipped = is_gzipped,
        records = tracing::field::Empty,
    )
)]
pub async fn handle_signal<H: SignalHandler>(
    body: Bytes,
    is_gzipped: bool,
    format: DecodeFormat,
    metadata: Option<ClientMetadata>,
    consumers: &Consumers,
) -> Result<usize, HandleError> {
    debug!(body_size = body.len(), "handling signal request");

    let body = decompress_if_gzipped(body, is_gzipped)?;
    let batch = H::decode(&body, format).map_err(|e| {
        error!(error = %e, "failed to decode payload");
        HandleError::Decode(e)
    })?;

    Ok(deliver::<H>(batch, metadata, consumers).await?)
}

/// Shared tail of the HTTP and gRPC paths.
pub(crate) async fn deliver<H: SignalHandler>(
    mut batch: H::Batch,
    metadata: Option<ClientMetadata>,
    consumers: &Consumers,
) -> Result<usize, ConsumeError> {
    let count = H::count(&batch);
    Span::current().record("records", count);

    if let Some(metadata) = metadata {
        H::attach_metadata(&mut batch, metadata);
    }

    H::consume(consumers, batch).await.map_err(|e| {
        error!(signal = %H::SIGNAL, error = %e, "consumer rejected batch");
        e
    })?;

    info!(signal = %H::SIGNAL, records = count, "request complete");
    Ok(count)
}
