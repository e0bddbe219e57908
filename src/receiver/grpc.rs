use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server;
use tonic::{Request, Status};

use super::handler::{deliver, LogsHandler, MetricsHandler, SignalHandler, TracesHandler};
use super::{client_metadata, Consumers};

/// OTLP/gRPC export services backed by the registered consumers.
#[derive(Clone)]
pub struct OtlpGrpc {
    consumers: Consumers,
    include_metadata: bool,
}

impl OtlpGrpc {
    pub fn new(consumers: Consumers, include_metadata: bool) -> Self {
        Self {
            consumers,
            include_metadata,
        }
    }

    async fn export_signal<H: SignalHandler>(
        &self,
        request: Request<H::Request>,
    ) -> Result<(), Status> {
        let metadata = self
            .include_metadata
            .then(|| client_metadata(&request.metadata().clone().into_headers()));
        let batch = H::from_request(request.get_ref());

        deliver::<H>(batch, metadata, &self.consumers)
            .await
            .map(|_| ())
            .map_err(|e| Status::internal(e.to_string()))
    }

    /// Serves the services that have a consumer until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), tonic::transport::Error> {
        let logs = self.consumers.logs.is_some().then(|| {
            LogsServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
        });
        let traces = self.consumers.traces.is_some().then(|| {
            TraceServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
        });
        let metrics = self.consumers.metrics.is_some().then(|| {
            MetricsServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
        });

        Server::builder()
            .add_optional_service(logs)
            .add_optional_service(traces)
            .add_optional_service(metrics)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await
    }
}

#[tonic::async_trait]
impl LogsService for OtlpGrpc {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<tonic::Response<ExportLogsServiceResponse>, Status> {
        self.export_signal::<LogsHandler>(request).await?;
        Ok(tonic::Response::new(ExportLogsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl TraceService for OtlpGrpc {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<tonic::Response<ExportTraceServiceResponse>, Status> {
        self.export_signal::<TracesHandler>(request).await?;
        Ok(tonic::Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpGrpc {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<tonic::Response<ExportMetricsServiceResponse>, Status> {
        self.export_signal::<MetricsHandler>(request).await?;
        Ok(tonic::Response::new(ExportMetricsServiceResponse::default()))
    }
}
