// src/receiver/mod.rs
//! OTLP receiver: gRPC and HTTP front ends feeding the registered consumers.

mod grpc;
mod handler;
mod http;

pub use grpc::OtlpGrpc;
pub use handler::{
    handle_signal, HandleError, LogsHandler, MetricsHandler, SignalHandler, TracesHandler,
};
pub use http::build_router;

use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::component::{
    Component, ComponentId, LogsConsumer, MetricsConsumer, StatusEvent, TracesConsumer,
};
use crate::error::{ComponentError, LifecycleError};
use crate::host::PipelineHost;
use crate::model::ClientMetadata;

#[derive(Clone, Debug, Default)]
pub struct ReceiverConfig {
    /// `host:port` for OTLP/gRPC; `None` disables the gRPC server.
    pub grpc_endpoint: Option<String>,
    /// `host:port` for OTLP/HTTP; `None` disables the HTTP server.
    pub http_endpoint: Option<String>,
    /// Attach request headers to each batch as client metadata.
    pub include_metadata: bool,
}

/// Downstream consumers, one optional slot per signal.
#[derive(Clone, Default)]
pub struct Consumers {
    pub logs: Option<Arc<dyn LogsConsumer>>,
    pub traces: Option<Arc<dyn TracesConsumer>>,
    pub metrics: Option<Arc<dyn MetricsConsumer>>,
}

/// Request headers as client metadata. Values that are not valid UTF-8 are dropped.
pub fn client_metadata(headers: &HeaderMap) -> ClientMetadata {
    let mut metadata = ClientMetadata::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            metadata.append(name.as_str(), value);
        }
    }
    metadata
}

struct Running {
    shutdown: watch::Sender<bool>,
    grpc_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct OtlpReceiver {
    id: ComponentId,
    config: ReceiverConfig,
    consumers: Consumers,
    running: Mutex<Option<Running>>,
}

impl OtlpReceiver {
    pub const TYPE: &'static str = "otlp";

    pub fn new(config: ReceiverConfig, consumers: Consumers) -> Self {
        Self {
            id: ComponentId::new(Self::TYPE),
            config,
            consumers,
            running: Mutex::new(None),
        }
    }

    /// Bound gRPC address while running.
    pub fn grpc_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().and_then(|r| r.grpc_addr)
    }

    /// Bound HTTP address while running.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().and_then(|r| r.http_addr)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bind(&self, endpoint: &str) -> Result<(TcpListener, SocketAddr), ComponentError> {
        let bind_error = |source| ComponentError::Bind {
            id: self.id.clone(),
            addr: endpoint.to_string(),
            source,
        };
        let listener = TcpListener::bind(endpoint).await.map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;
        Ok((listener, addr))
    }
}

fn shutdown_signal(mut rx: watch::Receiver<bool>) -> impl std::future::Future<Output = ()> {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

fn report_failure(host: &PipelineHost, server: &str, error: impl std::fmt::Display) {
    error!(server, error = %error, "receiver server failed");
    host.report(StatusEvent::fatal(LifecycleError::new(format!(
        "otlp {server} server failed: {error}"
    ))));
}

#[async_trait::async_trait]
impl Component for OtlpReceiver {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Binds both listeners before spawning either server, so a bind failure
    /// leaves nothing running.
    async fn start(&self, host: &PipelineHost) -> Result<(), ComponentError> {
        if self.lock_running().is_some() {
            return Ok(());
        }

        let grpc = match &self.config.grpc_endpoint {
            Some(endpoint) => Some(self.bind(endpoint).await?),
            None => None,
        };
        let http = match &self.config.http_endpoint {
            Some(endpoint) => Some(self.bind(endpoint).await?),
            None => None,
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let grpc_addr = grpc.as_ref().map(|(_, addr)| *addr);
        let http_addr = http.as_ref().map(|(_, addr)| *addr);

        if let Some((listener, addr)) = grpc {
            let service = OtlpGrpc::new(self.consumers.clone(), self.config.include_metadata);
            let signal = shutdown_signal(shutdown_rx.clone());
            let host = host.clone();
            tasks.push(tokio::spawn(async move {
                info!(%addr, "otlp gRPC server listening");
                if let Err(e) = service.serve(listener, signal).await {
                    report_failure(&host, "gRPC", e);
                }
            }));
        }

        if let Some((listener, addr)) = http {
            let router = build_router(self.consumers.clone(), self.config.include_metadata);
            let signal = shutdown_signal(shutdown_rx.clone());
            let host = host.clone();
            tasks.push(tokio::spawn(async move {
                info!(%addr, "otlp HTTP server listening");
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(signal)
                    .await
                {
                    report_failure(&host, "HTTP", e);
                }
            }));
        }

        *self.lock_running() = Some(Running {
            shutdown,
            grpc_addr,
            http_addr,
            tasks,
        });
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        let Some(running) = self.lock_running().take() else {
            return Ok(());
        };

        let _ = running.shutdown.send(true);
        for task in running.tasks {
            task.await.map_err(|e| ComponentError::Other {
                id: self.id.clone(),
                message: format!("server task failed: {e}"),
            })?;
        }
        info!("otlp receiver stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn loopback_config() -> ReceiverConfig {
        ReceiverConfig {
            grpc_endpoint: Some("127.0.0.1:0".to_string()),
            http_endpoint: Some("127.0.0.1:0".to_string()),
            include_metadata: false,
        }
    }

    #[test]
    fn metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Splunk t"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));

        let metadata = client_metadata(&headers);
        assert_eq!(metadata.get("Authorization"), Some("Splunk t"));
        assert_eq!(metadata.get("x-multi"), Some("a"));
    }

    #[tokio::test]
    async fn start_exposes_bound_addresses_and_shutdown_clears_them() {
        let receiver = OtlpReceiver::new(loopback_config(), Consumers::default());
        let host = PipelineHost::default();

        receiver.start(&host).await.unwrap();
        let grpc = receiver.grpc_addr().unwrap();
        let http = receiver.http_addr().unwrap();
        assert_ne!(grpc.port(), 0);
        assert_ne!(http.port(), 0);

        receiver.shutdown().await.unwrap();
        assert!(receiver.grpc_addr().is_none());
        // Stopping twice is harmless.
        receiver.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_a_component_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let receiver = OtlpReceiver::new(
            ReceiverConfig {
                http_endpoint: Some(addr.to_string()),
                ..ReceiverConfig::default()
            },
            Consumers::default(),
        );
        let err = receiver.start(&PipelineHost::default()).await.unwrap_err();
        assert!(matches!(err, ComponentError::Bind { .. }));
        assert!(receiver.http_addr().is_none());
    }
}
