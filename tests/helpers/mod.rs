#![allow(dead_code)] // Test helpers appear unused when compiled independently

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde_json::Value;
use splunk_connect_for_otlp::encode::{MemorySink, OutputFormat, SharedSink};
use splunk_connect_for_otlp::extension::Extensions;
use splunk_connect_for_otlp::hec::ReservedKeys;
use splunk_connect_for_otlp::receiver::ReceiverConfig;
use splunk_connect_for_otlp::{Output, Service, ServiceConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

pub const HEC_PATH: &str = "/services/collector/event";

/// One request received by the mock collector.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HecRequest {
    pub authorization: Option<String>,
    pub events: Vec<Value>,
}

#[derive(Clone)]
struct CollectorState {
    requests: Arc<Mutex<Vec<HecRequest>>>,
    status: StatusCode,
}

pub struct MockCollector {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockCollector {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// Spawn a mock HTTP Event Collector, return (handle, base URL)
pub async fn spawn_mock_collector(port: u16) -> (MockCollector, String) {
    spawn_mock_collector_with_status(port, StatusCode::OK).await
}

/// Mock collector that answers every ingest request with `status`.
pub async fn spawn_mock_collector_with_status(
    port: u16,
    status: StatusCode,
) -> (MockCollector, String) {
    let state = CollectorState {
        requests: Arc::new(Mutex::new(Vec::new())),
        status,
    };

    let app = Router::new()
        .route(HEC_PATH, post(ingest))
        .route("/requests", get(requests))
        .route("/health", get(health))
        .with_state(state);

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind mock collector listener");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock collector server error: {}", err);
        }
    });

    (
        MockCollector {
            shutdown_tx,
            handle,
        },
        format!("http://127.0.0.1:{}", port),
    )
}

/// Pipeline writing to an in-memory sink, listening on ephemeral loopback ports.
pub async fn start_memory_service(format: OutputFormat) -> (Service, MemorySink) {
    let memory = MemorySink::new();
    let config = ServiceConfig {
        receiver: loopback_receiver(false),
        output: Output::Stdout {
            sink: SharedSink::new(memory.clone()),
            format,
        },
        reserved_keys: ReservedKeys::default(),
    };
    let service = Service::build(config, Extensions::new());
    service.start().await.expect("service failed to start");
    (service, memory)
}

pub fn loopback_receiver(include_metadata: bool) -> ReceiverConfig {
    ReceiverConfig {
        grpc_endpoint: Some("127.0.0.1:0".to_string()),
        http_endpoint: Some("127.0.0.1:0".to_string()),
        include_metadata,
    }
}

pub fn http_base(service: &Service) -> String {
    let addr = service.receiver().http_addr().expect("http server running");
    format!("http://{}", addr)
}

pub fn grpc_base(service: &Service) -> String {
    let addr = service.receiver().grpc_addr().expect("grpc server running");
    format!("http://{}", addr)
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

/// Poll /requests until the collector has seen at least `min_count` requests
pub async fn wait_for_requests(
    client: &Client,
    base_url: &str,
    min_count: usize,
) -> Vec<HecRequest> {
    poll_until(|| async {
        match client.get(format!("{}/requests", base_url)).send().await.ok() {
            Some(resp) => match resp.json::<Vec<HecRequest>>().await.ok() {
                Some(requests) if requests.len() >= min_count => Some(requests),
                _ => None,
            },
            None => None,
        }
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} requests at {}", min_count, base_url))
}

/// Poll the sink until it holds at least `min_count` lines
pub async fn wait_for_lines(memory: &MemorySink, min_count: usize) -> Vec<String> {
    poll_until(|| async {
        let lines = memory.lines();
        (lines.len() >= min_count).then_some(lines)
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} output lines", min_count))
}

pub async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}

async fn ingest(
    State(state): State<CollectorState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let text = String::from_utf8_lossy(&body);
    let mut events = Vec::new();
    for line in text.split('\n').filter(|l| !l.is_empty()) {
        let parsed: Value = serde_json::from_str(line).map_err(|_| StatusCode::BAD_REQUEST)?;
        events.push(parsed);
    }

    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().await.push(HecRequest {
        authorization,
        events,
    });

    if state.status.is_success() {
        Ok(Json(serde_json::json!({ "text": "Success", "code": 0 })))
    } else {
        Err(state.status)
    }
}

async fn requests(State(state): State<CollectorState>) -> Json<Vec<HecRequest>> {
    let requests = state.requests.lock().await;
    Json(requests.clone())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
