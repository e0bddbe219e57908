use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::component::{Component, ComponentId, LogsConsumer, MetricsConsumer, TracesConsumer};
use crate::error::{BatchError, ComponentError, ConsumeError, RecordFailure};
use crate::extension::Extension;
use crate::hec::{Event, Translator};
use crate::host::PipelineHost;
use crate::model::{ClientMetadata, LogsBatch, MetricsBatch, TracesBatch};

pub const DEFAULT_HEC_ENDPOINT: &str = "http://localhost:8088/services/collector/event";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct HecConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Extension that decorates each request, resolved from the host at start.
    pub authenticator: Option<ComponentId>,
}

impl Default for HecConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_HEC_ENDPOINT.to_string(),
            timeout: SEND_TIMEOUT,
            authenticator: None,
        }
    }
}

#[derive(Clone)]
struct Active {
    client: Client,
    authenticator: Option<Arc<dyn Extension>>,
}

/// Forwards translated events to a Splunk HTTP Event Collector.
pub struct HecExporter {
    id: ComponentId,
    config: HecConfig,
    translator: Translator,
    active: RwLock<Option<Active>>,
}

impl HecExporter {
    pub const TYPE: &'static str = "splunk_hec";

    pub fn new(config: HecConfig, translator: Translator) -> Self {
        Self {
            id: ComponentId::new(Self::TYPE),
            config,
            translator,
            active: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &HecConfig {
        &self.config
    }

    fn active(&self) -> Result<Active, ConsumeError> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ConsumeError::NotRunning(self.id.clone()))
    }

    /// Serializes every event and sends the newline-joined body in a single
    /// request. Events that fail to serialize are left out and reported after
    /// the rest have been delivered.
    #[tracing::instrument(
        name = "hec_send",
        skip(self, events, metadata),
        fields(endpoint = %self.config.endpoint, events = events.len())
    )]
    async fn export(
        &self,
        events: Vec<Event>,
        metadata: &ClientMetadata,
    ) -> Result<(), ConsumeError> {
        let active = self.active()?;

        let total = events.len();
        let mut body = Vec::new();
        let mut failures = Vec::new();
        for (index, event) in events.iter().enumerate() {
            match serde_json::to_vec(event) {
                Ok(line) => {
                    if !body.is_empty() {
                        body.push(b'\n');
                    }
                    body.extend_from_slice(&line);
                }
                Err(e) => {
                    warn!(index, error = %e, "skipping event that failed to serialize");
                    failures.push(RecordFailure {
                        index,
                        error: e.into(),
                    });
                }
            }
        }

        if !body.is_empty() {
            self.send(&active, body, metadata).await?;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError { total, failures }.into())
        }
    }

    async fn send(
        &self,
        active: &Active,
        body: Vec<u8>,
        metadata: &ClientMetadata,
    ) -> Result<(), ConsumeError> {
        let endpoint = self.config.endpoint.as_str();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = active
            .authenticator
            .as_ref()
            .and_then(|ext| ext.as_authenticator())
        {
            auth.apply(metadata, &mut headers);
        }

        debug!(endpoint, body_size = body.len(), "sending events to HEC");
        let response = active
            .client
            .post(endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConsumeError::Timeout
                } else {
                    ConsumeError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let resp_body = response
                .text()
                .await
                .unwrap_or_else(|_| "(failed to read body)".to_string());
            error!(
                endpoint,
                status,
                response_body = %resp_body,
                "HEC returned error status"
            );
            return Err(ConsumeError::Http {
                status,
                endpoint: endpoint.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Component for HecExporter {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    async fn start(&self, host: &PipelineHost) -> Result<(), ComponentError> {
        reqwest::Url::parse(&self.config.endpoint).map_err(|_| ComponentError::Endpoint {
            id: self.id.clone(),
            endpoint: self.config.endpoint.clone(),
        })?;

        let authenticator = match &self.config.authenticator {
            Some(ext_id) => {
                let ext = host.extensions().get(ext_id).cloned().ok_or_else(|| {
                    ComponentError::MissingExtension {
                        id: self.id.clone(),
                        extension: ext_id.clone(),
                    }
                })?;
                if ext.as_authenticator().is_none() {
                    return Err(ComponentError::Other {
                        id: self.id.clone(),
                        message: format!("extension {ext_id} is not a request authenticator"),
                    });
                }
                Some(ext)
            }
            None => None,
        };

        let client = Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| ComponentError::HttpClient {
                id: self.id.clone(),
                message: e.to_string(),
            })?;

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(Active {
            client,
            authenticator,
        });
        debug!(component = %self.id, endpoint = %self.config.endpoint, "exporter started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogsConsumer for HecExporter {
    async fn consume_logs(&self, batch: LogsBatch) -> Result<(), ConsumeError> {
        let events = self.translator.logs_events(&batch);
        self.export(events, &batch.metadata).await
    }
}

#[async_trait::async_trait]
impl TracesConsumer for HecExporter {
    async fn consume_traces(&self, batch: TracesBatch) -> Result<(), ConsumeError> {
        let events = self.translator.traces_events(&batch);
        self.export(events, &batch.metadata).await
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for HecExporter {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumeError> {
        let events = self.translator.metrics_events(&batch);
        self.export(events, &batch.metadata).await
    }
}
