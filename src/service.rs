//! Wiring of the receiver, exporters and host into one runnable pipeline.

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use crate::component::{Component, ComponentId};
use crate::config::BootstrapConfig;
use crate::encode::{EventSerializer, OutputFormat, SharedSink};
use crate::error::{ComponentError, LifecycleError};
use crate::exporter::{HecConfig, HecExporter, StdoutExporter};
use crate::extension::{Extensions, HeadersSetter};
use crate::hec::{ReservedKeys, Translator};
use crate::host::PipelineHost;
use crate::receiver::{Consumers, OtlpReceiver, ReceiverConfig};
use crate::signal::Signal;

/// Where translated events go.
#[derive(Clone, Debug)]
pub enum Output {
    /// One line per record on the sink, logs rendered with `format`.
    Stdout { sink: SharedSink, format: OutputFormat },
    Hec(HecConfig),
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub receiver: ReceiverConfig,
    pub output: Output,
    pub reserved_keys: ReservedKeys,
}

impl ServiceConfig {
    /// Receiver on the configured address, events written to stdout.
    pub fn stdout(bootstrap: &BootstrapConfig) -> Result<Self, ComponentError> {
        let format = OutputFormat::from_param(bootstrap.format.as_deref())?;
        Ok(Self {
            receiver: ReceiverConfig {
                grpc_endpoint: Some(bootstrap.grpc_endpoint()),
                http_endpoint: Some(bootstrap.http_endpoint()),
                include_metadata: false,
            },
            output: Output::Stdout {
                sink: SharedSink::stdout(),
                format,
            },
            reserved_keys: ReservedKeys::default(),
        })
    }

    /// Receiver forwarding to the local HEC endpoint, passing the caller's
    /// `Authorization` header through.
    pub fn hec(bootstrap: &BootstrapConfig) -> Self {
        Self {
            receiver: ReceiverConfig {
                grpc_endpoint: Some(bootstrap.grpc_endpoint()),
                http_endpoint: Some(bootstrap.http_endpoint()),
                include_metadata: true,
            },
            output: Output::Hec(HecConfig {
                authenticator: Some(ComponentId::new(HeadersSetter::TYPE)),
                ..HecConfig::default()
            }),
            reserved_keys: ReservedKeys::default(),
        }
    }
}

pub struct Service {
    host: PipelineHost,
    receiver: Arc<OtlpReceiver>,
    exporters: Vec<Arc<dyn Component>>,
}

impl Service {
    /// Builds one exporter per signal and a receiver feeding all three.
    pub fn build(config: ServiceConfig, extensions: Extensions) -> Self {
        let translator = Translator::new(config.reserved_keys);
        let mut exporters: Vec<Arc<dyn Component>> = Vec::new();

        let consumers = match config.output {
            Output::Stdout { sink, format } => {
                let serializer = EventSerializer::new(format, sink);
                let [logs, traces, metrics] = [Signal::Logs, Signal::Traces, Signal::Metrics]
                    .map(|signal| {
                        Arc::new(StdoutExporter::with_id(
                            ComponentId::with_name(StdoutExporter::TYPE, signal.name()),
                            translator.clone(),
                            serializer.clone(),
                        ))
                    });
                exporters.push(logs.clone());
                exporters.push(traces.clone());
                exporters.push(metrics.clone());
                Consumers {
                    logs: Some(logs),
                    traces: Some(traces),
                    metrics: Some(metrics),
                }
            }
            Output::Hec(hec) => {
                let exporter = Arc::new(HecExporter::new(hec, translator));
                exporters.push(exporter.clone());
                Consumers {
                    logs: Some(exporter.clone()),
                    traces: Some(exporter.clone()),
                    metrics: Some(exporter),
                }
            }
        };

        Self {
            host: PipelineHost::new(extensions),
            receiver: Arc::new(OtlpReceiver::new(config.receiver, consumers)),
            exporters,
        }
    }

    pub fn host(&self) -> &PipelineHost {
        &self.host
    }

    pub fn receiver(&self) -> &OtlpReceiver {
        &self.receiver
    }

    /// Starts the host, then the exporters, then the receiver. On failure the
    /// stages already started are shut down again.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.host
            .start()
            .context("failed to install signal handlers")?;

        let mut started: Vec<Arc<dyn Component>> = Vec::new();
        for component in self.start_order() {
            if let Err(e) = component.start(&self.host).await {
                error!(component = %component.id(), error = %e, "component failed to start");
                started.reverse();
                self.host.shutdown_components(&started).await;
                return Err(e).with_context(|| format!("failed to start {}", component.id()));
            }
            info!(component = %component.id(), "component started");
            started.push(component);
        }
        Ok(())
    }

    /// Blocks until shutdown is triggered, then stops every stage, receiver
    /// first. Returns the first fatal error reported, if any.
    pub async fn wait_and_shutdown(&self) -> Result<(), LifecycleError> {
        let result = self.host.wait().await;
        let mut order = self.start_order();
        order.reverse();
        self.host.shutdown_components(&order).await;
        result
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.start().await?;
        info!(
            grpc = ?self.receiver.grpc_addr(),
            http = ?self.receiver.http_addr(),
            "OTLP input started"
        );
        self.wait_and_shutdown().await?;
        Ok(())
    }

    fn start_order(&self) -> Vec<Arc<dyn Component>> {
        let mut order = self.exporters.clone();
        order.push(self.receiver.clone());
        order
    }
}
