use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::component::{Component, ComponentId, LogsConsumer, MetricsConsumer, TracesConsumer};
use crate::encode::EventSerializer;
use crate::error::{ComponentError, ConsumeError};
use crate::hec::Translator;
use crate::host::PipelineHost;
use crate::model::{LogsBatch, MetricsBatch, TracesBatch};

/// Writes every record as one line to the serializer's sink.
pub struct StdoutExporter {
    id: ComponentId,
    translator: Translator,
    serializer: EventSerializer,
    running: AtomicBool,
}

impl StdoutExporter {
    pub const TYPE: &'static str = "stdout";

    pub fn new(translator: Translator, serializer: EventSerializer) -> Self {
        Self::with_id(ComponentId::new(Self::TYPE), translator, serializer)
    }

    /// Instance with a distinguishing name, e.g. `stdout/logs`.
    pub fn with_id(id: ComponentId, translator: Translator, serializer: EventSerializer) -> Self {
        Self {
            id,
            translator,
            serializer,
            running: AtomicBool::new(false),
        }
    }

    fn ensure_running(&self) -> Result<(), ConsumeError> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ConsumeError::NotRunning(self.id.clone()))
        }
    }
}

#[async_trait::async_trait]
impl Component for StdoutExporter {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    async fn start(&self, _host: &PipelineHost) -> Result<(), ComponentError> {
        self.running.store(true, Ordering::Release);
        debug!(component = %self.id, "exporter started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogsConsumer for StdoutExporter {
    async fn consume_logs(&self, batch: LogsBatch) -> Result<(), ConsumeError> {
        self.ensure_running()?;
        let written = self.serializer.write_logs(&self.translator, &batch)?;
        debug!(component = %self.id, written, "wrote log records");
        Ok(())
    }
}

#[async_trait::async_trait]
impl TracesConsumer for StdoutExporter {
    async fn consume_traces(&self, batch: TracesBatch) -> Result<(), ConsumeError> {
        self.ensure_running()?;
        let events = self.translator.traces_events(&batch);
        let written = self.serializer.write_events(&events)?;
        debug!(component = %self.id, written, "wrote spans");
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for StdoutExporter {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumeError> {
        self.ensure_running()?;
        let events = self.translator.metrics_events(&batch);
        let written = self.serializer.write_events(&events)?;
        debug!(component = %self.id, written, "wrote metric events");
        Ok(())
    }
}
