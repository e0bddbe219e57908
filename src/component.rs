use std::fmt;

use crate::error::{ComponentError, ConsumeError, LifecycleError};
use crate::host::PipelineHost;
use crate::model::{LogsBatch, MetricsBatch, TracesBatch};

/// Identifier of a pipeline stage or extension, displayed as `kind` or `kind/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId {
    kind: &'static str,
    name: Option<String>,
}

impl ComponentId {
    pub const fn new(kind: &'static str) -> Self {
        Self { kind, name: None }
    }

    pub fn with_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}", self.kind, name),
            None => f.write_str(self.kind),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentStatus {
    Starting,
    Ok,
    RecoverableError,
    PermanentError,
    FatalError,
    Stopping,
    Stopped,
}

impl ComponentStatus {
    /// Statuses that end the pipeline once reported.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComponentStatus::Stopping | ComponentStatus::PermanentError | ComponentStatus::FatalError
        )
    }
}

/// Status change reported by a stage (or the signal task) to the host.
#[derive(Clone, Debug)]
pub struct StatusEvent {
    status: ComponentStatus,
    error: Option<LifecycleError>,
}

impl StatusEvent {
    pub fn new(status: ComponentStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn stopping() -> Self {
        Self::new(ComponentStatus::Stopping)
    }

    pub fn fatal(error: LifecycleError) -> Self {
        Self {
            status: ComponentStatus::FatalError,
            error: Some(error),
        }
    }

    pub fn with_error(mut self, error: LifecycleError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    pub fn error(&self) -> Option<&LifecycleError> {
        self.error.as_ref()
    }

    pub(crate) fn into_error(self) -> Option<LifecycleError> {
        self.error
    }
}

/// A stage whose lifecycle is driven by the service.
#[async_trait::async_trait]
pub trait Component: Send + Sync {
    fn id(&self) -> &ComponentId;

    async fn start(&self, host: &PipelineHost) -> Result<(), ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}

#[async_trait::async_trait]
pub trait LogsConsumer: Send + Sync {
    async fn consume_logs(&self, batch: LogsBatch) -> Result<(), ConsumeError>;
}

#[async_trait::async_trait]
pub trait TracesConsumer: Send + Sync {
    async fn consume_traces(&self, batch: TracesBatch) -> Result<(), ConsumeError>;
}

#[async_trait::async_trait]
pub trait MetricsConsumer: Send + Sync {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumeError>;
}
