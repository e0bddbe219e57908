//! Error taxonomy shared across stages.

use std::fmt;

use crate::component::ComponentId;

/// Malformed bootstrap input. Fatal: the process does not start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read bootstrap configuration: {0}")]
    Read(#[from] std::io::Error),
    #[error("malformed bootstrap XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("unexpected root element <{0}>, expected <input>")]
    UnexpectedRoot(String),
}

/// Bad stage configuration, or a stage that failed to start or stop.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("invalid output template: {0}")]
    Template(#[from] TemplateError),
    #[error("{id}: failed to bind {addr}: {source}")]
    Bind {
        id: ComponentId,
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{id}: invalid endpoint {endpoint:?}")]
    Endpoint { id: ComponentId, endpoint: String },
    #[error("{id}: extension {extension} not found")]
    MissingExtension {
        id: ComponentId,
        extension: ComponentId,
    },
    #[error("{id}: failed to build HTTP client: {message}")]
    HttpClient { id: ComponentId, message: String },
    #[error("{id}: {message}")]
    Other { id: ComponentId, message: String },
}

/// Template parse or render failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),
    #[error("empty action at byte {0}")]
    EmptyAction(usize),
    #[error("malformed action at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("{function}: expected {expected}, got {actual}")]
    WrongArgument {
        function: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Failure to turn one record into an output line.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),
    #[error("write to output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record within its batch.
    pub index: usize,
    pub error: SerializeError,
}

/// Per-record failures of one batch, joined into a single value.
#[derive(Debug)]
pub struct BatchError {
    pub total: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchError {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} records failed", self.failures.len(), self.total)?;
        for failure in &self.failures {
            write!(f, "; record {}: {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Error returned from a consumer to the receiver that delivered the batch.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("{0} is not running")]
    NotRunning(ComponentId),
    #[error("no consumer registered for {0}")]
    NoConsumer(&'static str),
}

/// Fatal runtime fault reported by a stage, surfaced through `PipelineHost::wait`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct LifecycleError {
    pub message: String,
}

impl LifecycleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
