// src/encode/mod.rs
//! Event serialization: one line per record, written atomically to a shared sink.

mod sink;
mod template;

pub use sink::{MemorySink, OutputSink, SharedSink};
pub use template::{Template, DEFAULT_FORMAT};

use tracing::warn;

use crate::error::{BatchError, RecordFailure, SerializeError, TemplateError};
use crate::hec::{Event, Translator};
use crate::model::{LogRecord, LogsBatch, Resource};

/// How log records are rendered. Spans and metrics are always JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Template(Template),
}

impl OutputFormat {
    /// Resolves the `format` bootstrap parameter: absent selects JSON, empty
    /// selects [`DEFAULT_FORMAT`], anything else is parsed as a template.
    pub fn from_param(format: Option<&str>) -> Result<Self, TemplateError> {
        match format {
            None => Ok(OutputFormat::Json),
            Some(s) if s.trim().is_empty() => Ok(OutputFormat::Template(Template::default())),
            Some(s) => Template::parse(s).map(OutputFormat::Template),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventSerializer {
    format: OutputFormat,
    sink: SharedSink,
}

impl EventSerializer {
    pub fn new(format: OutputFormat, sink: SharedSink) -> Self {
        Self { format, sink }
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Compact JSON plus the trailing newline.
    pub fn encode_event(&self, event: &Event) -> Result<Vec<u8>, SerializeError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Encodes a log record using the configured format.
    pub fn encode_log(
        &self,
        translator: &Translator,
        resource: &Resource,
        record: &LogRecord,
    ) -> Result<Vec<u8>, SerializeError> {
        match &self.format {
            OutputFormat::Json => self.encode_event(&translator.translate_log(resource, record)),
            OutputFormat::Template(template) => {
                let mut line = template.render(resource, record)?;
                line.push('\n');
                Ok(line.into_bytes())
            }
        }
    }

    /// Writes every event; a failing event does not stop the rest.
    /// Returns the number of lines written.
    pub fn write_events(&self, events: &[Event]) -> Result<usize, BatchError> {
        self.write_all(events.iter().map(|event| self.encode_event(event)))
    }

    pub fn write_logs(&self, translator: &Translator, batch: &LogsBatch) -> Result<usize, BatchError> {
        let lines = batch.resource_logs.iter().flat_map(|rl| {
            rl.records
                .iter()
                .map(move |record| self.encode_log(translator, &rl.resource, record))
        });
        self.write_all(lines)
    }

    fn write_all(
        &self,
        lines: impl Iterator<Item = Result<Vec<u8>, SerializeError>>,
    ) -> Result<usize, BatchError> {
        let mut total = 0;
        let mut written = 0;
        let mut failures = Vec::new();

        for (index, line) in lines.enumerate() {
            total += 1;
            let result = line.and_then(|bytes| self.sink.write_line(&bytes).map_err(SerializeError::from));
            match result {
                Ok(()) => written += 1,
                Err(error) => {
                    warn!(index, error = %error, "failed to write record");
                    failures.push(RecordFailure { index, error });
                }
            }
        }

        if failures.is_empty() {
            Ok(written)
        } else {
            Err(BatchError { total, failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeValue, ResourceLogs, Timestamp};
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn logs_batch(bodies: &[&str]) -> LogsBatch {
        LogsBatch {
            resource_logs: vec![ResourceLogs {
                resource: Resource::new([("host.name", "h1")].into_iter().collect()),
                records: bodies
                    .iter()
                    .map(|b| LogRecord {
                        body: AttributeValue::from(*b),
                        timestamp: Timestamp(1_000_000_000),
                        ..LogRecord::default()
                    })
                    .collect(),
            }],
            ..LogsBatch::default()
        }
    }

    /// Fails the n-th write (zero based), succeeds otherwise.
    struct FailNth {
        n: usize,
        seen: Arc<AtomicUsize>,
        inner: MemorySink,
    }

    impl Write for FailNth {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.seen.fetch_add(1, Ordering::SeqCst) == self.n {
                return Err(io::Error::other("sink rejected write"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_lines_end_with_newline() {
        let memory = MemorySink::new();
        let serializer = EventSerializer::new(OutputFormat::Json, SharedSink::new(memory.clone()));

        let written = serializer
            .write_logs(&Translator::default(), &logs_batch(&["one", "two"]))
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            memory.contents(),
            "{\"time\":1.0,\"host\":\"h1\",\"event\":\"one\"}\n{\"time\":1.0,\"host\":\"h1\",\"event\":\"two\"}\n"
        );
    }

    #[test]
    fn template_format_renders_logs() {
        let memory = MemorySink::new();
        let format = OutputFormat::from_param(Some("{{ .LogRecord.Body }}|{{ epoch .LogRecord.Timestamp }}")).unwrap();
        let serializer = EventSerializer::new(format, SharedSink::new(memory.clone()));

        serializer
            .write_logs(&Translator::default(), &logs_batch(&["a", "b"]))
            .unwrap();
        assert_eq!(memory.lines(), vec!["a|1", "b|1"]);
    }

    #[test]
    fn format_param_resolution() {
        assert_eq!(OutputFormat::from_param(None).unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_param(Some("")).unwrap(),
            OutputFormat::Template(Template::default())
        );
        assert!(OutputFormat::from_param(Some("{{ .Nope }}")).is_err());
    }

    #[test]
    fn one_failing_record_does_not_stop_the_batch() {
        let memory = MemorySink::new();
        let sink = SharedSink::new(FailNth {
            n: 1,
            seen: Arc::new(AtomicUsize::new(0)),
            inner: memory.clone(),
        });
        let serializer = EventSerializer::new(OutputFormat::Json, sink);

        let err = serializer
            .write_logs(&Translator::default(), &logs_batch(&["a", "b", "c"]))
            .unwrap_err();
        assert_eq!(err.total, 3);
        assert_eq!(err.failed(), 1);
        assert_eq!(err.failures[0].index, 1);
        assert!(matches!(err.failures[0].error, SerializeError::Io(_)));
        assert!(err.to_string().contains("sink rejected write"));

        let lines = memory.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"a\""));
        assert!(lines[1].contains("\"c\""));
    }

    #[test]
    fn template_type_errors_are_per_record() {
        let memory = MemorySink::new();
        let format = OutputFormat::from_param(Some("{{ .LogRecord.Attributes | iso8601 }}")).unwrap();
        let serializer = EventSerializer::new(format, SharedSink::new(memory.clone()));

        let err = serializer
            .write_logs(&Translator::default(), &logs_batch(&["a", "b"]))
            .unwrap_err();
        assert_eq!(err.failed(), 2);
        assert!(matches!(err.failures[0].error, SerializeError::Template(_)));
        assert!(memory.contents().is_empty());
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let memory = MemorySink::new();
        let serializer = EventSerializer::new(OutputFormat::Json, SharedSink::new(memory.clone()));
        assert_eq!(serializer.write_events(&[]).unwrap(), 0);
        assert!(memory.contents().is_empty());
    }
}
