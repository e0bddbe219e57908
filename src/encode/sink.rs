use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for serialized lines.
pub trait OutputSink: Write + Send {}

impl<T: Write + Send> OutputSink for T {}

/// Sink shared by every stage writing output. One line is written per lock,
/// so lines from concurrent writers never interleave.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn OutputSink>>>,
}

impl SharedSink {
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes a complete, newline-terminated line and flushes it.
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut sink = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(line)?;
        sink.flush()
    }
}

impl fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSink").finish_non_exhaustive()
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
