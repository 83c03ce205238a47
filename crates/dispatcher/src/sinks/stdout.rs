//! StdoutSink - renders entries as single text lines

use std::io::{self, Write};

use chrono::SecondsFormat;
use contracts::{ContractError, DataSink, LogEntry};
use tracing::{debug, instrument};

/// Sink writing one deterministic line per entry
///
/// `[<RFC3339 timestamp>] [<level>] [<node>] <source>: <message>`
///
/// Any write error marks the sink broken.
pub struct StdoutSink<W = io::Stdout> {
    name: String,
    writer: W,
    closed: bool,
}

impl StdoutSink<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for StdoutSink<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutSink<W> {
    /// Create a sink over any writer (used by tests)
    pub fn with_writer(writer: W) -> Self {
        Self {
            name: "stdout".to_string(),
            writer,
            closed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Render one entry, terminator included
    pub fn render(entry: &LogEntry) -> String {
        format!(
            "[{}] [{}] [{}] {}: {}\n",
            entry.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            entry.level(),
            entry.node_name(),
            entry.source(),
            entry.display_message(),
        )
    }

    fn broken(&self, e: io::Error) -> ContractError {
        ContractError::sink_broken(&self.name, e.to_string())
    }
}

impl<W: Write + Send> DataSink for StdoutSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &LogEntry) -> Result<(), ContractError> {
        if self.closed {
            return Err(ContractError::sink_broken(&self.name, "sink is closed"));
        }
        let line = Self::render(entry);
        self.writer
            .write_all(line.as_bytes())
            .map_err(|e| self.broken(e))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        if self.closed {
            return Ok(());
        }
        self.writer.flush().map_err(|e| self.broken(e))
    }

    #[instrument(name = "stdout_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if !self.closed {
            self.closed = true;
            debug!("StdoutSink closed");
        }
        Ok(())
    }
}
