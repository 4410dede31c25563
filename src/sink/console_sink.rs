//! Console-based record sink.

use std::io::{self, Write};

use crate::domain::PacketRecord;
use crate::error::SinkError;
use crate::sink::RecordSink;

/// Writes each record as one JSON line.
///
/// Used for dry runs: the output matches what would be sent on the wire.
pub struct ConsoleSink<W = io::Stdout> {
    writer: W,
}

impl ConsoleSink {
    /// Create a console sink writing to stdout.
    pub fn new() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Create a sink writing to any writer.
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for ConsoleSink<W> {
    fn send(&mut self, record: &PacketRecord) -> Result<(), SinkError> {
        let line = record.to_json()?;
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn on_start(&mut self, interface: &str) {
        tracing::info!("Relaying packets from {} to stdout (dry run)", interface);
    }

    fn on_stop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::debug!("Failed to flush console output: {}", e);
        }
    }
}
