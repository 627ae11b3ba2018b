//! Newline-delimited JSON sink writing [`MeterEvent`]s.

use std::io::Write;

use tracing::trace;

use super::Sink;
use crate::error::{MeterError, Result};
use crate::events::MetricRecord;

/// Writes one `MeterEvent` per line, tagged with the stream name.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    name: String,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn publish(&mut self, record: MetricRecord) -> Result<()> {
        let event = record.to_event(&self.name);
        serde_json::to_writer(&mut self.writer, &event)
            .map_err(|e| MeterError::Sink(format!("failed to encode event: {e}")))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| MeterError::Sink(e.to_string()))?;
        trace!(sample = record.seq, "event written");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| MeterError::Sink(e.to_string()))
    }
}
