//! Record sinks.
//!
//! A `Sink` receives every `MetricRecord` exactly once, in sequence order.
//! Publication is fire-and-forget per record; buffering and retry policy
//! belong to the sink, never to the pipeline.

pub mod channel;
pub mod json;

pub use channel::ChannelSink;
pub use json::JsonLinesSink;

use crate::error::Result;
use crate::events::MetricRecord;

/// Contract for record consumers.
pub trait Sink {
    /// Take ownership of one record.
    ///
    /// # Errors
    /// `MeterError::Sink` if the record could not be accepted. The pipeline
    /// treats this as terminal for the run.
    fn publish(&mut self, record: MetricRecord) -> Result<()>;

    /// Push out anything buffered. Called once when a run ends normally.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<K: Sink + ?Sized> Sink for Box<K> {
    fn publish(&mut self, record: MetricRecord) -> Result<()> {
        (**self).publish(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<K: Sink + ?Sized> Sink for &mut K {
    fn publish(&mut self, record: MetricRecord) -> Result<()> {
        (**self).publish(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
