//! Hands records to another thread over a `crossbeam-channel`.

use crossbeam_channel::{Receiver, Sender};

use super::Sink;
use crate::error::{MeterError, Result};
use crate::events::MetricRecord;

pub struct ChannelSink {
    tx: Sender<MetricRecord>,
}

impl ChannelSink {
    pub fn new(tx: Sender<MetricRecord>) -> Self {
        Self { tx }
    }

    /// Unbounded sink plus the receiving end.
    pub fn unbounded() -> (Self, Receiver<MetricRecord>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }

    /// Bounded sink; `publish` blocks while the channel is full.
    pub fn bounded(capacity: usize) -> (Self, Receiver<MetricRecord>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self::new(tx), rx)
    }
}

impl Sink for ChannelSink {
    fn publish(&mut self, record: MetricRecord) -> Result<()> {
        self.tx
            .send(record)
            .map_err(|_| MeterError::Sink("record receiver disconnected".into()))
    }
}
