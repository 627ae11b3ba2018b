//! `MemorySource` — interleaved samples held in a `Vec`.
//!
//! Useful for embedding callers that already decoded their audio, and for
//! exercising the pipeline without touching the filesystem.

use tracing::debug;

use super::{SampleSource, StreamDescriptor};
use crate::error::Result;

pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
    descriptor: StreamDescriptor,
    closed: bool,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        let descriptor = StreamDescriptor {
            channel_count,
            sample_rate,
            total_samples: samples.len() as u64,
        };
        Self {
            samples,
            position: 0,
            descriptor,
            closed: false,
        }
    }

    /// Override the reported total sample count.
    ///
    /// Lets a caller model containers whose header disagrees with the
    /// amount of audio they actually contain.
    pub fn with_reported_total(mut self, total_samples: u64) -> Self {
        self.descriptor.total_samples = total_samples;
        self
    }

    /// Samples not yet read.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SampleSource for MemorySource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn close(&mut self) {
        if !self.closed {
            debug!(read = self.position, "closing memory source");
            self.closed = true;
        }
    }
}
