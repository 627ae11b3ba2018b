//! Sample source abstraction.
//!
//! The `SampleSource` trait decouples the pipeline from any specific decoder.
//! A source is a single sequential cursor over interleaved, normalised `f32`
//! PCM; it is not shared between runs.
//!
//! Opening is each implementation's constructor (`WavSource::open`,
//! `MemorySource::new`). Releasing is `close()`, which the pipeline calls on
//! every exit path through [`SourceGuard`].

pub mod memory;

#[cfg(feature = "wav")]
pub mod wav;

pub use memory::MemorySource;

#[cfg(feature = "wav")]
pub use wav::WavSource;

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Shape of a stream, read once when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub channel_count: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved samples across all channels.
    pub total_samples: u64,
}

impl StreamDescriptor {
    /// Nominal playback length in seconds (`0.0` for a degenerate descriptor).
    pub fn duration_secs(&self) -> f64 {
        if self.channel_count == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f64 / f64::from(self.channel_count) / f64::from(self.sample_rate)
    }
}

/// Contract for PCM providers.
pub trait SampleSource {
    /// Stream shape. Must not change over the life of the source.
    fn descriptor(&self) -> StreamDescriptor;

    /// Fill `buf` with the next interleaved samples.
    ///
    /// Returns how many samples were written. A count below `buf.len()` means
    /// the stream is exhausted; it is not an error.
    ///
    /// # Errors
    /// `MeterError::Source` when the underlying read fails outright.
    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize>;

    /// Release the underlying handle. Must be idempotent.
    fn close(&mut self) {}
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn descriptor(&self) -> StreamDescriptor {
        (**self).descriptor()
    }

    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize> {
        (**self).read_block(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Closes the wrapped source when dropped.
pub struct SourceGuard<S: SampleSource> {
    source: S,
}

impl<S: SampleSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: SampleSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: SampleSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SampleSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}
