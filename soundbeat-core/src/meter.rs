//! Per-channel peak-hold metering over interleaved blocks.
//!
//! ## Algorithm
//!
//! 1. Reset one accumulator per channel to `0.0`.
//! 2. Sample `i` belongs to channel `i % channel_count`.
//! 3. Each accumulator keeps `max(acc, |sample|)`.
//!
//! This is peak-hold, not RMS: one transient decides the reading of its
//! channel for the whole block.

/// Peak absolute amplitude of one channel within one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakReading {
    pub channel: usize,
    /// Normalised peak, nominally in [0.0, 1.0].
    pub peak: f32,
}

/// Compute the peak of every channel in an interleaved block.
///
/// Channels that receive no samples report `0.0`.
pub fn compute_peaks(block: &[f32], channel_count: usize) -> Vec<PeakReading> {
    let mut meter = PeakMeter::new(channel_count);
    meter
        .measure(block)
        .iter()
        .enumerate()
        .map(|(channel, &peak)| PeakReading { channel, peak })
        .collect()
}

/// Reusable peak accumulator.
///
/// The pipeline keeps one of these for the whole run; the accumulators are
/// reused from block to block.
#[derive(Debug, Clone)]
pub struct PeakMeter {
    peaks: Vec<f32>,
}

impl PeakMeter {
    pub fn new(channel_count: usize) -> Self {
        Self {
            peaks: vec![0.0; channel_count],
        }
    }

    /// Measure one block and return the per-channel peaks, indexed by channel.
    pub fn measure(&mut self, block: &[f32]) -> &[f32] {
        self.peaks.fill(0.0);
        let channels = self.peaks.len();
        if channels == 0 {
            return &self.peaks;
        }

        for frame in block.chunks(channels) {
            for (acc, sample) in self.peaks.iter_mut().zip(frame) {
                *acc = acc.max(sample.abs());
            }
        }
        &self.peaks
    }
}
