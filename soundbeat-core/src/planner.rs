//! Block sizing: how many interleaved samples make up one analysis period.

use std::time::Duration;

use crate::error::{MeterError, Result};

/// Largest block the pipeline will allocate, in interleaved samples (1 GiB of `f32`).
pub const MAX_BLOCK_SAMPLES: usize = 1 << 28;

/// Number of interleaved samples to read per block.
///
/// `period × sample_rate × channel_count` is rounded half-up, then trimmed to
/// a whole number of frames so every block starts on channel 0.
///
/// # Errors
/// `MeterError::Config` if `sample_rate` or `channel_count` is zero, if the
/// period is too short to hold a single frame, or if the block would exceed
/// [`MAX_BLOCK_SAMPLES`].
pub fn compute_block_size(sample_rate: u32, channel_count: u16, period: Duration) -> Result<usize> {
    if sample_rate == 0 {
        return Err(MeterError::Config("sample rate must be positive".into()));
    }
    if channel_count == 0 {
        return Err(MeterError::Config("channel count must be positive".into()));
    }

    let channels = usize::from(channel_count);
    let raw = (period.as_secs_f64() * f64::from(sample_rate) * channels as f64 + 0.5).floor();
    if !raw.is_finite() || raw > MAX_BLOCK_SAMPLES as f64 {
        return Err(MeterError::Config(format!(
            "period {period:?} needs more than {MAX_BLOCK_SAMPLES} samples per block at {sample_rate} Hz"
        )));
    }
    let raw = raw as usize;
    let aligned = raw - raw % channels;

    if aligned == 0 {
        return Err(MeterError::Config(format!(
            "period {period:?} is shorter than one frame at {sample_rate} Hz"
        )));
    }
    Ok(aligned)
}
