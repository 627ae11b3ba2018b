//! Emission clock: which timestamp each metered block carries.
//!
//! Timestamps are virtual. Each block advances the clock by
//! `period × zoom`, independent of how long the block took to process.
//! With `backdate`, the origin is moved into the past by the stream duration
//! so a pre-recorded file never produces timestamps ahead of wall-clock time.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::MeteringConfig;

/// Clock origin for a run.
pub fn initial_timestamp(now: DateTime<Utc>, stream_duration_secs: f64, backdate: bool) -> DateTime<Utc> {
    if !backdate {
        return now;
    }
    now - TimeDelta::nanoseconds(secs_to_nanos(stream_duration_secs))
}

/// `current + period × zoom`, truncated to whole nanoseconds.
pub fn advance(current: DateTime<Utc>, period: Duration, zoom: f64) -> DateTime<Utc> {
    current + TimeDelta::nanoseconds(scaled_nanos(period, zoom))
}

fn secs_to_nanos(secs: f64) -> i64 {
    let nanos = secs * 1e9;
    if nanos >= i64::MAX as f64 {
        i64::MAX
    } else if nanos <= 0.0 {
        0
    } else {
        nanos as i64
    }
}

fn scaled_nanos(period: Duration, zoom: f64) -> i64 {
    MeteringConfig {
        period,
        zoom,
        backdate: false,
    }
    .step_nanos()
}

/// Drift-free block clock.
///
/// Tick `n` is `origin + n × step` computed from integers, so the emitted
/// sequence is an exact arithmetic progression however long the run is.
#[derive(Debug, Clone)]
pub struct Clock {
    origin: DateTime<Utc>,
    step_nanos: i64,
    ticks: u64,
    current: DateTime<Utc>,
}

impl Clock {
    pub fn new(origin: DateTime<Utc>, period: Duration, zoom: f64) -> Self {
        Self {
            origin,
            step_nanos: scaled_nanos(period, zoom),
            ticks: 0,
            current: origin,
        }
    }

    /// Build the clock for a run, applying the configured backdate.
    pub fn start(now: DateTime<Utc>, stream_duration_secs: f64, config: &MeteringConfig) -> Self {
        Self::new(
            initial_timestamp(now, stream_duration_secs, config.backdate),
            config.period,
            config.zoom,
        )
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Timestamp of the most recent tick (the origin before the first one).
    pub fn current(&self) -> DateTime<Utc> {
        self.current
    }

    /// Advance by one block and return the new timestamp.
    ///
    /// Returns `None`, leaving the clock where it was, once `ticks × step`
    /// no longer fits in an `i64` of nanoseconds or leaves chrono's range.
    pub fn tick(&mut self) -> Option<DateTime<Utc>> {
        let next = self.ticks.checked_add(1)?;
        let offset = i64::try_from(next).ok()?.checked_mul(self.step_nanos)?;
        let timestamp = self
            .origin
            .checked_add_signed(TimeDelta::nanoseconds(offset))?;
        self.ticks = next;
        self.current = timestamp;
        Some(timestamp)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Virtual time covered by all ticks so far.
    pub fn elapsed(&self) -> TimeDelta {
        self.current - self.origin
    }
}
