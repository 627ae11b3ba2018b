//! Blocking metering loop.
//!
//! ## Pipeline stages
//!
//! ```text
//! 0. Read the StreamDescriptor, plan the block size once
//! 1. Check the stop signal
//! 2. Read exactly block_size samples (short read → end of stream)
//! 3. Stop once elapsed_blocks × period reaches the stream duration
//! 4. PeakMeter → per-channel peaks
//! 5. Clock tick → timestamp
//! 6. MetricRecord (peaks × 100) → Sink::publish
//! ```
//!
//! The loop is synchronous and owns its source, clock, counters and buffer.
//! `MeterEngine` runs it inside `spawn_blocking`; embedding callers may call
//! [`run`] directly on any thread.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::{
    clock::Clock,
    config::MeteringConfig,
    error::{MeterError, RunError},
    events::MetricRecord,
    meter::PeakMeter,
    planner::compute_block_size,
    sink::Sink,
    source::{SampleSource, SourceGuard},
};

/// Cooperative cancellation flag, checked once per block.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MeterDiagnostics {
    pub blocks_read: AtomicU64,
    pub samples_read: AtomicU64,
    pub records_published: AtomicU64,
    pub short_reads: AtomicU64,
}

impl MeterDiagnostics {
    pub fn reset(&self) {
        self.blocks_read.store(0, Ordering::Relaxed);
        self.samples_read.store(0, Ordering::Relaxed);
        self.records_published.store(0, Ordering::Relaxed);
        self.short_reads.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub blocks_read: u64,
    pub samples_read: u64,
    pub records_published: u64,
    pub short_reads: u64,
}

/// Why the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    /// The source returned fewer samples than a full block.
    EndOfStream,
    /// `elapsed_blocks × period` reached the nominal stream duration.
    DurationElapsed,
    /// The stop signal was raised.
    Stopped,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub blocks_emitted: u64,
    /// Interleaved samples per block.
    pub block_size: usize,
    /// Nominal length of the stream from its descriptor.
    pub stream_duration: Duration,
    /// Virtual time covered by the emitted records (last timestamp − clock origin).
    pub analyzed_duration: chrono::TimeDelta,
    /// Real time the run took.
    pub wall_clock_elapsed: Duration,
    /// Wall-clock `now` the clock origin was derived from.
    pub started_at: DateTime<Utc>,
    pub stop_reason: StopReason,
}

/// A configured metering run.
pub struct MeteringPipeline {
    config: MeteringConfig,
    stop: StopSignal,
    diagnostics: Arc<MeterDiagnostics>,
}

impl MeteringPipeline {
    pub fn new(config: MeteringConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            diagnostics: Arc::new(MeterDiagnostics::default()),
        }
    }

    /// Share a stop signal with the caller.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Share diagnostics counters with the caller.
    pub fn with_diagnostics(mut self, diagnostics: Arc<MeterDiagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Meter `source` into `sink` until the stream ends, the duration budget
    /// is spent, or the stop signal is raised.
    ///
    /// The source is closed on every exit path.
    ///
    /// # Errors
    /// - `MeterError::Config` for an invalid config or degenerate block size.
    /// - `MeterError::Source` for an invalid descriptor or a failed read.
    /// - `MeterError::Sink` when publishing fails.
    ///
    /// Each carries the number of records already published.
    pub fn run<S, K>(&self, source: S, sink: &mut K) -> Result<RunSummary, RunError>
    where
        S: SampleSource,
        K: Sink + ?Sized,
    {
        let wall_start = Instant::now();
        let mut source = SourceGuard::new(source);

        self.config.validate().map_err(|e| RunError::new(e, 0))?;

        let descriptor = source.descriptor();
        if descriptor.channel_count == 0 || descriptor.sample_rate == 0 {
            return Err(RunError::new(
                MeterError::Source(format!(
                    "invalid stream: {} channels at {} Hz",
                    descriptor.channel_count, descriptor.sample_rate
                )),
                0,
            ));
        }

        let block_size = compute_block_size(
            descriptor.sample_rate,
            descriptor.channel_count,
            self.config.period,
        )
        .map_err(|e| RunError::new(e, 0))?;
        let channels = usize::from(descriptor.channel_count);
        let stream_secs = descriptor.duration_secs();
        let period_secs = self.config.period.as_secs_f64();

        let started_at = Utc::now();
        let mut clock = Clock::start(started_at, stream_secs, &self.config);

        let span = info_span!(
            "metering",
            channels,
            sample_rate = descriptor.sample_rate,
            block_size,
        );
        let _enter = span.enter();

        info!(
            duration_secs = stream_secs,
            total_samples = descriptor.total_samples,
            period = ?self.config.period,
            zoom = self.config.zoom,
            backdate = self.config.backdate,
            origin = %clock.origin(),
            "metering started"
        );

        let mut meter = PeakMeter::new(channels);
        let mut buf = vec![0f32; block_size];
        let mut seq = 0u64;
        let mut elapsed_blocks = 0u64;

        let stop_reason = loop {
            // ── 1. Stop signal ───────────────────────────────────────────
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }

            // ── 2. Read one block ────────────────────────────────────────
            let n = source
                .read_block(&mut buf)
                .map_err(|e| RunError::new(e, seq))?;
            self.diagnostics
                .samples_read
                .fetch_add(n as u64, Ordering::Relaxed);
            if n < block_size {
                self.diagnostics.short_reads.fetch_add(1, Ordering::Relaxed);
                if n > 0 {
                    debug!(samples = n, "discarding partial trailing block");
                }
                break StopReason::EndOfStream;
            }
            self.diagnostics.blocks_read.fetch_add(1, Ordering::Relaxed);

            // ── 3. Duration budget ───────────────────────────────────────
            if elapsed_blocks as f64 * period_secs >= stream_secs {
                break StopReason::DurationElapsed;
            }

            // ── 4–6. Peaks → timestamp → record → sink ───────────────────
            let peaks = meter.measure(&buf);
            let Some(timestamp) = clock.tick() else {
                warn!(seq, "clock overflowed the timestamp range");
                return Err(RunError::new(
                    MeterError::Config(format!(
                        "timestamp of block {} is out of range (zoom {})",
                        seq + 1,
                        self.config.zoom
                    )),
                    seq,
                ));
            };
            seq += 1;
            let record = MetricRecord::from_peaks(seq, timestamp, peaks);

            if let Err(e) = sink.publish(record) {
                warn!(seq, "sink rejected record: {e}");
                return Err(RunError::new(e, seq - 1));
            }
            self.diagnostics
                .records_published
                .fetch_add(1, Ordering::Relaxed);
            debug!(seq, "record published");
            elapsed_blocks += 1;
        };

        sink.flush().map_err(|e| RunError::new(e, seq))?;

        let summary = RunSummary {
            blocks_emitted: seq,
            block_size,
            stream_duration: Duration::from_secs_f64(stream_secs),
            analyzed_duration: clock.elapsed(),
            wall_clock_elapsed: wall_start.elapsed(),
            started_at,
            stop_reason,
        };

        info!(
            records = summary.blocks_emitted,
            analyzed = ?summary.analyzed_duration,
            took = ?summary.wall_clock_elapsed,
            reason = ?summary.stop_reason,
            "metering ended"
        );

        Ok(summary)
    }
}

/// Run one pipeline with a private stop signal and fresh diagnostics.
pub fn run<S, K>(source: S, config: MeteringConfig, sink: &mut K) -> Result<RunSummary, RunError>
where
    S: SampleSource,
    K: Sink + ?Sized,
{
    MeteringPipeline::new(config).run(source, sink)
}
