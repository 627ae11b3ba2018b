//! # soundbeat-core
//!
//! Peak-level metering engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! SampleSource ──► MeteringPipeline ──────────────────────────► Sink
//!                    │ compute_block_size (once)
//!                    └─ loop: read_block → PeakMeter → Clock → MetricRecord
//! ```
//!
//! `MeterEngine` wraps one pipeline run in a blocking worker with
//! start/stop/wait semantics. The pipeline itself is a plain synchronous call
//! and can be used without a runtime.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod meter;
pub mod planner;
pub mod sink;
pub mod source;

// Convenience re-exports for downstream crates
pub use config::{parse_duration, MeteringConfig};
pub use engine::pipeline::{run, MeteringPipeline, RunSummary, StopReason, StopSignal};
pub use engine::MeterEngine;
pub use error::{ErrorKind, MeterError, RunError};
pub use events::{MeterEvent, MeterStatus, MeterStatusEvent, MetricRecord};
pub use meter::{compute_peaks, PeakReading};
pub use planner::compute_block_size;
pub use sink::{ChannelSink, JsonLinesSink, Sink};
pub use source::{MemorySource, SampleSource, StreamDescriptor};

#[cfg(feature = "wav")]
pub use source::WavSource;
