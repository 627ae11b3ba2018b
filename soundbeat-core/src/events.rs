//! Records and status events produced by a metering run.
//!
//! | Type | Produced by |
//! |------|-------------|
//! | `MetricRecord` | pipeline, one per complete block |
//! | `MeterEvent` | `MetricRecord::to_event`, the external shape written by sinks |
//! | `MeterStatusEvent` | `MeterEngine`, on every status change |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meter::PeakReading;

// ---------------------------------------------------------------------------
// Metric records
// ---------------------------------------------------------------------------

/// One metered block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    /// Sequence number, starting at 1 for the first block of a run.
    pub seq: u64,
    /// Virtual timestamp of the block.
    pub timestamp: DateTime<Utc>,
    /// Peak of each channel on a percentage scale (peak × 100), by channel index.
    pub peaks: Vec<f64>,
}

impl MetricRecord {
    pub fn new(seq: u64, timestamp: DateTime<Utc>, readings: &[PeakReading]) -> Self {
        let mut peaks = vec![0.0; readings.len()];
        for reading in readings {
            if let Some(slot) = peaks.get_mut(reading.channel) {
                *slot = f64::from(reading.peak) * 100.0;
            }
        }
        Self {
            seq,
            timestamp,
            peaks,
        }
    }

    /// Build a record from raw per-channel peaks indexed by channel.
    pub fn from_peaks(seq: u64, timestamp: DateTime<Utc>, peaks: &[f32]) -> Self {
        Self {
            seq,
            timestamp,
            peaks: peaks.iter().map(|&p| f64::from(p) * 100.0).collect(),
        }
    }

    /// External representation tagged with the stream's name.
    pub fn to_event(&self, name: &str) -> MeterEvent {
        let count = self.peaks.len();
        MeterEvent {
            timestamp: self.timestamp,
            kind: name.to_string(),
            sample: self.seq,
            channels: self
                .peaks
                .iter()
                .enumerate()
                .map(|(idx, &pct)| (channel_label(idx, count), pct))
                .collect(),
        }
    }
}

/// Field name for a channel: `mono`, `left`/`right`, or `ch<N>`.
pub fn channel_label(index: usize, channel_count: usize) -> String {
    match (channel_count, index) {
        (1, 0) => "mono".into(),
        (2, 0) => "left".into(),
        (2, 1) => "right".into(),
        _ => format!("ch{index}"),
    }
}

/// A record as published to downstream stores.
///
/// ```json
/// {"@timestamp":"2024-03-01T12:00:00.010Z","type":"song.wav","sample":1,"left":50.0,"right":90.0}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub sample: u64,
    #[serde(flatten)]
    pub channels: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted by `MeterEngine` when its state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterStatusEvent {
    pub status: MeterStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of a `MeterEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterStatus {
    /// Engine created, no run started.
    Idle,
    /// A pipeline is metering.
    Running,
    /// The last run ended because stop was requested.
    Stopped,
    /// The last run reached the end of its stream.
    Finished,
    /// The last run failed.
    Error,
}
