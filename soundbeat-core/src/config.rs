//! Metering configuration and duration-string parsing.

use std::time::Duration;

use crate::error::{MeterError, Result};

/// Default analysis block length.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// Configuration for one metering run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeteringConfig {
    /// Length of audio analysed per block. Default: 10 ms.
    pub period: Duration,
    /// Multiplier on the virtual time attributed to each block. Default: 1.0.
    ///
    /// `2.0` makes emitted timestamps advance twice as fast as playback.
    pub zoom: f64,
    /// Start the emission clock at `now - stream duration` instead of `now`.
    pub backdate: bool,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            zoom: 1.0,
            backdate: false,
        }
    }
}

impl MeteringConfig {
    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    /// `MeterError::Config` for a zero period, a non-positive or non-finite
    /// zoom, or a per-block clock step that rounds down to zero nanoseconds or
    /// does not fit in an `i64` of nanoseconds.
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(MeterError::Config("period must be greater than zero".into()));
        }
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(MeterError::Config(format!(
                "zoom must be a positive number, got {}",
                self.zoom
            )));
        }
        let Some(step) = self.checked_step_nanos() else {
            return Err(MeterError::Config(format!(
                "period {:?} with zoom {} advances the clock past the timestamp range",
                self.period, self.zoom
            )));
        };
        if step < 1 {
            return Err(MeterError::Config(format!(
                "period {:?} with zoom {} advances the clock by less than 1ns",
                self.period, self.zoom
            )));
        }
        Ok(())
    }

    /// Virtual time attributed to each block, in whole nanoseconds.
    ///
    /// Saturates at `i64::MAX`; [`validate`](Self::validate) rejects such steps.
    pub fn step_nanos(&self) -> i64 {
        self.checked_step_nanos().unwrap_or(i64::MAX)
    }

    /// `period × zoom` in whole nanoseconds, or `None` when it does not fit an `i64`.
    pub fn checked_step_nanos(&self) -> Option<i64> {
        let nanos = self.period.as_nanos() as f64 * self.zoom;
        if nanos.is_nan() || nanos >= i64::MAX as f64 {
            None
        } else {
            Some(nanos as i64)
        }
    }
}

/// Parse a duration string such as `"10ms"`, `"1.5s"`, `"250us"` or `"2m"`.
///
/// A bare number is read as seconds. Whitespace between number and unit is
/// accepted.
///
/// # Errors
/// `MeterError::Config` for empty input, an unknown unit, or a negative or
/// non-finite value.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MeterError::Config("empty duration".into()));
    }

    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic() || c == 'µ')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| MeterError::Config(format!("invalid duration: {raw:?}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(MeterError::Config(format!("invalid duration: {raw:?}")));
    }

    let nanos_per_unit: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "" | "s" => 1e9,
        "m" | "min" => 60e9,
        "h" => 3600e9,
        other => {
            return Err(MeterError::Config(format!(
                "unknown duration unit {other:?} in {raw:?}"
            )))
        }
    };

    let nanos = (value * nanos_per_unit).round();
    if nanos >= u64::MAX as f64 {
        return Err(MeterError::Config(format!("duration out of range: {raw:?}")));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ten_milliseconds_unzoomed() {
        let cfg = MeteringConfig::default();
        assert_eq!(cfg.period, Duration::from_millis(10));
        assert_eq!(cfg.zoom, 1.0);
        assert!(!cfg.backdate);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_period_and_bad_zoom() {
        let mut cfg = MeteringConfig {
            period: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(MeterError::Config(_))));

        cfg.period = Duration::from_millis(10);
        for zoom in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            cfg.zoom = zoom;
            assert!(
                matches!(cfg.validate(), Err(MeterError::Config(_))),
                "zoom={zoom} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_step_below_one_nanosecond() {
        let cfg = MeteringConfig {
            period: Duration::from_nanos(1),
            zoom: 0.5,
            backdate: false,
        };
        assert!(matches!(cfg.validate(), Err(MeterError::Config(_))));
    }

    #[test]
    fn rejects_step_beyond_timestamp_range() {
        let huge_zoom = MeteringConfig {
            period: Duration::from_millis(10),
            zoom: 1e12,
            backdate: false,
        };
        assert_eq!(huge_zoom.checked_step_nanos(), None);
        assert!(matches!(huge_zoom.validate(), Err(MeterError::Config(_))));

        let huge_period = MeteringConfig {
            period: Duration::MAX,
            ..Default::default()
        };
        assert!(matches!(huge_period.validate(), Err(MeterError::Config(_))));
    }

    #[test]
    fn step_applies_zoom() {
        let cfg = MeteringConfig {
            period: Duration::from_millis(10),
            zoom: 2.0,
            backdate: false,
        };
        assert_eq!(cfg.step_nanos(), 20_000_000);
    }

    #[test]
    fn parses_common_units() {
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration(" 250 us ").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("100ns").unwrap(), Duration::from_nanos(100));
    }

    #[test]
    fn rejects_garbage_durations() {
        for raw in ["", "ms", "10 parsecs", "-5ms", "abc"] {
            assert!(
                matches!(parse_duration(raw), Err(MeterError::Config(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
