use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use soundbeat_core::{
    run, ChannelSink, JsonLinesSink, MemorySource, MeterError, MeteringConfig, MeteringPipeline,
    MetricRecord, SampleSource, Sink, StopReason, StreamDescriptor, WavSource,
};

/// Stereo 16-bit WAV where left is a constant level and right carries one
/// full-scale click per second.
fn write_click_track(path: &Path, seconds: u32, sample_rate: u32) {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for frame in 0..seconds * sample_rate {
        writer.write_sample(8_192i16).expect("left");
        let right = if frame % sample_rate == 0 { -32_768i16 } else { 0 };
        writer.write_sample(right).expect("right");
    }
    writer.finalize().expect("finalize wav");
}

struct CollectSink(Vec<MetricRecord>);

impl Sink for CollectSink {
    fn publish(&mut self, record: MetricRecord) -> Result<(), MeterError> {
        self.0.push(record);
        Ok(())
    }
}

#[test]
fn wav_file_is_metered_block_by_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_click_track(&path, 2, 8_000);

    let cfg = MeteringConfig {
        period: Duration::from_millis(100),
        ..Default::default()
    };
    let mut sink = CollectSink(Vec::new());
    let summary = run(WavSource::open(&path).unwrap(), cfg, &mut sink).unwrap();

    assert_eq!(summary.block_size, 1_600);
    assert_eq!(summary.blocks_emitted, 20);
    assert_eq!(summary.stream_duration, Duration::from_secs(2));

    for record in &sink.0 {
        assert!((record.peaks[0] - 25.0).abs() < 1e-6);
    }
    // Clicks land in the first block of each second.
    let clicked: Vec<u64> = sink
        .0
        .iter()
        .filter(|r| r.peaks[1] > 99.0)
        .map(|r| r.seq)
        .collect();
    assert_eq!(clicked, vec![1, 11]);
}

#[test]
fn json_lines_output_carries_left_and_right() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_click_track(&path, 1, 8_000);

    let mut sink = JsonLinesSink::new(Vec::new(), "clicks.wav");
    let summary = run(WavSource::open(&path).unwrap(), MeteringConfig::default(), &mut sink).unwrap();
    assert_eq!(summary.blocks_emitted, 100);

    let out = String::from_utf8(sink.into_inner()).unwrap();
    let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
    assert_eq!(first["type"], "clicks.wav");
    assert_eq!(first["sample"], 1);
    assert_eq!(first["right"], 100.0);
    assert_eq!(out.lines().count(), 100);
}

#[test]
fn backdated_run_ends_no_later_than_start() {
    // 3 s of stereo at 1 kHz, 10 ms blocks → 300 records.
    let source = MemorySource::new(vec![0.1; 6_000], 2, 1_000);
    let cfg = MeteringConfig {
        backdate: true,
        ..Default::default()
    };
    let mut sink = CollectSink(Vec::new());
    let summary = run(source, cfg, &mut sink).unwrap();

    let records = &sink.0;
    assert_eq!(records.len(), 300);
    let expected_first = summary.started_at - TimeDelta::seconds(3) + TimeDelta::milliseconds(10);
    assert_eq!(records[0].timestamp, expected_first);
    let last = records.last().unwrap().timestamp;
    assert!(last <= summary.started_at);
    assert!(last <= Utc::now());
}

#[test]
fn zoomed_backdated_timestamps_stay_evenly_spaced() {
    let source = MemorySource::new(vec![0.1; 2_000], 2, 1_000);
    let cfg = MeteringConfig {
        period: Duration::from_millis(10),
        zoom: 4.0,
        backdate: true,
    };
    let mut sink = CollectSink(Vec::new());
    run(source, cfg, &mut sink).unwrap();

    for pair in sink.0.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, TimeDelta::milliseconds(40));
        assert_eq!(pair[1].seq - pair[0].seq, 1);
    }
}

#[test]
fn stop_from_another_thread_halts_after_current_block() {
    let source = MemorySource::new(vec![0.3; 2_000_000], 2, 1_000);
    let pipeline = MeteringPipeline::new(MeteringConfig::default());
    let stop = pipeline.stop_signal();
    let (mut sink, rx) = ChannelSink::bounded(1);

    let handle = thread::spawn(move || pipeline.run(source, &mut sink));

    for expected in 1..=3u64 {
        let record = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(record.seq, expected);
    }
    stop.stop();
    let rest: Vec<MetricRecord> = rx.iter().collect();

    let summary = handle.join().expect("pipeline thread panicked").unwrap();
    assert_eq!(summary.stop_reason, StopReason::Stopped);
    assert_eq!(summary.blocks_emitted, 3 + rest.len() as u64);
    // At most the block already in flight plus the buffered one.
    assert!(rest.len() <= 2, "got {} records after stop", rest.len());
}

struct TrackedSource {
    inner: MemorySource,
    closes: Arc<AtomicUsize>,
}

impl SampleSource for TrackedSource {
    fn descriptor(&self) -> StreamDescriptor {
        self.inner.descriptor()
    }

    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize, MeterError> {
        self.inner.read_block(buf)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

#[test]
fn source_is_closed_on_every_exit_path() {
    let closes = Arc::new(AtomicUsize::new(0));
    let tracked = |samples: Vec<f32>| TrackedSource {
        inner: MemorySource::new(samples, 2, 1_000),
        closes: Arc::clone(&closes),
    };

    // Normal end of stream.
    run(tracked(vec![0.0; 100]), MeteringConfig::default(), &mut CollectSink(Vec::new())).unwrap();

    // Config error before the first read.
    let bad = MeteringConfig {
        period: Duration::from_micros(1),
        ..Default::default()
    };
    assert!(run(tracked(vec![0.0; 100]), bad, &mut CollectSink(Vec::new())).is_err());

    // Sink failure mid-run.
    let (mut dead, rx) = ChannelSink::unbounded();
    drop(rx);
    assert!(run(tracked(vec![0.0; 100]), MeteringConfig::default(), &mut dead).is_err());

    assert_eq!(closes.load(Ordering::SeqCst), 3);
}
