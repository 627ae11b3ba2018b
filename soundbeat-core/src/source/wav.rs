//! WAV file source backed by `hound`.
//!
//! Integer PCM is normalised by its full-scale value `2^(bits - 1)`, so every
//! supported bit depth lands in [-1.0, 1.0). IEEE float files pass through.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use super::{SampleSource, StreamDescriptor};
use crate::error::{MeterError, Result};

pub struct WavSource {
    /// `None` once closed.
    reader: Option<WavReader<BufReader<File>>>,
    descriptor: StreamDescriptor,
    format: SampleFormat,
    scale: f32,
    path: PathBuf,
}

impl WavSource {
    /// Open a WAV file for metering.
    ///
    /// # Errors
    /// `MeterError::Source` if the file is missing or not a readable WAV.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .map_err(|e| MeterError::Source(format!("failed to open {}: {e}", path.display())))?;
        let spec = reader.spec();

        let descriptor = StreamDescriptor {
            channel_count: spec.channels,
            sample_rate: spec.sample_rate,
            total_samples: u64::from(reader.len()),
        };
        let scale = match spec.sample_format {
            SampleFormat::Float => 1.0,
            SampleFormat::Int => (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32,
        };

        info!(
            path = %path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            total_samples = descriptor.total_samples,
            "opened wav source"
        );

        Ok(Self {
            reader: Some(reader),
            descriptor,
            format: spec.sample_format,
            scale,
            path: path.to_path_buf(),
        })
    }
}

impl SampleSource for WavSource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn read_block(&mut self, buf: &mut [f32]) -> Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        let mut written = 0;
        match self.format {
            SampleFormat::Float => {
                for (slot, sample) in buf.iter_mut().zip(reader.samples::<f32>()) {
                    *slot = sample.map_err(|e| MeterError::Source(e.to_string()))?;
                    written += 1;
                }
            }
            SampleFormat::Int => {
                let scale = self.scale;
                for (slot, sample) in buf.iter_mut().zip(reader.samples::<i32>()) {
                    let value = sample.map_err(|e| MeterError::Source(e.to_string()))?;
                    *slot = value as f32 / scale;
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "closed wav source");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hound::{WavSpec, WavWriter};

    fn write_i16(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).expect("create wav");
        for &s in samples {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn reports_descriptor_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_i16(&path, 2, &[0; 16]);

        let src = WavSource::open(&path).unwrap();
        let desc = src.descriptor();
        assert_eq!(desc.channel_count, 2);
        assert_eq!(desc.sample_rate, 8_000);
        assert_eq!(desc.total_samples, 16);
    }

    #[test]
    fn normalises_sixteen_bit_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.wav");
        write_i16(&path, 2, &[16_384, -32_768, 0, 8_192]);

        let mut src = WavSource::open(&path).unwrap();
        let mut buf = [0.0f32; 4];
        assert_eq!(src.read_block(&mut buf).unwrap(), 4);
        assert_relative_eq!(buf[0], 0.5);
        assert_relative_eq!(buf[1], -1.0);
        assert_relative_eq!(buf[2], 0.0);
        assert_relative_eq!(buf[3], 0.25);
    }

    #[test]
    fn float_samples_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.125f32, -0.5, 0.75] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let mut src = WavSource::open(&path).unwrap();
        let mut buf = [0.0f32; 8];
        assert_eq!(src.read_block(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[0.125, -0.5, 0.75]);
    }

    #[test]
    fn short_read_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_i16(&path, 2, &[100; 6]);

        let mut src = WavSource::open(&path).unwrap();
        let mut buf = [0.0f32; 4];
        assert_eq!(src.read_block(&mut buf).unwrap(), 4);
        assert_eq!(src.read_block(&mut buf).unwrap(), 2);
        assert_eq!(src.read_block(&mut buf).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WavSource::open(dir.path().join("nope.wav")).err().unwrap();
        assert!(matches!(err, MeterError::Source(_)));
    }

    #[test]
    fn closed_source_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closed.wav");
        write_i16(&path, 1, &[1, 2, 3]);

        let mut src = WavSource::open(&path).unwrap();
        src.close();
        src.close();
        let mut buf = [0.0f32; 3];
        assert_eq!(src.read_block(&mut buf).unwrap(), 0);
    }
}
