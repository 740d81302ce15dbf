//! Streaming WAV source
//!
//! Reads stereo WAV files through hound with frame-accurate seeking. Samples
//! are decoded incrementally at read time, so a slice's per-block read stays
//! a bounded disk operation instead of an upfront whole-file load.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{validate_duration, SampleSource, SourceError, SourceInfo};

/// How stored samples map to f32
enum SampleLayout {
    /// IEEE float samples, used as-is
    Float,
    /// Signed integer samples scaled by 1 / 2^(bits-1)
    Int { scale: f32 },
}

/// A seekable stereo WAV file source
pub struct WavSource {
    reader: hound::WavReader<BufReader<File>>,
    info: SourceInfo,
    layout: SampleLayout,
}

impl WavSource {
    /// Open a WAV file and validate the startup contract.
    ///
    /// Fails if the file is missing or malformed, is not stereo, or falls
    /// outside the accepted duration window.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        if spec.channels != 2 {
            return Err(SourceError::Open(format!(
                "{}: expected stereo, got {} channel(s)",
                path.display(),
                spec.channels
            )));
        }

        let layout = match spec.sample_format {
            hound::SampleFormat::Float => SampleLayout::Float,
            hound::SampleFormat::Int => SampleLayout::Int {
                scale: 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32,
            },
        };

        let info = SourceInfo {
            total_frames: reader.duration() as u64,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        };
        validate_duration(&info)?;

        log::info!(
            "opened {}: {} frames, {} Hz, {} bit",
            path.display(),
            info.total_frames,
            info.sample_rate,
            spec.bits_per_sample
        );

        Ok(Self {
            reader,
            info,
            layout,
        })
    }
}

impl SampleSource for WavSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<(), SourceError> {
        self.reader
            .seek(frame as u32)
            .map_err(|e| SourceError::Read(format!("seek to frame {}: {}", frame, e)))
    }

    fn read_frames(&mut self, out: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        let wanted = frames * 2;
        let mut n = 0;
        match self.layout {
            SampleLayout::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    out[n] = sample.map_err(|e| SourceError::Read(e.to_string()))?;
                    n += 1;
                }
            }
            SampleLayout::Int { scale } => {
                for sample in self.reader.samples::<i32>().take(wanted) {
                    out[n] =
                        sample.map_err(|e| SourceError::Read(e.to_string()))? as f32 * scale;
                    n += 1;
                }
            }
        }
        Ok(n / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a 16-bit stereo WAV whose left channel counts frames and whose
    /// right channel is the negated count, so positions are recognizable.
    fn write_test_wav(path: &Path, frames: u32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = (i % 1000) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(-v).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_open_validates_duration() {
        let dir = tempfile::tempdir().unwrap();

        let short = dir.path().join("short.wav");
        write_test_wav(&short, 5 * 8_000, 8_000); // 5 seconds
        assert!(matches!(
            WavSource::open(&short),
            Err(SourceError::Duration(_))
        ));

        let long = dir.path().join("long.wav");
        write_test_wav(&long, 400 * 8_000, 8_000); // 400 seconds
        assert!(matches!(
            WavSource::open(&long),
            Err(SourceError::Duration(_))
        ));

        let ok = dir.path().join("ok.wav");
        write_test_wav(&ok, 60 * 8_000, 8_000); // 60 seconds
        let src = WavSource::open(&ok).unwrap();
        assert_eq!(src.info().total_frames, 60 * 8_000);
        assert_eq!(src.info().channels, 2);
    }

    #[test]
    fn test_open_rejects_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..12 * 8_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(matches!(WavSource::open(&path), Err(SourceError::Open(_))));
    }

    #[test]
    fn test_seek_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seek.wav");
        write_test_wav(&path, 12 * 8_000, 8_000);

        let mut src = WavSource::open(&path).unwrap();
        let mut buf = vec![0.0f32; 8];

        src.seek(500).unwrap();
        let n = src.read_frames(&mut buf, 4).unwrap();
        assert_eq!(n, 4);
        // frame 500 carries (500 % 1000) / 32768 on the left
        let expected = 500.0 / 32_768.0;
        assert!((buf[0] - expected).abs() < 1e-6);
        assert!((buf[1] + expected).abs() < 1e-6);

        // a read crossing the end comes back short
        src.seek(12 * 8_000 - 2).unwrap();
        let n = src.read_frames(&mut buf, 4).unwrap();
        assert_eq!(n, 2);
    }
}
