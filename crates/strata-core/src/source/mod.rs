//! Sample source boundary
//!
//! Every slice owns its own seekable cursor into the shared recording: the
//! same file opened once per slice, four independent read positions. The
//! contract is deliberately small — describe, seek, read — so the engine's
//! two-phase wraparound read works against any backing store.

mod wav;

use std::time::Duration;

use thiserror::Error;

pub use wav::WavSource;

/// Minimum accepted source duration
pub const MIN_SOURCE_DURATION: Duration = Duration::from_secs(10);

/// Maximum accepted source duration (exclusive)
pub const MAX_SOURCE_DURATION: Duration = Duration::from_secs(300);

/// Immutable facts about an opened source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Total frame count (one frame = one stereo sample pair)
    pub total_frames: u64,
    /// Channel count (the engine requires stereo)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl SourceInfo {
    /// Duration of the source in seconds
    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.sample_rate as f64
    }
}

/// Errors from the source boundary
#[derive(Error, Debug)]
pub enum SourceError {
    /// File missing, unreadable, or not a supported layout — fatal at startup
    #[error("failed to open source: {0}")]
    Open(String),

    /// Source duration outside the accepted window — fatal at startup
    #[error("source is {0:.1}s long, must be at least 10s and under 300s")]
    Duration(f64),

    /// Seek or read failure after a successful open
    #[error("source read failed: {0}")]
    Read(String),
}

/// One seekable cursor into the shared recording
///
/// `read_frames` advances the cursor and may return fewer frames than
/// requested at end of file; the caller is responsible for wraparound.
pub trait SampleSource: Send {
    /// Facts about the source (constant after open)
    fn info(&self) -> SourceInfo;

    /// Position the cursor at an absolute frame offset
    fn seek(&mut self, frame: u64) -> Result<(), SourceError>;

    /// Read up to `frames` stereo frames into `out` as interleaved f32.
    ///
    /// `out` must hold at least `frames * 2` samples. Returns the number of
    /// whole frames read, which is less than `frames` only at end of file.
    fn read_frames(&mut self, out: &mut [f32], frames: usize) -> Result<usize, SourceError>;
}

/// Validate the startup duration contract: `10s <= duration < 300s`
pub fn validate_duration(info: &SourceInfo) -> Result<(), SourceError> {
    let secs = info.duration_secs();
    if secs < MIN_SOURCE_DURATION.as_secs_f64() || secs >= MAX_SOURCE_DURATION.as_secs_f64() {
        return Err(SourceError::Duration(secs));
    }
    Ok(())
}

/// A preloaded, in-memory stereo source
///
/// Useful for feeding the engine from a buffer instead of a file, and as the
/// test double for the scheduling logic. Performs no duration validation.
pub struct MemorySource {
    /// Interleaved stereo samples [L, R, L, R, ...]
    data: Vec<f32>,
    /// Cursor position in frames
    cursor: u64,
    sample_rate: u32,
}

impl MemorySource {
    /// Wrap an interleaved stereo buffer
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        assert!(data.len() % 2 == 0, "interleaved stereo data must have even length");
        Self {
            data,
            cursor: 0,
            sample_rate,
        }
    }

    /// A silent source of the given length in frames
    pub fn silent(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames * 2], sample_rate)
    }
}

impl SampleSource for MemorySource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            total_frames: (self.data.len() / 2) as u64,
            channels: 2,
            sample_rate: self.sample_rate,
        }
    }

    fn seek(&mut self, frame: u64) -> Result<(), SourceError> {
        self.cursor = frame.min((self.data.len() / 2) as u64);
        Ok(())
    }

    fn read_frames(&mut self, out: &mut [f32], frames: usize) -> Result<usize, SourceError> {
        let total = (self.data.len() / 2) as u64;
        let available = (total - self.cursor.min(total)) as usize;
        let n = frames.min(available);
        let start = self.cursor as usize * 2;
        out[..n * 2].copy_from_slice(&self.data[start..start + n * 2]);
        self.cursor += n as u64;
        Ok(n)
    }
}
