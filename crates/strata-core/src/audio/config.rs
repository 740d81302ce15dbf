//! Audio backend configuration

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_BLOCK_FRAMES;

/// Sample rate assumed when neither config nor source dictates one
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Preferred block size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Ask for the engine's default block size
    #[default]
    Default,
    /// Request a specific size in frames (the device may adjust it)
    Fixed(u32),
}

impl BufferSize {
    /// Resolve to a concrete frame count
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BLOCK_FRAMES as u32,
            BufferSize::Fixed(frames) => *frames,
        }
    }
}

/// Configuration for the audio output boundary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device name as reported by the host (None = system default)
    pub device: Option<String>,
    /// Preferred block size
    #[serde(default)]
    pub buffer_size: BufferSize,
    /// Preferred sample rate; normally the source's rate, so the recording
    /// plays at pitch without resampling
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Request a specific block size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Request a specific sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Select an output device by name
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }
}
