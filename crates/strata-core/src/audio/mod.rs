//! Audio output boundary
//!
//! Builds the CPAL output stream around the engine. The design is
//! lock-free end to end:
//!
//! - the control thread sends commands through an SPSC ring buffer
//! - the audio callback owns the engine exclusively
//! - state flows back through relaxed atomics and the observer tap

mod config;
mod device;
mod error;
mod output;

pub use config::{AudioConfig, BufferSize, DEFAULT_SAMPLE_RATE};
pub use device::{default_output_device, find_output_device, output_device_names};
pub use error::{AudioError, AudioResult};
pub use output::{start_audio_system, AudioHandle, AudioSystem};
