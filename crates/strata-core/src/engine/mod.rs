//! The real-time engine - slices, command queue, spectral filter, mixer
//!
//! - Slice: one looping read cursor with its own level and cutoff state
//! - EngineCommand: lock-free control handoff, drained at tick start
//! - SpectralFilter: STFT band shaping with per-slice carried state
//! - Mixer: plain sum of the four slices, drives the loop clock
//! - AudioEngine: the per-block orchestrator owned by the audio thread
//! - BlockTap: non-blocking observer boundary

mod command;
mod engine;
mod mixer;
mod slice;
mod spectral;
mod tap;

pub use command::*;
pub use engine::*;
pub use mixer::*;
pub use slice::*;
pub use spectral::*;
pub use tap::*;
