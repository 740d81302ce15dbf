//! Audio backend error types

use thiserror::Error;

/// Errors from the audio output boundary
///
/// All of these are reported without retry; the engine does not enter
/// steady state if the stream fails to start.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output devices available
    #[error("no audio output devices found")]
    NoDevices,

    /// Failed to resolve the default device
    #[error("failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// A configured device name did not match anything
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to negotiate a stream configuration
    #[error("failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build the output stream
    #[error("failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start or stop the stream
    #[error("failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
