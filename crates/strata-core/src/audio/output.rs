//! CPAL output stream - the real-time entry point
//!
//! The output stream's callback owns the [`AudioEngine`] exclusively. Each
//! invocation drains the command queue, renders one block, and copies it to
//! the device buffer. Control threads talk to the engine only through the
//! lock-free command queue and read state only through the slice atomics,
//! so the callback never contends on a lock held elsewhere.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::engine::{
    command_channel, AudioEngine, CommandSender, EngineCommand, SliceAtomics, MAX_BLOCK_FRAMES,
};
use crate::types::{StereoBuffer, NUM_SLICES};

use super::config::{AudioConfig, DEFAULT_SAMPLE_RATE};
use super::device::{default_output_device, find_output_device};
use super::error::{AudioError, AudioResult};

/// Handle keeping the output stream alive
///
/// Dropping the handle stops the callback and only then releases the engine
/// and the slice source handles: stream first, sources last, so a closed
/// handle is never read from.
pub struct AudioHandle {
    stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Everything the control thread needs after startup
pub struct AudioSystem {
    /// Keeps audio alive; consumed by [`AudioSystem::shutdown`]
    pub handle: AudioHandle,
    /// Lock-free command sender
    pub command_sender: CommandSender,
    /// Per-slice lock-free state mirrors
    pub slice_atomics: [Arc<SliceAtomics>; NUM_SLICES],
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub latency_ms: f32,
}

impl AudioSystem {
    /// Stop the stream, wait out the in-flight callback, then release the
    /// engine and its source handles.
    pub fn shutdown(self) {
        if let Err(e) = self.handle.stream.pause() {
            log::warn!("failed to pause audio stream: {}", e);
        }
        // dropping the stream tears down the callback and, with it, the
        // engine and the slice sources
        drop(self.handle);
        log::info!("audio system stopped");
    }
}

/// Callback-owned state: the engine plus its pre-allocated output block
struct CallbackState {
    engine: AudioEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    out: StereoBuffer,
}

impl CallbackState {
    fn new(engine: AudioEngine, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            engine,
            command_rx,
            out: StereoBuffer::silence(MAX_BLOCK_FRAMES),
        }
    }

    /// One tick: drain commands, then render a block
    fn process(&mut self, n_frames: usize) {
        self.out.set_len_from_capacity(n_frames.min(MAX_BLOCK_FRAMES));
        self.engine.process_commands(&mut self.command_rx);
        self.engine.render(&mut self.out);
    }
}

/// Start the audio system: build and start the output stream around an
/// engine.
///
/// Returns the handle, the command sender, and the slice atomics. A failure
/// here is terminal — there is no automatic retry.
pub fn start_audio_system(engine: AudioEngine, config: &AudioConfig) -> AudioResult<AudioSystem> {
    let device = match &config.device {
        Some(name) => find_output_device(name)?,
        None => default_output_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    log::info!("using audio device: {}", device_name);

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let buffer_size = config
        .buffer_size
        .frames()
        .clamp(64, MAX_BLOCK_FRAMES as u32);

    let supported = select_output_config(&device, target_rate)?;
    let sample_rate = supported.sample_rate().0;
    if sample_rate != target_rate {
        log::warn!(
            "device negotiated {} Hz instead of {} Hz; playback will be off-pitch",
            sample_rate,
            target_rate
        );
    }

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    log::info!(
        "audio config: {} channels, {} Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    let slice_atomics = engine.slice_atomics();
    let (command_tx, command_rx) = command_channel();

    let state = Arc::new(Mutex::new(CallbackState::new(engine, command_rx)));
    let stream = build_output_stream(&device, &stream_config, state)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("audio stream started");

    Ok(AudioSystem {
        handle: AudioHandle {
            stream,
            sample_rate,
            buffer_size,
        },
        command_sender: CommandSender {
            producer: command_tx,
        },
        slice_atomics,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// Pick an f32 stereo configuration at the requested rate, falling back to
/// whatever stereo-capable configuration the device offers.
fn select_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if configs.is_empty() {
        return Err(AudioError::ConfigError(
            "no supported output configurations".to_string(),
        ));
    }

    let best = configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0)
        .or_else(|| configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| configs.first())
        .ok_or_else(|| AudioError::ConfigError("no usable output configuration".to_string()))?;

    let rate = if target_rate >= best.min_sample_rate().0 && target_rate <= best.max_sample_rate().0
    {
        cpal::SampleRate(target_rate)
    } else {
        best.max_sample_rate()
    };

    Ok(best.clone().with_sample_rate(rate))
}

/// Build the output stream around the callback state
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<CallbackState>>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut state = match state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let n_frames = data.len() / channels;

                state.process(n_frames);

                if channels == 2 {
                    // stereo device: the block is already interleaved
                    let interleaved = state.out.as_interleaved();
                    let n = data.len().min(interleaved.len());
                    data[..n].copy_from_slice(&interleaved[..n]);
                    data[n..].fill(0.0);
                } else {
                    let samples = state.out.as_slice();
                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        if i < samples.len() {
                            frame[0] = samples[i].left;
                            if channels > 1 {
                                frame[1] = samples[i].right;
                            }
                            for ch in frame.iter_mut().skip(2) {
                                *ch = 0.0;
                            }
                        } else {
                            frame.fill(0.0);
                        }
                    }
                }
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
