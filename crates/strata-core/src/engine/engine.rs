//! The audio engine - ties slices, spectral filter, and mixer together
//!
//! One `AudioEngine` is constructed on the control thread and then owned
//! exclusively by the audio thread. Every tick runs a strict sequence:
//! drain commands, fill each slice's block (with end-of-file wraparound),
//! check loop points, spectrally shape the in-scope slices, mix, publish to
//! the observer tap, and mirror state into the slice atomics. Nothing in
//! the tick allocates or blocks beyond the bounded source reads.

use std::sync::Arc;

use crate::config::{EngineConfig, FilterScope};
use crate::source::{SampleSource, SourceError};
use crate::types::{SliceId, StereoBuffer, NUM_SLICES};

use super::command::EngineCommand;
use super::mixer::Mixer;
use super::slice::{Slice, SliceAtomics};
use super::spectral::{SpectralFilter, HOP_SIZE};
use super::tap::BlockTap;

/// Block size requested from the audio device, in frames
pub const DEFAULT_BLOCK_FRAMES: usize = 2048;

/// Largest block the engine pre-allocates for; callbacks never exceed this
pub const MAX_BLOCK_FRAMES: usize = 8192;

/// The four-slice looping sampler engine
pub struct AudioEngine {
    slices: [Slice; NUM_SLICES],
    /// Receiver of parameter-edit commands
    selected: SliceId,
    mixer: Mixer,
    spectral: SpectralFilter,
    scope: FilterScope,
    tap: BlockTap,
}

impl AudioEngine {
    /// Build an engine over four pre-opened cursors into the same recording.
    ///
    /// Sources must already have passed duration validation; slices seed
    /// their start offsets at 0, 1/4, 1/2, and 3/4 of the recording.
    pub fn new(
        sources: [Box<dyn SampleSource>; NUM_SLICES],
        config: &EngineConfig,
        tap: BlockTap,
    ) -> Result<Self, SourceError> {
        let mut slices = Vec::with_capacity(NUM_SLICES);
        for (i, source) in sources.into_iter().enumerate() {
            slices.push(Slice::new(SliceId::ALL[i], source)?);
        }
        let slices: [Slice; NUM_SLICES] = match slices.try_into() {
            Ok(s) => s,
            Err(_) => unreachable!("slice count is fixed"),
        };

        Ok(Self {
            slices,
            selected: SliceId::A,
            mixer: Mixer::new(),
            spectral: SpectralFilter::new(),
            scope: config.filter_scope,
            tap,
        })
    }

    /// The slice currently receiving parameter edits
    pub fn selected(&self) -> SliceId {
        self.selected
    }

    /// Shared lock-free state mirrors for all slices, in slice order
    pub fn slice_atomics(&self) -> [Arc<SliceAtomics>; NUM_SLICES] {
        std::array::from_fn(|i| self.slices[i].atomics())
    }

    /// Borrow a slice (tests and diagnostics)
    pub fn slice(&self, id: SliceId) -> &Slice {
        &self.slices[id.index()]
    }

    /// Drain and apply every pending command.
    ///
    /// Called by the audio thread at the start of each tick, before any
    /// buffer work, so a multi-command edit lands between blocks.
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        if let EngineCommand::SelectSlice(id) = cmd {
            self.selected = id;
            return;
        }

        let slice = &mut self.slices[self.selected.index()];
        match cmd {
            EngineCommand::SelectSlice(_) => {}
            EngineCommand::TogglePlay => slice.toggle_play(),
            EngineCommand::ToggleMute => slice.toggle_mute(),
            EngineCommand::Nudge { frames } => slice.nudge(frames),
            EngineCommand::GrowLoop => slice.grow_loop(),
            EngineCommand::ShrinkLoop => slice.shrink_loop(),
            EngineCommand::VolumeUp => slice.volume_up(),
            EngineCommand::VolumeDown => slice.volume_down(),
            EngineCommand::LowpassUp => slice.lowpass_up(),
            EngineCommand::LowpassDown => slice.lowpass_down(),
            EngineCommand::HighpassUp => slice.highpass_up(),
            EngineCommand::HighpassDown => slice.highpass_down(),
        }
    }

    /// Produce one block of mixed output.
    ///
    /// `out.len()` sets the block size; it must stay within
    /// [`MAX_BLOCK_FRAMES`] and, for gapless spectral shaping, be a
    /// multiple of the hop size.
    pub fn render(&mut self, out: &mut StereoBuffer) {
        debug_assert!(out.len() <= MAX_BLOCK_FRAMES);
        let frames = out.len().min(MAX_BLOCK_FRAMES);

        // block reads; slices under the filter read one hop of look-ahead
        for slice in &mut self.slices {
            let lookahead = if self.scope.includes(slice.id()) {
                HOP_SIZE
            } else {
                0
            };
            slice.fill_block(frames, lookahead);
        }

        // loop-point check; a reset redirects the next tick's read
        for slice in &mut self.slices {
            slice.check_loop_reset();
        }

        // spectral shaping, per channel, in place
        for i in 0..NUM_SLICES {
            if !self.scope.includes(SliceId::ALL[i]) {
                continue;
            }
            let slice = &mut self.slices[i];
            let (lowpass, highpass) = (slice.lowpass(), slice.highpass());
            slice.split_channels(frames + HOP_SIZE);
            let (left, right, state) = slice.filter_channels(frames + HOP_SIZE);
            self.spectral
                .process(left, &mut state.left, lowpass, highpass, frames);
            self.spectral
                .process(right, &mut state.right, lowpass, highpass, frames);
            slice.join_channels(frames);
        }

        // mix; this advances every slice's loop counter
        self.mixer.process(&mut self.slices, out);

        // hand the block to the observer; drops rather than waits
        self.tap.publish(out.as_slice());

        for slice in &self.slices {
            slice.sync_counter_atomic();
        }
    }
}
