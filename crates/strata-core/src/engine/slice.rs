//! Slice - one independently looping read cursor into the shared recording
//!
//! Each slice owns its own source handle, loop window, and level controls.
//! The audio thread owns the `Slice` itself; the control thread observes it
//! through the lock-free [`SliceAtomics`] mirror.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::source::{SampleSource, SourceError};
use crate::types::{PlayState, SliceId, NUM_SLICES};

use super::engine::MAX_BLOCK_FRAMES;
use super::spectral::{FilterState, HOP_SIZE, WINDOW_SIZE};

/// Loop window length a fresh slice starts with, in output samples
pub const DEFAULT_LOOP_LENGTH: u64 = 100_000;

/// Grow/shrink step for the loop window; below this length, growing doubles
/// and shrinking halves instead
pub const LOOP_LENGTH_STEP: u64 = 25_000;

/// Volume a fresh slice starts with
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Volume step per command
pub const VOLUME_STEP: f32 = 0.1;

/// Notch half-width step per command, in bins
pub const LOWPASS_STEP: u32 = 5;

/// Pass-band half-width step per command, in bins
pub const HIGHPASS_STEP: u32 = 2;

/// Largest representable cutoff half-width, in bins
const CUTOFF_MAX: u32 = (WINDOW_SIZE / 2) as u32;

/// Lock-free state mirror for the control thread
///
/// The audio thread stores into these after applying commands and once per
/// tick; readers only need visibility, so everything is `Relaxed`.
pub struct SliceAtomics {
    pub playing: AtomicBool,
    pub muted: AtomicBool,
    /// f32 volume stored as its bit pattern
    pub volume: AtomicU32,
    pub start_frame: AtomicU64,
    pub loop_length: AtomicU64,
    pub loop_counter: AtomicU64,
    pub lowpass: AtomicU32,
    pub highpass: AtomicU32,
}

impl SliceAtomics {
    fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            volume: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
            start_frame: AtomicU64::new(0),
            loop_length: AtomicU64::new(DEFAULT_LOOP_LENGTH),
            loop_counter: AtomicU64::new(0),
            lowpass: AtomicU32::new(0),
            highpass: AtomicU32::new(CUTOFF_MAX),
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn start_frame(&self) -> u64 {
        self.start_frame.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loop_length(&self) -> u64 {
        self.loop_length.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loop_counter(&self) -> u64 {
        self.loop_counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lowpass(&self) -> u32 {
        self.lowpass.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn highpass(&self) -> u32 {
        self.highpass.load(Ordering::Relaxed)
    }
}

/// One of the four looping playback regions
pub struct Slice {
    id: SliceId,
    source: Box<dyn SampleSource>,
    total_frames: u64,
    /// Current read position, mirroring the source cursor
    cursor: u64,
    start_frame: u64,
    loop_length: u64,
    loop_counter: u64,
    state: PlayState,
    muted: bool,
    volume: f32,
    /// Notch half-width in bins
    lowpass: u32,
    /// Pass-band half-width in bins
    highpass: u32,
    /// Interleaved per-block read buffer, one hop oversized for look-ahead
    read_buf: Vec<f32>,
    /// De-interleaved channel work buffers for the spectral filter
    chan_left: Vec<f32>,
    chan_right: Vec<f32>,
    /// Carried previous-window state for the spectral filter
    filter_state: FilterState,
    atomics: Arc<SliceAtomics>,
}

impl Slice {
    /// Create a slice over its own cursor into the shared recording.
    ///
    /// Slices are seeded across the source: slice `A` at frame 0, `B` at a
    /// quarter, `C` at the half, `D` at three quarters.
    pub fn new(id: SliceId, mut source: Box<dyn SampleSource>) -> Result<Self, SourceError> {
        let total_frames = source.info().total_frames;
        let start_frame = id.index() as u64 * total_frames / NUM_SLICES as u64;
        source.seek(start_frame)?;

        let slice = Self {
            id,
            source,
            total_frames,
            cursor: start_frame,
            start_frame,
            loop_length: DEFAULT_LOOP_LENGTH,
            loop_counter: 0,
            state: PlayState::Stopped,
            muted: false,
            volume: DEFAULT_VOLUME,
            lowpass: 0,
            highpass: CUTOFF_MAX,
            read_buf: vec![0.0; 2 * (MAX_BLOCK_FRAMES + HOP_SIZE)],
            chan_left: vec![0.0; MAX_BLOCK_FRAMES + HOP_SIZE],
            chan_right: vec![0.0; MAX_BLOCK_FRAMES + HOP_SIZE],
            filter_state: FilterState::new(),
            atomics: Arc::new(SliceAtomics::new()),
        };
        slice.atomics.start_frame.store(start_frame, Ordering::Relaxed);
        Ok(slice)
    }

    pub fn id(&self) -> SliceId {
        self.id
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn loop_length(&self) -> u64 {
        self.loop_length
    }

    pub fn loop_counter(&self) -> u64 {
        self.loop_counter
    }

    pub fn lowpass(&self) -> u32 {
        self.lowpass
    }

    pub fn highpass(&self) -> u32 {
        self.highpass
    }

    /// Shared handle to the lock-free state mirror
    pub fn atomics(&self) -> Arc<SliceAtomics> {
        Arc::clone(&self.atomics)
    }

    /// Gain this slice contributes to the mix: `volume` gated by the play
    /// state and the orthogonal mute flag.
    #[inline]
    pub fn contribution_gain(&self) -> f32 {
        match (self.state, self.muted) {
            (PlayState::Playing, false) => self.volume,
            _ => 0.0,
        }
    }

    // ── control operations ──────────────────────────────────────────────

    pub fn toggle_play(&mut self) {
        self.state = match self.state {
            PlayState::Stopped => PlayState::Playing,
            PlayState::Playing => PlayState::Stopped,
        };
        self.atomics
            .playing
            .store(self.state == PlayState::Playing, Ordering::Relaxed);
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.atomics.muted.store(self.muted, Ordering::Relaxed);
    }

    /// Move the loop start by a signed frame count.
    ///
    /// A move that would leave the open interval `(0, total_frames)` leaves
    /// the start untouched — a complete no-op, not a clamp.
    pub fn nudge(&mut self, frames: i64) {
        let target = self.start_frame as i64 + frames;
        if target > 0 && (target as u64) < self.total_frames {
            self.start_frame = target as u64;
            self.atomics
                .start_frame
                .store(self.start_frame, Ordering::Relaxed);
        }
    }

    /// Lengthen the loop window: short windows double, longer ones step up
    /// by [`LOOP_LENGTH_STEP`] while the result stays clear of the source
    /// end.
    pub fn grow_loop(&mut self) {
        if self.loop_length < LOOP_LENGTH_STEP {
            self.loop_length *= 2;
        } else if self.loop_length + LOOP_LENGTH_STEP
            < self.total_frames.saturating_sub(LOOP_LENGTH_STEP)
        {
            self.loop_length += LOOP_LENGTH_STEP;
        }
        self.atomics
            .loop_length
            .store(self.loop_length, Ordering::Relaxed);
    }

    /// Shorten the loop window: step down by [`LOOP_LENGTH_STEP`] while the
    /// result stays positive, otherwise halve.
    pub fn shrink_loop(&mut self) {
        if self.loop_length > LOOP_LENGTH_STEP {
            self.loop_length -= LOOP_LENGTH_STEP;
        } else if self.loop_length / 2 > 0 {
            self.loop_length /= 2;
        }
        self.atomics
            .loop_length
            .store(self.loop_length, Ordering::Relaxed);
    }

    pub fn volume_up(&mut self) {
        self.set_volume(self.volume + VOLUME_STEP);
    }

    pub fn volume_down(&mut self) {
        self.set_volume(self.volume - VOLUME_STEP);
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.atomics
            .volume
            .store(self.volume.to_bits(), Ordering::Relaxed);
    }

    pub fn lowpass_up(&mut self) {
        self.lowpass = (self.lowpass + LOWPASS_STEP).min(CUTOFF_MAX);
        self.atomics.lowpass.store(self.lowpass, Ordering::Relaxed);
    }

    pub fn lowpass_down(&mut self) {
        self.lowpass = self.lowpass.saturating_sub(LOWPASS_STEP);
        self.atomics.lowpass.store(self.lowpass, Ordering::Relaxed);
    }

    pub fn highpass_up(&mut self) {
        self.highpass = (self.highpass + HIGHPASS_STEP).min(CUTOFF_MAX);
        self.atomics.highpass.store(self.highpass, Ordering::Relaxed);
    }

    pub fn highpass_down(&mut self) {
        self.highpass = self.highpass.saturating_sub(HIGHPASS_STEP);
        self.atomics.highpass.store(self.highpass, Ordering::Relaxed);
    }

    // ── per-tick scheduling ─────────────────────────────────────────────

    /// Fill the read buffer with `frames + lookahead` frames at the cursor.
    ///
    /// A short read wraps to frame 0 and tops the block up; if even the
    /// wrapped remainder falls short the tail is silenced, never left
    /// stale. A look-ahead read steps the cursor back afterwards so the
    /// next block starts right after `frames`.
    pub fn fill_block(&mut self, frames: usize, lookahead: usize) {
        let total = frames + lookahead;
        debug_assert!(total * 2 <= self.read_buf.len());

        let mut filled = match self.source.read_frames(&mut self.read_buf[..total * 2], total) {
            Ok(n) => n,
            Err(_) => 0,
        };
        self.cursor += filled as u64;

        if filled < total {
            if self.source.seek(0).is_ok() {
                self.cursor = 0;
                if let Ok(n) = self
                    .source
                    .read_frames(&mut self.read_buf[filled * 2..total * 2], total - filled)
                {
                    self.cursor = n as u64;
                    filled += n;
                }
            }
        }

        if filled < total {
            self.read_buf[filled * 2..total * 2].fill(0.0);
        }

        if lookahead > 0 {
            let back = self.cursor as i64 - lookahead as i64;
            let target = if back < 0 {
                back + self.total_frames as i64
            } else {
                back
            };
            if self.source.seek(target as u64).is_ok() {
                self.cursor = target as u64;
            }
        }
    }

    /// Rewind to the loop start once the counter has consumed the window.
    ///
    /// Called once per tick; a reset redirects the next tick's read.
    pub fn check_loop_reset(&mut self) {
        if self.loop_counter >= self.loop_length {
            if self.source.seek(self.start_frame).is_ok() {
                self.cursor = self.start_frame;
            }
            self.loop_counter = 0;
        }
    }

    /// Advance the loop counter for `frames` emitted output frames,
    /// saturating at the loop length (the next tick's check resets it).
    pub(crate) fn advance_loop_counter(&mut self, frames: usize) {
        self.loop_counter = (self.loop_counter + frames as u64).min(self.loop_length);
    }

    /// Publish the per-tick counter to the lock-free mirror
    pub(crate) fn sync_counter_atomic(&self) {
        self.atomics
            .loop_counter
            .store(self.loop_counter, Ordering::Relaxed);
    }

    /// Interleaved view of the first `frames` frames of the read buffer
    #[inline]
    pub(crate) fn frames(&self, frames: usize) -> &[f32] {
        &self.read_buf[..frames * 2]
    }

    /// Split the interleaved read buffer into the channel work buffers
    pub(crate) fn split_channels(&mut self, frames: usize) {
        for i in 0..frames {
            self.chan_left[i] = self.read_buf[2 * i];
            self.chan_right[i] = self.read_buf[2 * i + 1];
        }
    }

    /// Interleave the (filtered) channel buffers back over the read buffer
    pub(crate) fn join_channels(&mut self, frames: usize) {
        for i in 0..frames {
            self.read_buf[2 * i] = self.chan_left[i];
            self.read_buf[2 * i + 1] = self.chan_right[i];
        }
    }

    /// Mutable access to both channel buffers and the carried filter state
    pub(crate) fn filter_channels(
        &mut self,
        len: usize,
    ) -> (&mut [f32], &mut [f32], &mut FilterState) {
        (
            &mut self.chan_left[..len],
            &mut self.chan_right[..len],
            &mut self.filter_state,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const RATE: u32 = 44_100;

    fn counting_source(frames: usize) -> Box<MemorySource> {
        // left channel counts frames, right is the negated count
        let data: Vec<f32> = (0..frames)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect();
        Box::new(MemorySource::new(data, RATE))
    }

    fn slice_with(id: SliceId, frames: usize) -> Slice {
        Slice::new(id, counting_source(frames)).unwrap()
    }

    #[test]
    fn test_seeding_at_quarters() {
        let total = 400_000;
        assert_eq!(slice_with(SliceId::A, total).start_frame(), 0);
        assert_eq!(slice_with(SliceId::B, total).start_frame(), 100_000);
        assert_eq!(slice_with(SliceId::C, total).start_frame(), 200_000);
        assert_eq!(slice_with(SliceId::D, total).start_frame(), 300_000);
    }

    #[test]
    fn test_nudge_is_noop_outside_bounds() {
        let mut slice = slice_with(SliceId::B, 400_000);
        assert_eq!(slice.start_frame(), 100_000);

        slice.nudge(10_000);
        assert_eq!(slice.start_frame(), 110_000);
        slice.nudge(-10_000);
        assert_eq!(slice.start_frame(), 100_000);

        // would land on 0 or below: untouched, not clamped
        slice.nudge(-100_000);
        assert_eq!(slice.start_frame(), 100_000);
        slice.nudge(-150_000);
        assert_eq!(slice.start_frame(), 100_000);

        // would land on total_frames or beyond: untouched
        slice.nudge(300_000);
        assert_eq!(slice.start_frame(), 100_000);
        slice.nudge(500_000);
        assert_eq!(slice.start_frame(), 100_000);
    }

    #[test]
    fn test_grow_loop_doubles_then_steps() {
        let mut slice = slice_with(SliceId::A, 4_000_000);

        slice.loop_length = 10_000;
        slice.grow_loop();
        assert_eq!(slice.loop_length(), 20_000);

        slice.loop_length = 100_000;
        slice.grow_loop();
        assert_eq!(slice.loop_length(), 125_000);
    }

    #[test]
    fn test_grow_loop_respects_source_end() {
        // 400k source: growing from 360k would pass total - step, so no-op
        let mut slice = slice_with(SliceId::A, 400_000);
        slice.loop_length = 360_000;
        slice.grow_loop();
        assert_eq!(slice.loop_length(), 360_000);
    }

    #[test]
    fn test_shrink_loop_steps_then_halves() {
        let mut slice = slice_with(SliceId::A, 4_000_000);

        slice.loop_length = 100_000;
        slice.shrink_loop();
        assert_eq!(slice.loop_length(), 75_000);

        // 20_000 - 25_000 would not stay positive, so it halves
        slice.loop_length = 20_000;
        slice.shrink_loop();
        assert_eq!(slice.loop_length(), 10_000);

        // keeps halving down without ever reaching zero
        slice.loop_length = 1;
        slice.shrink_loop();
        assert_eq!(slice.loop_length(), 1);
    }

    #[test]
    fn test_volume_steps_clamp() {
        let mut slice = slice_with(SliceId::A, 441_000);
        assert!((slice.volume() - DEFAULT_VOLUME).abs() < 1e-6);

        for _ in 0..5 {
            slice.volume_up();
        }
        assert_eq!(slice.volume(), 1.0);

        for _ in 0..15 {
            slice.volume_down();
        }
        assert_eq!(slice.volume(), 0.0);
    }

    #[test]
    fn test_cutoff_steps_clamp() {
        let mut slice = slice_with(SliceId::A, 441_000);
        assert_eq!(slice.lowpass(), 0);
        assert_eq!(slice.highpass(), CUTOFF_MAX);

        slice.lowpass_down();
        assert_eq!(slice.lowpass(), 0);
        for _ in 0..1_000 {
            slice.lowpass_up();
        }
        assert_eq!(slice.lowpass(), CUTOFF_MAX);

        slice.highpass_up();
        assert_eq!(slice.highpass(), CUTOFF_MAX);
        for _ in 0..1_000 {
            slice.highpass_down();
        }
        assert_eq!(slice.highpass(), 0);
    }

    #[test]
    fn test_contribution_gain_axes() {
        let mut slice = slice_with(SliceId::A, 441_000);

        // stopped: silent regardless of volume
        assert_eq!(slice.contribution_gain(), 0.0);

        slice.toggle_play();
        assert!((slice.contribution_gain() - DEFAULT_VOLUME).abs() < 1e-6);

        // mute silences without touching the transport
        slice.toggle_mute();
        assert_eq!(slice.contribution_gain(), 0.0);
        assert_eq!(slice.state(), PlayState::Playing);

        slice.toggle_mute();
        assert!((slice.contribution_gain() - DEFAULT_VOLUME).abs() < 1e-6);
    }

    #[test]
    fn test_fill_block_wraps_at_end_of_file() {
        let total = 441_000;
        let mut slice = slice_with(SliceId::A, total);

        // park the cursor 10 frames short of the end
        slice.source.seek(total as u64 - 10).unwrap();
        slice.cursor = total as u64 - 10;

        slice.fill_block(64, 0);
        let buf = slice.frames(64);

        // first 10 frames come from the tail, the rest wrap to frame 0
        assert_eq!(buf[0], (total - 10) as f32);
        assert_eq!(buf[9 * 2], (total - 1) as f32);
        assert_eq!(buf[10 * 2], 0.0);
        assert_eq!(buf[11 * 2], 1.0);
        assert_eq!(slice.cursor, 54);
    }

    #[test]
    fn test_fill_block_zero_fills_short_source() {
        // a source shorter than one block: even the wrapped read runs dry
        let mut slice = Slice::new(SliceId::A, counting_source(16)).unwrap();

        slice.fill_block(64, 0);
        let buf = slice.frames(64);

        assert_eq!(buf[0], 0.0);
        assert_eq!(buf[15 * 2], 15.0);
        // past two passes over the file the tail is defined silence
        for i in 32..64 {
            assert_eq!(buf[2 * i], 0.0);
            assert_eq!(buf[2 * i + 1], 0.0);
        }
    }

    #[test]
    fn test_lookahead_rewinds_cursor() {
        let mut slice = slice_with(SliceId::A, 441_000);

        slice.fill_block(64, HOP_SIZE);
        // the cursor sits after the block proper, not after the look-ahead
        assert_eq!(slice.cursor, 64);
        let buf = slice.frames(64 + HOP_SIZE);
        assert_eq!(buf[(64 + HOP_SIZE - 1) * 2], (64 + HOP_SIZE - 1) as f32);

        // the next block re-reads the look-ahead region first
        slice.fill_block(64, HOP_SIZE);
        assert_eq!(slice.frames(1)[0], 64.0);
    }

    #[test]
    fn test_loop_reset_rewinds_to_start() {
        let mut slice = slice_with(SliceId::B, 400_000);
        slice.loop_length = 128;

        slice.advance_loop_counter(100);
        slice.check_loop_reset();
        assert_eq!(slice.loop_counter(), 100);

        // counter saturates at the loop length and never passes it
        slice.advance_loop_counter(100);
        assert_eq!(slice.loop_counter(), 128);

        slice.check_loop_reset();
        assert_eq!(slice.loop_counter(), 0);
        assert_eq!(slice.cursor, slice.start_frame());

        // the next read starts from the loop start
        slice.fill_block(4, 0);
        assert_eq!(slice.frames(1)[0], slice.start_frame() as f32);
    }
}
