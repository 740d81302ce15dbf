//! Mixer - sums the four slices into the output block
//!
//! Each output frame is the plain sum of every slice's frame scaled by its
//! contribution gain (volume gated by play state and mute). There is no
//! clipping or limiting stage: sums past the nominal range are passed
//! through as-is.
//!
//! The mixer is also the loop clock: it advances every slice's loop counter
//! once per stereo frame it emits, which is what drives the per-tick
//! loop-point check.

use crate::types::{StereoBuffer, NUM_SLICES};

use super::slice::Slice;

/// Combines slice outputs into the master block
pub struct Mixer;

impl Mixer {
    pub fn new() -> Self {
        Self
    }

    /// Sum the slices' current blocks into `out` and advance loop counters.
    ///
    /// `out.len()` determines the number of frames mixed; each slice must
    /// have been filled for at least that many frames this tick.
    pub fn process(&mut self, slices: &mut [Slice; NUM_SLICES], out: &mut StereoBuffer) {
        let frames = out.len();
        out.fill_silence();

        for slice in slices.iter_mut() {
            let gain = slice.contribution_gain();
            if gain != 0.0 {
                let buf = slice.frames(frames);
                for (n, sample) in out.iter_mut().enumerate() {
                    sample.left += gain * buf[2 * n];
                    sample.right += gain * buf[2 * n + 1];
                }
            }

            // the loop clock runs whether or not the slice is audible
            slice.advance_loop_counter(frames);
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
