//! Spectral band filter - STFT analysis, bin editing, overlap-add resynthesis
//!
//! Runs over a slice's de-interleaved channel buffer in place, one hop at a
//! time with 50% overlap. Each hop transforms the current Hann-windowed
//! frame together with the carried-over previous frame, zeroes the magnitude
//! of bins outside a band around the center bin (and inside a notch cut from
//! its middle), resynthesizes both frames, and overlap-adds the previous
//! frame's tail with the current frame's head.
//!
//! The carried state is the filtered *time-domain* previous window, owned
//! per slice channel in [`FilterState`], so shaping several slices never
//! cross-contaminates.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// STFT analysis window length in samples
pub const WINDOW_SIZE: usize = 512;

/// Advance between successive analysis windows (50% overlap)
pub const HOP_SIZE: usize = WINDOW_SIZE / 2;

/// Number of edited frequency bins
const NUM_BINS: usize = WINDOW_SIZE / 2;

/// Center bin of the pass band
const CENTER_BIN: i64 = (WINDOW_SIZE / 4) as i64;

/// Carried previous-window state for one spectrally shaped slice
///
/// Holds the filtered time-domain previous analysis window per channel.
pub struct FilterState {
    pub(crate) left: Vec<f32>,
    pub(crate) right: Vec<f32>,
}

impl FilterState {
    pub fn new() -> Self {
        Self {
            left: vec![0.0; WINDOW_SIZE],
            right: vec![0.0; WINDOW_SIZE],
        }
    }

    /// Forget carried audio (e.g. when a slice leaves filter scope)
    pub fn reset(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

/// The STFT band filter
///
/// All plans and scratch buffers are allocated at construction; `process`
/// never allocates and is safe to call from the audio callback.
pub struct SpectralFilter {
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    /// Precomputed Hann window
    window: Vec<f32>,
    /// Windowed current frame, then its resynthesized time-domain form
    curr: Vec<f32>,
    /// Working copy of the carried previous frame
    prev: Vec<f32>,
    curr_spec: Vec<Complex<f32>>,
    prev_spec: Vec<Complex<f32>>,
    curr_mag: Vec<f32>,
    curr_phase: Vec<f32>,
    prev_mag: Vec<f32>,
    prev_phase: Vec<f32>,
    fwd_scratch: Vec<Complex<f32>>,
    inv_scratch: Vec<Complex<f32>>,
}

impl SpectralFilter {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(WINDOW_SIZE);
        let ifft = planner.plan_fft_inverse(WINDOW_SIZE);

        let window: Vec<f32> = (0..WINDOW_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / WINDOW_SIZE as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        let curr_spec = fft.make_output_vec();
        let prev_spec = fft.make_output_vec();
        let fwd_scratch = fft.make_scratch_vec();
        let inv_scratch = ifft.make_scratch_vec();

        Self {
            fft,
            ifft,
            window,
            curr: vec![0.0; WINDOW_SIZE],
            prev: vec![0.0; WINDOW_SIZE],
            curr_spec,
            prev_spec,
            curr_mag: vec![0.0; NUM_BINS],
            curr_phase: vec![0.0; NUM_BINS],
            prev_mag: vec![0.0; NUM_BINS],
            prev_phase: vec![0.0; NUM_BINS],
            fwd_scratch,
            inv_scratch,
        }
    }

    /// Shape one channel in place.
    ///
    /// `buf` holds `block_len + HOP_SIZE` samples — the trailing hop is the
    /// look-ahead that lets the final window extend past the block. `state`
    /// is that channel's carried previous window. `lowpass` is the notch
    /// half-width, `highpass` the pass-band half-width, both in bins around
    /// the center bin.
    pub fn process(
        &mut self,
        buf: &mut [f32],
        state: &mut [f32],
        lowpass: u32,
        highpass: u32,
        block_len: usize,
    ) {
        debug_assert_eq!(state.len(), WINDOW_SIZE);
        debug_assert!(block_len % HOP_SIZE == 0, "block must be hop-aligned");

        let mut offset = 0;
        while offset < block_len {
            if offset + WINDOW_SIZE > buf.len() {
                break;
            }

            // Window the current frame; re-load the carried previous frame
            // (the forward transform consumes its input)
            for j in 0..WINDOW_SIZE {
                self.curr[j] = buf[offset + j] * self.window[j];
            }
            self.prev.copy_from_slice(state);

            // Buffer lengths are fixed at construction, so these cannot fail
            let _ = self
                .fft
                .process_with_scratch(&mut self.curr, &mut self.curr_spec, &mut self.fwd_scratch);
            let _ = self
                .fft
                .process_with_scratch(&mut self.prev, &mut self.prev_spec, &mut self.fwd_scratch);

            // Polar form of both frames
            for j in 0..NUM_BINS {
                let c = self.curr_spec[j];
                self.curr_mag[j] = (c.re * c.re + c.im * c.im).sqrt();
                self.curr_phase[j] = c.im.atan2(c.re);

                let p = self.prev_spec[j];
                self.prev_mag[j] = (p.re * p.re + p.im * p.im).sqrt();
                self.prev_phase[j] = p.im.atan2(p.re);
            }

            // Kill bins inside the notch or outside the pass band, in both
            // frames. With lowpass = 0 and highpass = WINDOW_SIZE/2 nothing
            // is touched.
            let lp = lowpass as i64;
            let hp = highpass as i64;
            for j in 0..NUM_BINS {
                let bin = j as i64;
                if (bin > CENTER_BIN - lp && bin < CENTER_BIN + lp)
                    || bin < CENTER_BIN - hp
                    || bin > CENTER_BIN + hp
                {
                    self.curr_mag[j] = 0.0;
                    self.prev_mag[j] = 0.0;
                }
            }

            // Back to Cartesian
            for j in 0..NUM_BINS {
                self.curr_spec[j] = Complex::new(
                    self.curr_mag[j] * self.curr_phase[j].cos(),
                    self.curr_mag[j] * self.curr_phase[j].sin(),
                );
                self.prev_spec[j] = Complex::new(
                    self.prev_mag[j] * self.prev_phase[j].cos(),
                    self.prev_mag[j] * self.prev_phase[j].sin(),
                );
            }
            // The inverse transform requires purely real DC and Nyquist bins;
            // the polar roundtrip can leave a sub-epsilon imaginary residue
            self.curr_spec[0].im = 0.0;
            self.prev_spec[0].im = 0.0;

            // Back to the time domain (unnormalized, so scale by 1/N)
            let _ = self
                .ifft
                .process_with_scratch(&mut self.curr_spec, &mut self.curr, &mut self.inv_scratch);
            let _ = self
                .ifft
                .process_with_scratch(&mut self.prev_spec, &mut self.prev, &mut self.inv_scratch);
            let norm = 1.0 / WINDOW_SIZE as f32;
            for j in 0..WINDOW_SIZE {
                self.curr[j] *= norm;
                self.prev[j] *= norm;
            }

            // Overlap-add: previous tail plus current head
            for j in 0..HOP_SIZE {
                buf[offset + j] = self.prev[HOP_SIZE + j] + self.curr[j];
            }

            // Carry the filtered current frame into the next hop
            state.copy_from_slice(&self.curr);

            offset += HOP_SIZE;
        }
    }
}

impl Default for SpectralFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Cutoffs at which the bin edit touches nothing
    const OPEN_LOWPASS: u32 = 0;
    const OPEN_HIGHPASS: u32 = (WINDOW_SIZE / 2) as u32;

    /// A tone centered on the given analysis bin
    fn tone(bin: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * i as f32
                    / WINDOW_SIZE as f32;
                0.5 * phase.sin()
            })
            .collect()
    }

    fn run_block(
        filter: &mut SpectralFilter,
        state: &mut FilterState,
        signal: &[f32],
        lowpass: u32,
        highpass: u32,
        block_len: usize,
    ) -> Vec<f32> {
        let mut buf = signal.to_vec();
        filter.process(&mut buf, &mut state.left, lowpass, highpass, block_len);
        buf.truncate(block_len);
        buf
    }

    #[test]
    fn test_neutral_settings_are_identity() {
        let block_len = 2048;
        let signal = tone(20, block_len + HOP_SIZE);

        let mut filter = SpectralFilter::new();
        let mut state = FilterState::new();
        let out = run_block(
            &mut filter,
            &mut state,
            &signal,
            OPEN_LOWPASS,
            OPEN_HIGHPASS,
            block_len,
        );

        // The very first hop fades in from the silent carried window; from
        // the second hop on, the Hann overlap sums to unity and the output
        // must reproduce the input.
        for i in HOP_SIZE..block_len {
            assert_abs_diff_eq!(out[i], signal[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_full_notch_silences_everything() {
        let block_len = 2048;
        let signal = tone(20, block_len + HOP_SIZE);

        let mut filter = SpectralFilter::new();
        let mut state = FilterState::new();
        // A notch as wide as the whole spectrum leaves no bins standing
        let out = run_block(
            &mut filter,
            &mut state,
            &signal,
            OPEN_HIGHPASS,
            OPEN_HIGHPASS,
            block_len,
        );

        for (i, v) in out.iter().enumerate() {
            assert!(v.abs() < 1e-3, "sample {} = {} not silenced", i, v);
        }
    }

    #[test]
    fn test_band_keeps_center_and_kills_far_bins() {
        let block_len = 2048;
        let center = WINDOW_SIZE / 4;
        let far = 16; // well outside a narrow band around the center

        let in_band = tone(center, block_len + HOP_SIZE);
        let out_of_band = tone(far, block_len + HOP_SIZE);

        let mut filter = SpectralFilter::new();

        // Narrow pass band around the center bin
        let mut state = FilterState::new();
        let kept = run_block(&mut filter, &mut state, &in_band, OPEN_LOWPASS, 8, block_len);
        let kept_rms: f32 =
            (kept[HOP_SIZE..].iter().map(|v| v * v).sum::<f32>() / kept.len() as f32).sqrt();
        assert!(kept_rms > 0.1, "center tone was attenuated: rms {}", kept_rms);

        let mut state = FilterState::new();
        let killed = run_block(
            &mut filter,
            &mut state,
            &out_of_band,
            OPEN_LOWPASS,
            8,
            block_len,
        );
        let killed_rms: f32 =
            (killed[HOP_SIZE..].iter().map(|v| v * v).sum::<f32>() / killed.len() as f32).sqrt();
        assert!(killed_rms < 0.01, "far tone survived: rms {}", killed_rms);
    }

    #[test]
    fn test_state_carries_across_blocks() {
        // Two consecutive blocks over a continuous signal must join without
        // a seam: the second block's first hop comes from carried state.
        let block_len = 2048;
        let signal = tone(20, 2 * block_len + HOP_SIZE);

        let mut filter = SpectralFilter::new();
        let mut state = FilterState::new();

        let mut first = signal[..block_len + HOP_SIZE].to_vec();
        filter.process(&mut first, &mut state.left, OPEN_LOWPASS, OPEN_HIGHPASS, block_len);

        let mut second = signal[block_len..2 * block_len + HOP_SIZE].to_vec();
        filter.process(&mut second, &mut state.left, OPEN_LOWPASS, OPEN_HIGHPASS, block_len);

        for i in 0..block_len {
            assert_abs_diff_eq!(second[i], signal[block_len + i], epsilon = 1e-3);
        }
    }
}
