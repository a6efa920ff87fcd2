//! # Fast Fourier Transform (FFT) Module
//!
//! Turns time-domain frames into the smoothed dB magnitude spectrum the
//! evaluator consumes.
//!
//! ## Pipeline
//! 1. Take the most recent `fft_size` samples (zero-padded on the left when
//!    the frame is shorter)
//! 2. DC offset removal
//! 3. Blackman window
//! 4. Forward FFT, magnitude scaled by `1 / fft_size`
//! 5. Temporal smoothing: `τ · previous + (1 - τ) · current`
//! 6. Conversion to dB (`20 · log10`, silent bins become `-inf`)
//!
//! The FFT plan and work buffers are created once per analyzer.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Blackman window coefficients for `n` samples.
fn blackman_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| {
            let x = i as f32 / n_minus_1;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Stateful spectrum analyzer for a continuous stream of frames.
pub struct SpectrumAnalyzer {
    fft_size: usize,
    smoothing_time_constant: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    spectrum_db: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Creates an analyzer.
    ///
    /// # Arguments
    /// * `fft_size` - Transform length; the spectrum has `fft_size / 2` bins
    /// * `smoothing_time_constant` - Weight of the previous frame, clamped to 0..=1
    pub fn new(fft_size: usize, smoothing_time_constant: f32) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let bins = fft_size / 2;

        Self {
            fft_size,
            smoothing_time_constant: smoothing_time_constant.clamp(0.0, 1.0),
            fft,
            window: blackman_window(fft_size),
            samples: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            smoothed: vec![0.0; bins],
            spectrum_db: vec![f32::NEG_INFINITY; bins],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Center frequency of every bin: `k · sample_rate / fft_size`.
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f64> {
        let step = sample_rate as f64 / self.fft_size as f64;
        (0..self.bin_count()).map(|k| k as f64 * step).collect()
    }

    /// Analyzes one frame and returns the smoothed dB spectrum.
    ///
    /// # Arguments
    /// * `frame` - Mono samples; only the last `fft_size` are used
    ///
    /// # Returns
    /// * `&[f32]` - `fft_size / 2` magnitudes in dB
    pub fn process(&mut self, frame: &[f32]) -> &[f32] {
        let used = frame.len().min(self.fft_size);
        let pad = self.fft_size - used;
        self.samples[..pad].fill(0.0);
        self.samples[pad..].copy_from_slice(&frame[frame.len() - used..]);

        remove_dc_offset(&mut self.samples);

        for ((slot, sample), w) in self.buffer.iter_mut().zip(&self.samples).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing_time_constant;
        for ((smoothed, db), c) in self
            .smoothed
            .iter_mut()
            .zip(self.spectrum_db.iter_mut())
            .zip(&self.buffer)
        {
            *smoothed = tau * *smoothed + (1.0 - tau) * c.norm() * scale;
            *db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
        }

        &self.spectrum_db
    }

    /// Last spectrum returned by [`process`](Self::process).
    pub fn spectrum_db(&self) -> &[f32] {
        &self.spectrum_db
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
        self.spectrum_db.fill(f32::NEG_INFINITY);
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing_time_constant", &self.smoothing_time_constant)
            .finish()
    }
}
