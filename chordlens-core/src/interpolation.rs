//! # Peak Interpolation Module
//!
//! Sub-bin frequency estimation for a peak in a dB magnitude spectrum. An FFT
//! only samples the spectrum at discrete bins; these routines recover the
//! position of the true peak between them.
//!
//! ## Strategies
//! - **Parabolic**: fits a parabola through the peak bin and its two
//!   neighbours (on linear amplitudes) and takes its vertex
//! - **Centroid**: amplitude-weighted mean frequency of the strongest bins in
//!   a window
//!
//! Every degenerate input falls back to the raw bin frequency.

use log::trace;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Denominators smaller than this are treated as a flat spectrum.
const FLAT_DENOMINATOR: f64 = 1e-10;

/// Converts a dB magnitude to linear amplitude.
pub fn db_to_linear(db: f32) -> f64 {
    10.0_f64.powf(db as f64 / 20.0)
}

/// Which refinement to apply to a spectral peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Raw bin frequency.
    None,
    #[default]
    Parabolic,
    /// Weighted centroid over an explicit bin range.
    Centroid,
}

fn bin_frequency(freqs: &[f64], idx: usize) -> f64 {
    freqs.get(idx).copied().unwrap_or(0.0)
}

/// Parabolic interpolation around `peak_idx`.
///
/// Returns the unmodified bin frequency when:
/// - `peak_idx` is the first or last bin
/// - the centre is not strictly greater than both neighbours
/// - the parabola is flat (near-zero denominator)
/// - the vertex offset falls outside ±0.5 bins
///
/// # Arguments
/// * `spectrum_db` - Magnitude spectrum in dB
/// * `peak_idx` - Index of the local maximum
/// * `freqs` - Bin frequencies, uniformly spaced
pub fn quadratic_interpolation(spectrum_db: &[f32], peak_idx: usize, freqs: &[f64]) -> f64 {
    let raw = bin_frequency(freqs, peak_idx);
    if peak_idx == 0 || peak_idx + 1 >= spectrum_db.len() || peak_idx + 1 >= freqs.len() {
        return raw;
    }

    let (alpha, beta, gamma) = (
        spectrum_db[peak_idx - 1],
        spectrum_db[peak_idx],
        spectrum_db[peak_idx + 1],
    );
    if beta <= alpha || beta <= gamma {
        return raw;
    }

    let a = db_to_linear(alpha);
    let b = db_to_linear(beta);
    let c = db_to_linear(gamma);

    let denominator = a - 2.0 * b + c;
    if denominator.abs() < FLAT_DENOMINATOR {
        trace!("parabolic interpolation skipped at bin {peak_idx}: flat peak");
        return raw;
    }

    let delta = 0.5 * (a - c) / denominator;
    if !delta.is_finite() || delta.abs() > 0.5 {
        trace!("parabolic interpolation skipped at bin {peak_idx}: offset {delta}");
        return raw;
    }

    let step = freqs[peak_idx + 1] - freqs[peak_idx];
    raw + delta * step
}

/// Amplitude-weighted mean frequency of the `top_n` strongest bins.
///
/// `spectrum_db` and `freq_range` describe the same window. Returns the first
/// frequency of the window (or 0) if it is empty or the lengths differ.
pub fn spectral_centroid(spectrum_db: &[f32], freq_range: &[f64], top_n: usize) -> f64 {
    let fallback = freq_range.first().copied().unwrap_or(0.0);
    if spectrum_db.is_empty() || spectrum_db.len() != freq_range.len() {
        return fallback;
    }

    let mut bins: Vec<(f32, f64)> = spectrum_db.iter().copied().zip(freq_range.iter().copied()).collect();
    bins.sort_by(|a, b| b.0.total_cmp(&a.0));
    bins.truncate(top_n.max(1));

    let (weighted_sum, total_weight) = bins.iter().fold((0.0, 0.0), |(sum, total), &(db, freq)| {
        let weight = db_to_linear(db);
        (sum + freq * weight, total + weight)
    });

    if total_weight == 0.0 || !total_weight.is_finite() {
        return bins.first().map(|&(_, freq)| freq).unwrap_or(fallback);
    }
    weighted_sum / total_weight
}

/// Estimates a peak frequency with the chosen method.
///
/// `eval_range` is the bin range used by the centroid; without it the
/// centroid falls back to the raw bin frequency.
pub fn estimate_peak_frequency(
    method: InterpolationMethod,
    spectrum_db: &[f32],
    peak_idx: usize,
    freqs: &[f64],
    eval_range: Option<Range<usize>>,
    top_n: usize,
) -> f64 {
    match method {
        InterpolationMethod::Parabolic => quadratic_interpolation(spectrum_db, peak_idx, freqs),
        InterpolationMethod::Centroid => match eval_range {
            Some(range) => {
                let end = range.end.min(spectrum_db.len()).min(freqs.len());
                let start = range.start.min(end);
                spectral_centroid(&spectrum_db[start..end], &freqs[start..end], top_n)
            }
            None => bin_frequency(freqs, peak_idx),
        },
        InterpolationMethod::None => bin_frequency(freqs, peak_idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn symmetric_peak_stays_on_bin() {
        let freqs = [430.0, 440.0, 450.0];
        assert_abs_diff_eq!(quadratic_interpolation(&[-6.0, 0.0, -6.0], 1, &freqs), 440.0, epsilon = 1e-9);
    }

    #[test]
    fn asymmetric_peak_leans_toward_louder_neighbour() {
        let freqs = [100.0, 110.0, 120.0];

        let right = quadratic_interpolation(&[-12.0, 0.0, -4.0], 1, &freqs);
        assert!(right > 110.0 && right < 120.0, "{right}");

        let left = quadratic_interpolation(&[-4.0, 0.0, -12.0], 1, &freqs);
        assert!(left > 100.0 && left < 110.0, "{left}");
    }

    #[test]
    fn boundary_bins_are_not_interpolated() {
        let freqs = [100.0, 110.0, 120.0];
        assert_eq!(quadratic_interpolation(&[0.0, -3.0, -6.0], 0, &freqs), 100.0);
        assert_eq!(quadratic_interpolation(&[-6.0, -3.0, 0.0], 2, &freqs), 120.0);
    }

    #[test]
    fn flat_or_non_peak_shapes_are_not_interpolated() {
        let freqs = [100.0, 110.0, 120.0];
        assert_eq!(quadratic_interpolation(&[0.0, 0.0, 0.0], 1, &freqs), 110.0);
        assert_eq!(quadratic_interpolation(&[0.0, -3.0, 0.0], 1, &freqs), 110.0);
    }

    #[test]
    fn centroid_of_single_peak() {
        let freqs = [100.0, 110.0, 120.0, 130.0, 140.0];
        let result = spectral_centroid(&[-60.0, -60.0, 0.0, -60.0, -60.0], &freqs, 3);
        assert_abs_diff_eq!(result, 120.0, epsilon = 0.5);
    }

    #[test]
    fn centroid_of_two_equal_peaks_is_between_them() {
        let freqs = [100.0, 110.0, 120.0, 130.0, 140.0];
        let result = spectral_centroid(&[0.0, -60.0, -60.0, -60.0, 0.0], &freqs, 3);
        assert!(result > 115.0 && result < 125.0, "{result}");
    }

    #[test]
    fn centroid_top_one_is_the_loudest_bin() {
        assert_abs_diff_eq!(spectral_centroid(&[-6.0, 0.0, -3.0], &[100.0, 110.0, 120.0], 1), 110.0);
    }

    #[test]
    fn centroid_degenerate_inputs() {
        assert_eq!(spectral_centroid(&[], &[], 3), 0.0);
        assert_eq!(spectral_centroid(&[0.0, 0.0, 0.0], &[100.0, 110.0], 3), 100.0);
        assert_eq!(
            spectral_centroid(&[f32::NEG_INFINITY, f32::NEG_INFINITY], &[100.0, 110.0], 3),
            100.0
        );
    }

    #[test]
    fn dispatcher_selects_strategy() {
        let freqs = [100.0, 110.0, 120.0, 130.0, 140.0];
        let spectrum = [-6.0, -2.0, 0.0, -2.0, -6.0];

        assert_eq!(estimate_peak_frequency(InterpolationMethod::None, &spectrum, 2, &freqs, None, 3), 120.0);
        assert_abs_diff_eq!(
            estimate_peak_frequency(InterpolationMethod::Parabolic, &spectrum, 2, &freqs, None, 3),
            120.0,
            epsilon = 1e-9
        );

        let centroid = estimate_peak_frequency(InterpolationMethod::Centroid, &spectrum, 2, &freqs, Some(0..5), 3);
        assert!(centroid > 100.0 && centroid < 140.0);
        assert_eq!(estimate_peak_frequency(InterpolationMethod::Centroid, &spectrum, 2, &freqs, None, 3), 120.0);
    }

    #[test]
    fn off_grid_peak_moves_toward_true_frequency() {
        let step = 21.53;
        let true_peak = 442.0;
        let centre_bin = (440.0_f64 / step).round() as i32;

        let freqs: Vec<f64> = (centre_bin - 2..=centre_bin + 2).map(|i| i as f64 * step).collect();
        let spectrum: Vec<f32> = freqs
            .iter()
            .map(|f| {
                let distance = (f - true_peak) / step;
                (-distance * distance * 6.0) as f32
            })
            .collect();

        let peak_idx = (0..spectrum.len()).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b])).unwrap();
        assert_eq!(peak_idx, 3);

        let result = quadratic_interpolation(&spectrum, peak_idx, &freqs);
        assert!(result < freqs[peak_idx]);
        assert_abs_diff_eq!(result, true_peak, epsilon = 1.0);
    }
}
