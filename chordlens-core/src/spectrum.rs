//! # Spectrum Evaluation Module
//!
//! Compares one analysis frame (a dB magnitude spectrum) against the
//! just-intonation targets of a pitch collection. For each pitch the
//! evaluator:
//!
//! 1. Takes the pitch's just-intonation frequency as the target
//! 2. Finds the nearest spectrum bin
//! 3. Opens a ±`eval_range_cents` window around the target
//! 4. Picks the loudest bin in the window and gates it on `threshold_db`
//! 5. Refines the peak frequency and reports its offset from the target
//!
//! ## Preconditions
//! The bin axis must be strictly ascending and roughly uniform, as produced
//! by an FFT. The nearest-bin scan stops at the first bin that is farther
//! from the target than its predecessor, and the window width is derived from
//! the local bin spacing; neither is a true nearest-neighbour search on
//! arbitrary axes.

use log::trace;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::interpolation::{InterpolationMethod, estimate_peak_frequency};
use crate::note::Pitch;
use crate::tuning::{calculate_cents_deviation, just_frequencies};

/// Parameters of one evaluation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationParams {
    /// Half-width of the search window in cents.
    pub eval_range_cents: f64,
    pub a4_freq_hz: f64,
    /// Peaks quieter than this are reported as "no detection".
    pub threshold_db: f32,
    pub interpolation: InterpolationMethod,
    pub centroid_top_n: usize,
    /// Attach the search window contents to each result.
    pub include_debug: bool,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            eval_range_cents: 50.0,
            a4_freq_hz: 442.0,
            threshold_db: -100.0,
            interpolation: InterpolationMethod::Parabolic,
            centroid_top_n: 3,
            include_debug: false,
        }
    }
}

/// Bounds of the search window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRange {
    pub min_idx: usize,
    /// Exclusive.
    pub max_idx: usize,
    pub min_freq_hz: f64,
    pub max_freq_hz: f64,
}

/// A single spectrum bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumBin {
    pub idx: usize,
    pub freq_hz: f64,
    pub db: f32,
}

/// What the evaluator looked at for one pitch, for visualisation only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDebug {
    /// The just-intonation target.
    pub estimated_freq_hz: f64,
    pub search_range: SearchRange,
    pub peak: SpectrumBin,
    pub bins: Vec<SpectrumBin>,
}

/// Evaluation outcome for one pitch.
///
/// `deviation` and `cent_deviation` are `None` when nothing above the
/// threshold was found; that is a normal outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Cent offset normalised by the window, clamped to [-1, 1].
    pub deviation: Option<f64>,
    pub cent_deviation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<EvaluationDebug>,
}

impl EvaluationResult {
    pub fn is_detected(&self) -> bool {
        self.deviation.is_some()
    }
}

/// Index of the bin closest to `target`, scanning upward from bin 0.
///
/// Stops at the first bin whose distance grows, which is only correct for an
/// ascending axis.
pub fn nearest_bin(freqs: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &freq) in freqs.iter().enumerate() {
        let distance = (target - freq).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => break,
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn local_bin_spacing(freqs: &[f64], idx: usize) -> f64 {
    let step = if idx + 1 < freqs.len() {
        freqs[idx + 1] - freqs[idx]
    } else if idx > 0 {
        freqs[idx] - freqs[idx - 1]
    } else {
        1.0
    };
    if step > 0.0 { step } else { 1.0 }
}

/// Bin range covering `target * 2^(±range_cents/1200)`, clipped to `len`.
fn search_window(freqs: &[f64], len: usize, target_idx: usize, target: f64, range_cents: f64) -> Range<usize> {
    let min_freq = target * 2.0_f64.powf(-range_cents / 1200.0);
    let max_freq = target * 2.0_f64.powf(range_cents / 1200.0);

    let step = local_bin_spacing(freqs, target_idx);
    let bin_freq = freqs[target_idx];

    // offsets beyond the axis length are clipped below anyway
    let bound = len as f64;
    let below = ((bin_freq - min_freq) / step).floor().clamp(-bound, bound);
    let above = ((max_freq - bin_freq) / step).ceil().clamp(-bound, bound);

    let lower = target_idx as i64 - below as i64;
    let upper = target_idx as i64 + above as i64;

    let start = lower.max(0) as usize;
    let end = (upper.max(0) as usize).min(len);
    start.min(end)..end
}

fn loudest_bin(spectrum_db: &[f32], window: &Range<usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for idx in window.clone() {
        match best {
            Some(b) if spectrum_db[idx] <= spectrum_db[b] => {}
            _ => best = Some(idx),
        }
    }
    best
}

fn evaluate_target(spectrum_db: &[f32], freqs: &[f64], target: f64, params: &EvaluationParams) -> EvaluationResult {
    let len = spectrum_db.len().min(freqs.len());
    let Some(target_idx) = nearest_bin(&freqs[..len], target) else {
        return EvaluationResult::default();
    };

    let window = search_window(freqs, len, target_idx, target, params.eval_range_cents);
    let Some(peak_idx) = loudest_bin(spectrum_db, &window) else {
        return EvaluationResult::default();
    };
    let peak_db = spectrum_db[peak_idx];

    let debug = params.include_debug.then(|| EvaluationDebug {
        estimated_freq_hz: target,
        search_range: SearchRange {
            min_idx: window.start,
            max_idx: window.end,
            min_freq_hz: freqs[window.start],
            max_freq_hz: freqs[window.end - 1],
        },
        peak: SpectrumBin {
            idx: peak_idx,
            freq_hz: freqs[peak_idx],
            db: peak_db,
        },
        bins: window
            .clone()
            .map(|idx| SpectrumBin {
                idx,
                freq_hz: freqs[idx],
                db: spectrum_db[idx],
            })
            .collect(),
    });

    if peak_db.is_nan() || peak_db < params.threshold_db {
        return EvaluationResult {
            deviation: None,
            cent_deviation: None,
            debug,
        };
    }

    let estimated = estimate_peak_frequency(
        params.interpolation,
        &spectrum_db[..len],
        peak_idx,
        &freqs[..len],
        Some(window.clone()),
        params.centroid_top_n,
    );
    let cents = calculate_cents_deviation(estimated, target);
    if !cents.is_finite() {
        return EvaluationResult {
            deviation: None,
            cent_deviation: None,
            debug,
        };
    }

    let deviation = if params.eval_range_cents > 0.0 {
        (cents / params.eval_range_cents).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    trace!("target {target:.2} Hz: peak bin {peak_idx} ({peak_db:.1} dB) -> {estimated:.2} Hz, {cents:+.2} cents");

    EvaluationResult {
        deviation: Some(deviation),
        cent_deviation: Some(cents),
        debug,
    }
}

/// Evaluates one spectrum frame against every pitch of the collection.
///
/// The result is positionally aligned with `pitches`. It is empty when the
/// collection does not have exactly one root (see [`just_frequencies`]).
///
/// # Arguments
/// * `spectrum_db` - Magnitude spectrum in dB, one value per bin
/// * `bin_freqs` - Ascending bin frequencies in Hz
/// * `pitches` - Target collection with one root
/// * `params` - Window, reference, threshold and interpolation settings
pub fn evaluate_spectrum(
    spectrum_db: &[f32],
    bin_freqs: &[f64],
    pitches: &[Pitch],
    params: &EvaluationParams,
) -> Vec<EvaluationResult> {
    just_frequencies(pitches, params.a4_freq_hz)
        .into_iter()
        .map(|target| evaluate_target(spectrum_db, bin_freqs, target, params))
        .collect()
}
