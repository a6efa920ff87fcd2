//! # Pitch Detection Module
//!
//! Single-note fundamental frequency estimation from a time-domain buffer,
//! used to suggest a pitch the user can add to the collection.
//!
//! ## Algorithm
//! - RMS noise gate to reject silence
//! - Normalized autocorrelation over the lag range implied by the
//!   searchable frequency bounds
//! - Confidence floor on the best correlation
//! - Parabolic interpolation of the best lag for sub-sample accuracy
//! - MIDI-style mapping to a pitch class and octave, plus octave-up and
//!   octave-down candidates to cover octave ambiguity

use serde::{Deserialize, Serialize};

use crate::note::{PitchClass, SUPPORTED_OCTAVES};

/// Confidence multiplier for the octave-up candidate.
const OCTAVE_UP_WEIGHT: f64 = 0.3;
/// Confidence multiplier for the octave-down candidate.
const OCTAVE_DOWN_WEIGHT: f64 = 0.2;
/// At most this many candidates are returned per frame.
pub const MAX_CANDIDATES: usize = 3;

/// A possible identification of the sounding note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchCandidate {
    pub pitch_class: PitchClass,
    pub octave: i32,
    pub frequency_hz: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// Thresholds of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Lowest detectable frequency in Hz (~G1).
    pub min_freq_hz: f64,
    /// Highest detectable frequency in Hz (~B6).
    pub max_freq_hz: f64,
    /// Buffers quieter than this RMS are treated as silence.
    pub rms_threshold: f32,
    /// Minimum normalized correlation for a detection.
    pub confidence_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_freq_hz: 50.0,
            max_freq_hz: 2000.0,
            rms_threshold: 0.01,
            confidence_floor: 0.5,
        }
    }
}

/// Raw autocorrelation estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Periodicity {
    pub frequency_hz: f64,
    /// Normalized correlation at the chosen lag.
    pub confidence: f64,
}

/// Root mean square level of a buffer.
pub fn calculate_rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|&s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
}

/// Normalized correlation of a buffer with itself shifted by `lag`.
///
/// corr(lag) / sqrt(energy(0..N-lag) * energy(lag..N))
fn normalized_correlation(buffer: &[f32], lag: usize) -> f64 {
    let head = &buffer[..buffer.len() - lag];
    let tail = &buffer[lag..];

    let (mut correlation, mut norm_head, mut norm_tail) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&a, &b) in head.iter().zip(tail) {
        let (a, b) = (a as f64, b as f64);
        correlation += a * b;
        norm_head += a * a;
        norm_tail += b * b;
    }

    if norm_head > 0.0 && norm_tail > 0.0 {
        correlation / (norm_head * norm_tail).sqrt()
    } else {
        0.0
    }
}

/// Estimates the fundamental frequency of a buffer by normalized autocorrelation.
///
/// # Arguments
/// * `buffer` - Mono time-domain samples
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Frequency bounds and thresholds
///
/// # Returns
/// * `Some(periodicity)` - Frequency and its correlation
/// * `None` - Silence, too short a buffer, or correlation below the floor
pub fn autocorrelate(buffer: &[f32], sample_rate: u32, config: &DetectorConfig) -> Option<Periodicity> {
    let size = buffer.len();
    if size < 2 || sample_rate == 0 || config.min_freq_hz <= 0.0 || config.max_freq_hz <= 0.0 {
        return None;
    }

    // --- Noise Gate ---
    if calculate_rms(buffer) < config.rms_threshold {
        return None;
    }

    // lag = sample_rate / frequency
    let min_lag = (sample_rate as f64 / config.max_freq_hz).floor().max(1.0) as usize;
    let max_lag = ((sample_rate as f64 / config.min_freq_hz).floor() as usize).min(size - 1);
    if min_lag >= max_lag {
        return None;
    }

    let correlations: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| normalized_correlation(buffer, lag))
        .collect();

    // First maximum wins so that exact period multiples do not shadow the period.
    let (best_offset, best) = correlations
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, c)| if c > acc.1 { (i, c) } else { acc });

    if best < config.confidence_floor {
        return None;
    }

    // --- Parabolic interpolation of the lag ---
    let mut refined_lag = (min_lag + best_offset) as f64;
    if best_offset > 0 && best_offset + 1 < correlations.len() {
        let y0 = correlations[best_offset - 1];
        let y1 = correlations[best_offset];
        let y2 = correlations[best_offset + 1];

        let denominator = 2.0 * (2.0 * y1 - y0 - y2);
        if denominator.abs() > 1e-10 {
            refined_lag += (y2 - y0) / denominator;
        }
    }

    let frequency_hz = sample_rate as f64 / refined_lag;
    frequency_hz.is_finite().then_some(Periodicity {
        frequency_hz,
        confidence: best,
    })
}

/// Maps a frequency to the nearest pitch class and octave.
///
/// midi = round(69 + 12 * log2(f / a4)); octave = floor(midi / 12) - 1
pub fn frequency_to_note(frequency_hz: f64, a4_freq_hz: f64) -> (PitchClass, i32) {
    let midi = (69.0 + 12.0 * (frequency_hz / a4_freq_hz).log2()).round() as i32;
    (PitchClass::from_index(midi), midi.div_euclid(12) - 1)
}

fn candidate(frequency_hz: f64, confidence: f64, a4_freq_hz: f64) -> Option<PitchCandidate> {
    let (pitch_class, octave) = frequency_to_note(frequency_hz, a4_freq_hz);
    SUPPORTED_OCTAVES.contains(&octave).then_some(PitchCandidate {
        pitch_class,
        octave,
        frequency_hz,
        confidence,
    })
}

/// Builds the detected note plus its octave-up and octave-down alternatives.
fn generate_candidates(periodicity: Periodicity, a4_freq_hz: f64) -> Vec<PitchCandidate> {
    let Periodicity {
        frequency_hz,
        confidence,
    } = periodicity;

    [
        candidate(frequency_hz, confidence, a4_freq_hz),
        candidate(frequency_hz * 2.0, confidence * OCTAVE_UP_WEIGHT, a4_freq_hz),
        candidate(frequency_hz / 2.0, confidence * OCTAVE_DOWN_WEIGHT, a4_freq_hz),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Detects the sounding note with the default detector bounds.
///
/// Returns at most three candidates sorted by confidence, or an empty list
/// when nothing was detected.
pub fn detect_pitch(buffer: &[f32], sample_rate: u32, a4_freq_hz: f64) -> Vec<PitchCandidate> {
    detect_pitch_with(buffer, sample_rate, a4_freq_hz, &DetectorConfig::default())
}

/// [`detect_pitch`] with explicit detector bounds.
pub fn detect_pitch_with(
    buffer: &[f32],
    sample_rate: u32,
    a4_freq_hz: f64,
    config: &DetectorConfig,
) -> Vec<PitchCandidate> {
    let Some(periodicity) = autocorrelate(buffer, sample_rate, config) else {
        return Vec::new();
    };

    let mut candidates = generate_candidates(periodicity, a4_freq_hz);
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}
