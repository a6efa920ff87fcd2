//! # Just Intonation Module
//!
//! Converts a pitch collection with one designated root into target
//! frequencies. Every pitch gets three values, positionally aligned with the
//! input:
//!
//! - its equal-tempered frequency relative to the A4 reference
//! - its just-intonation frequency, built from the root's equal-tempered
//!   frequency and a fixed table of small-integer ratios
//! - the difference between the two in cents
//!
//! All functions are pure in the reference frequency; nothing is cached
//! between calls.

use log::error;

use crate::error::{ChordLensError, Result};
use crate::note::{A4_SEMITONE_INDEX, Pitch, count_roots};

/// Frequency ratios above the root, indexed by semitone distance mod 12.
pub const JUST_RATIOS: [f64; 12] = [
    1.0,
    16.0 / 15.0,
    9.0 / 8.0,
    6.0 / 5.0,
    5.0 / 4.0,
    4.0 / 3.0,
    45.0 / 32.0,
    3.0 / 2.0,
    8.0 / 5.0,
    5.0 / 3.0,
    16.0 / 9.0,
    15.0 / 8.0,
];

/// Per-pitch frequencies for a whole collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JustIntonation {
    pub equal_freqs: Vec<f64>,
    pub just_freqs: Vec<f64>,
    pub cent_diffs: Vec<f64>,
}

impl JustIntonation {
    pub fn is_empty(&self) -> bool {
        self.just_freqs.is_empty()
    }
}

/// Equal-tempered frequency of an absolute semitone index.
///
/// f = a4 * 2^((index - index(A4)) / 12)
pub fn equal_frequency(semitone_index: i32, a4_freq_hz: f64) -> f64 {
    a4_freq_hz * 2.0_f64.powf((semitone_index - A4_SEMITONE_INDEX) as f64 / 12.0)
}

/// Just-intonation frequency of `semitone_index` against a root.
///
/// The octave factor uses the floor of the signed distance, so pitches below
/// the root land on the correct lower octave.
pub fn just_frequency(semitone_index: i32, root_index: i32, root_freq_hz: f64) -> f64 {
    let distance = semitone_index - root_index;
    let ratio = JUST_RATIOS[distance.rem_euclid(12) as usize];
    root_freq_hz * ratio * 2.0_f64.powi(distance.div_euclid(12))
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// The root of a validated collection.
#[derive(Debug, Clone, Copy)]
struct RootReference {
    index: i32,
    frequency: f64,
}

impl RootReference {
    fn from_pitches(pitches: &[Pitch], a4_freq_hz: f64) -> Result<Self> {
        let found = count_roots(pitches);
        let root = match pitches.iter().find(|p| p.is_root) {
            Some(root) if found == 1 => root,
            _ => return Err(ChordLensError::RootCardinality { found }),
        };
        let index = root.semitone_index();
        Ok(Self {
            index,
            frequency: equal_frequency(index, a4_freq_hz),
        })
    }

    fn just_frequency(&self, pitch: &Pitch) -> f64 {
        just_frequency(pitch.semitone_index(), self.index, self.frequency)
    }
}

/// Computes equal, just and cent-difference lists for a collection.
///
/// # Errors
/// * `RootCardinality` if the collection has zero or several roots
pub fn try_compute_just_intonation(pitches: &[Pitch], a4_freq_hz: f64) -> Result<JustIntonation> {
    let root = RootReference::from_pitches(pitches, a4_freq_hz)?;

    let mut result = JustIntonation {
        equal_freqs: Vec::with_capacity(pitches.len()),
        just_freqs: Vec::with_capacity(pitches.len()),
        cent_diffs: Vec::with_capacity(pitches.len()),
    };
    for pitch in pitches {
        let equal = equal_frequency(pitch.semitone_index(), a4_freq_hz);
        let just = root.just_frequency(pitch);
        result.equal_freqs.push(equal);
        result.just_freqs.push(just);
        result.cent_diffs.push(calculate_cents_deviation(just, equal));
    }
    Ok(result)
}

/// Fail-soft variant of [`try_compute_just_intonation`].
///
/// A root cardinality violation is logged and yields empty lists.
pub fn compute_just_intonation(pitches: &[Pitch], a4_freq_hz: f64) -> JustIntonation {
    try_compute_just_intonation(pitches, a4_freq_hz).unwrap_or_else(|err| {
        error!("just intonation unavailable: {err}");
        JustIntonation::default()
    })
}

/// Equal-tempered frequency of every pitch, or empty without a single root.
pub fn equal_frequencies(pitches: &[Pitch], a4_freq_hz: f64) -> Vec<f64> {
    compute_just_intonation(pitches, a4_freq_hz).equal_freqs
}

/// Just-intonation frequency of every pitch, or empty without a single root.
pub fn just_frequencies(pitches: &[Pitch], a4_freq_hz: f64) -> Vec<f64> {
    compute_just_intonation(pitches, a4_freq_hz).just_freqs
}

/// `1200 * log2(just / equal)` for every pitch, or empty without a single root.
pub fn equal_just_diff_cents(pitches: &[Pitch], a4_freq_hz: f64) -> Vec<f64> {
    compute_just_intonation(pitches, a4_freq_hz).cent_diffs
}

/// Cent difference for one note against a root, both given as note strings.
///
/// Used for overlay markers where no full collection exists. Returns `None`
/// if either name fails to parse.
pub fn single_equal_just_diff(note: &str, root_note: &str, a4_freq_hz: f64) -> Option<f64> {
    let note: Pitch = note.parse().ok()?;
    let root: Pitch = root_note.parse().ok()?;

    let root_index = root.semitone_index();
    let just = just_frequency(note.semitone_index(), root_index, equal_frequency(root_index, a4_freq_hz));
    let equal = equal_frequency(note.semitone_index(), a4_freq_hz);
    Some(calculate_cents_deviation(just, equal))
}
