//! # Chord Root Estimation Module
//!
//! Infers the harmonic root of an unordered pitch collection by matching its
//! interval pattern against a scored table of chord definitions.
//!
//! Every distinct pitch class is tried as the root. For each candidate root
//! the table is scanned in descending score order and the first definition
//! whose interval set is exactly equal wins for that root; lower-scored
//! definitions are never checked for the same root. The best-scoring root
//! across all candidates is the estimate.

use log::debug;
use once_cell::sync::Lazy;
use std::fmt;

use crate::note::{Pitch, PitchClass};

/// A set of intervals above a root, 0..=11, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet(u16);

impl IntervalSet {
    pub fn from_intervals(intervals: &[u8]) -> Self {
        Self(intervals.iter().fold(0, |mask, &i| mask | 1 << (i % 12)))
    }

    pub fn insert(&mut self, interval: u8) {
        self.0 |= 1 << (interval % 12);
    }

    pub fn contains(&self, interval: u8) -> bool {
        interval < 12 && self.0 & (1 << interval) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// A named chord shape with its priority.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordDefinition {
    pub name: &'static str,
    pub intervals: IntervalSet,
    pub score: i32,
}

impl ChordDefinition {
    fn new(name: &'static str, intervals: &[u8], score: i32) -> Self {
        Self {
            name,
            intervals: IntervalSet::from_intervals(intervals),
            score,
        }
    }
}

/// Chord definitions sorted by descending score, built once.
pub static CHORD_DEFINITIONS: Lazy<Vec<ChordDefinition>> = Lazy::new(|| {
    let mut definitions = vec![
        // Triads
        ChordDefinition::new("Major", &[0, 4, 7], 100),
        ChordDefinition::new("Minor", &[0, 3, 7], 99),
        ChordDefinition::new("Sus4", &[0, 5, 7], 95),
        ChordDefinition::new("Sus2", &[0, 2, 7], 94),
        // Sevenths
        ChordDefinition::new("Dominant 7th", &[0, 4, 7, 10], 80),
        ChordDefinition::new("Major 7th", &[0, 4, 7, 11], 79),
        ChordDefinition::new("Minor 7th", &[0, 3, 7, 10], 78),
        ChordDefinition::new("Minor Major 7th", &[0, 3, 7, 11], 75),
        // Less common
        ChordDefinition::new("Major 6th", &[0, 4, 7, 9], 60),
        ChordDefinition::new("Minor 6th", &[0, 3, 7, 9], 59),
        ChordDefinition::new("Half-Diminished 7th", &[0, 3, 6, 10], 55),
        ChordDefinition::new("Diminished 7th", &[0, 3, 6, 9], 54),
        ChordDefinition::new("Augmented", &[0, 4, 8], 50),
        ChordDefinition::new("Diminished", &[0, 3, 6], 49),
        ChordDefinition::new("Minor Augmented", &[0, 3, 8], 40),
    ];
    definitions.sort_by(|a, b| b.score.cmp(&a.score));
    definitions
});

/// The winning chord interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordMatch {
    pub root: PitchClass,
    pub chord: &'static str,
    pub score: i32,
}

impl ChordMatch {
    /// e.g. `"C Major"`
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChordMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.chord)
    }
}

/// Distinct pitch classes of the enabled pitches, in order of first appearance.
fn distinct_pitch_classes(pitches: &[Pitch]) -> Vec<PitchClass> {
    let mut classes: Vec<PitchClass> = Vec::with_capacity(12);
    for pitch in pitches.iter().filter(|p| p.enabled) {
        if !classes.contains(&pitch.pitch_class) {
            classes.push(pitch.pitch_class);
        }
    }
    classes
}

/// First definition, in score order, whose interval set equals `intervals`.
fn first_match(intervals: IntervalSet) -> Option<&'static ChordDefinition> {
    CHORD_DEFINITIONS.iter().find(|d| d.intervals == intervals)
}

/// Identifies the chord of a collection without modifying it.
///
/// Returns `None` for fewer than two enabled pitches or when no definition
/// matches. Equal scores keep the root candidate seen first.
pub fn identify_chord(pitches: &[Pitch]) -> Option<ChordMatch> {
    if pitches.iter().filter(|p| p.enabled).count() < 2 {
        return None;
    }

    let classes = distinct_pitch_classes(pitches);
    let mut best: Option<ChordMatch> = None;

    for &root in &classes {
        let mut intervals = IntervalSet::default();
        for &class in &classes {
            intervals.insert((class.index() + 12 - root.index()) % 12);
        }

        if let Some(definition) = first_match(intervals) {
            if best.as_ref().is_none_or(|b| definition.score > b.score) {
                best = Some(ChordMatch {
                    root,
                    chord: definition.name,
                    score: definition.score,
                });
            }
        }
    }

    best
}

/// Marks the estimated root in place.
///
/// Every pitch whose pitch class equals the winning root becomes a root (a
/// doubled root is marked in each octave); all others are cleared. The
/// collection is left untouched when no chord is identified.
pub fn estimate_root(pitches: &mut [Pitch]) -> Option<ChordMatch> {
    let found = identify_chord(pitches)?;
    debug!("estimated chord {found} (score {})", found.score);

    for pitch in pitches.iter_mut() {
        pitch.is_root = pitch.pitch_class == found.root;
    }
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pitches(notes: &[&str]) -> Vec<Pitch> {
        notes.iter().map(|n| n.parse().unwrap()).collect()
    }

    fn roots(pitches: &[Pitch]) -> Vec<bool> {
        pitches.iter().map(|p| p.is_root).collect()
    }

    #[test]
    fn table_is_sorted_by_score() {
        assert!(CHORD_DEFINITIONS.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(CHORD_DEFINITIONS[0].name, "Major");
        assert_eq!(CHORD_DEFINITIONS.len(), 15);
    }

    #[test]
    fn triads_and_sevenths() {
        let cases = [
            (vec!["C4", "E4", "G4"], PitchClass::C, "C Major"),
            (vec!["D4", "F4", "A4"], PitchClass::D, "D Minor"),
            (vec!["G3", "B3", "D4", "F4"], PitchClass::G, "G Dominant 7th"),
            (vec!["A3", "C4", "E4", "G4"], PitchClass::A, "A Minor 7th"),
        ];
        for (notes, root, name) in cases {
            let mut list = pitches(&notes);
            let found = estimate_root(&mut list).unwrap();
            assert_eq!(found.root, root);
            assert_eq!(found.name(), name);
            assert!(list.iter().all(|p| p.is_root == (p.pitch_class == root)));
        }
    }

    #[test]
    fn inversion_marks_the_upper_root() {
        let mut list = pitches(&["E4", "G4", "C5"]);
        estimate_root(&mut list);
        assert_eq!(roots(&list), vec![false, false, true]);
    }

    #[test]
    fn doubled_root_is_marked_in_both_octaves() {
        let mut list = pitches(&["C3", "E4", "G4", "C5"]);
        estimate_root(&mut list);
        assert_eq!(roots(&list), vec![true, false, false, true]);
    }

    #[test]
    fn previous_root_is_replaced() {
        let mut list = pitches(&["C4", "E4", "G4"]);
        list[1].is_root = true;
        estimate_root(&mut list);
        assert_eq!(roots(&list), vec![true, false, false]);
    }

    #[test]
    fn too_few_pitches_leave_collection_unchanged() {
        let mut single = vec![Pitch::root(PitchClass::E, 4)];
        assert_eq!(estimate_root(&mut single), None);
        assert_eq!(roots(&single), vec![true]);

        let mut empty: Vec<Pitch> = Vec::new();
        assert_eq!(estimate_root(&mut empty), None);
    }

    #[test]
    fn unknown_shape_leaves_collection_unchanged() {
        let mut list = pitches(&["C4", "C#4", "D4"]);
        list[2].is_root = true;
        assert_eq!(estimate_root(&mut list), None);
        assert_eq!(roots(&list), vec![false, false, true]);
    }

    #[test]
    fn disabled_pitches_are_ignored_for_matching() {
        // C E G with a disabled Bb: still C Major rather than C7.
        let mut list = pitches(&["C4", "E4", "G4", "Bb4"]);
        list[3].enabled = false;
        let found = estimate_root(&mut list).unwrap();
        assert_eq!(found.chord, "Major");
    }

    #[test]
    fn symmetric_shape_keeps_first_root_candidate() {
        // An augmented triad matches from every root; the first listed wins.
        let found = identify_chord(&pitches(&["E4", "G#4", "C5"])).unwrap();
        assert_eq!(found.root, PitchClass::E);
        assert_eq!(found.chord, "Augmented");
    }

    #[test]
    fn interval_set_equality_needs_same_members() {
        let major = IntervalSet::from_intervals(&[0, 4, 7]);
        assert_eq!(major, IntervalSet::from_intervals(&[7, 0, 4, 4]));
        assert_ne!(major, IntervalSet::from_intervals(&[0, 4, 7, 10]));
        assert_eq!(major.len(), 3);
        assert!(major.contains(4) && !major.contains(3));
    }
}
