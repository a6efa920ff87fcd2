//! # Note Module
//!
//! Symbolic pitch representation shared by every analysis stage: the twelve
//! pitch classes, a `Pitch` (pitch class + octave + root/enabled flags) and
//! the absolute semitone index used for interval arithmetic.
//!
//! ## Conventions
//! - Canonical spellings: `C C# D Eb E F F# G G# A Bb B`
//! - Enharmonic aliases accepted when parsing: `Db D# Gb Ab A#`
//! - Semitone index: `pitch_class + 12 * octave` (so A4 is 57)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{ChordLensError, Result};

/// Octaves a pitch collection may contain.
pub const SUPPORTED_OCTAVES: RangeInclusive<i32> = 1..=6;

/// One of the twelve pitch classes, independent of octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#", alias = "Db")]
    CSharp,
    D,
    #[serde(rename = "Eb", alias = "D#")]
    EFlat,
    E,
    F,
    #[serde(rename = "F#", alias = "Gb")]
    FSharp,
    G,
    #[serde(rename = "G#", alias = "Ab")]
    GSharp,
    A,
    #[serde(rename = "Bb", alias = "A#")]
    BFlat,
    B,
}

impl PitchClass {
    /// All pitch classes in ascending order starting from C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::EFlat,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::BFlat,
        PitchClass::B,
    ];

    /// Index of the pitch class, C = 0 .. B = 11.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Pitch class for any integer, wrapped into 0..12.
    pub fn from_index(index: i32) -> PitchClass {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Canonical spelling.
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::EFlat => "Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::BFlat => "Bb",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ChordLensError;

    fn from_str(s: &str) -> Result<Self> {
        let class = match s {
            "C" => PitchClass::C,
            "C#" | "Db" => PitchClass::CSharp,
            "D" => PitchClass::D,
            "Eb" | "D#" => PitchClass::EFlat,
            "E" => PitchClass::E,
            "F" => PitchClass::F,
            "F#" | "Gb" => PitchClass::FSharp,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::GSharp,
            "A" => PitchClass::A,
            "Bb" | "A#" => PitchClass::BFlat,
            "B" => PitchClass::B,
            _ => return Err(ChordLensError::InvalidNoteName(s.to_string())),
        };
        Ok(class)
    }
}

/// Absolute semitone position of a pitch class in an octave.
pub fn semitone_index(pitch_class: PitchClass, octave: i32) -> i32 {
    pitch_class.index() as i32 + 12 * octave
}

/// Semitone index of A4, the tuning reference.
pub const A4_SEMITONE_INDEX: i32 = 9 + 12 * 4;

fn default_enabled() -> bool {
    true
}

/// A single entry of a pitch collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    pub pitch_class: PitchClass,
    pub octave: i32,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Pitch {
    /// An enabled, non-root pitch.
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            pitch_class,
            octave,
            is_root: false,
            enabled: true,
        }
    }

    /// An enabled pitch marked as the root.
    pub fn root(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            is_root: true,
            ..Self::new(pitch_class, octave)
        }
    }

    pub fn semitone_index(&self) -> i32 {
        semitone_index(self.pitch_class, self.octave)
    }

    /// Tracking key, e.g. `"C#4"`.
    pub fn key(&self) -> String {
        format!("{}{}", self.pitch_class, self.octave)
    }

    pub fn in_supported_range(&self) -> bool {
        SUPPORTED_OCTAVES.contains(&self.octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

/// Parses a note string like `"C4"`, `"F#3"` or `"Bb5"`.
///
/// The octave is a single digit; anything else is rejected.
impl FromStr for Pitch {
    type Err = ChordLensError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ChordLensError::InvalidNoteName(s.to_string());

        let mut chars = s.chars();
        let octave = chars
            .next_back()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(invalid)?;
        let class: PitchClass = chars.as_str().parse().map_err(|_| invalid())?;

        Ok(Pitch::new(class, octave as i32))
    }
}

/// Number of pitches flagged as root.
pub fn count_roots(pitches: &[Pitch]) -> usize {
    pitches.iter().filter(|p| p.is_root).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_alias_spellings() {
        assert_eq!("C#4".parse::<Pitch>().unwrap(), Pitch::new(PitchClass::CSharp, 4));
        assert_eq!("Db4".parse::<Pitch>().unwrap(), Pitch::new(PitchClass::CSharp, 4));
        assert_eq!("D#2".parse::<Pitch>().unwrap().pitch_class, PitchClass::EFlat);
        assert_eq!("B6".parse::<Pitch>().unwrap().octave, 6);
    }

    #[test]
    fn rejects_malformed_notes() {
        for bad in ["", "C", "H4", "C10", "c4", "4", "C#"] {
            assert!(bad.parse::<Pitch>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn semitone_index_places_a4() {
        assert_eq!(Pitch::new(PitchClass::A, 4).semitone_index(), A4_SEMITONE_INDEX);
        assert_eq!(
            Pitch::new(PitchClass::C, 5).semitone_index() - Pitch::new(PitchClass::B, 4).semitone_index(),
            1
        );
    }

    #[test]
    fn from_index_wraps_negative_values() {
        assert_eq!(PitchClass::from_index(-1), PitchClass::B);
        assert_eq!(PitchClass::from_index(12), PitchClass::C);
    }

    #[test]
    fn serde_uses_camel_case_and_defaults_enabled() {
        let pitch: Pitch = serde_json::from_str(r#"{"pitchClass":"Eb","octave":3,"isRoot":true}"#).unwrap();
        assert_eq!(pitch.pitch_class, PitchClass::EFlat);
        assert!(pitch.is_root);
        assert!(pitch.enabled);

        let json = serde_json::to_string(&Pitch::new(PitchClass::FSharp, 2)).unwrap();
        assert!(json.contains(r#""pitchClass":"F#""#));
    }
}
