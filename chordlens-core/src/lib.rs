// chordlens-core/src/lib.rs

//! The core logic for the just-intonation chord tuner.
//! This crate computes just-intonation targets for a chord, measures how far
//! each sounding note is from its target, detects and aggregates pitches to
//! propose a chord and its root, and smooths readings over time. It is
//! completely headless: no audio capture and no GUI code.
//!
//! ## Pipeline
//! - [`fft::SpectrumAnalyzer`] turns audio frames into a dB spectrum
//! - [`spectrum::evaluate_spectrum`] compares the spectrum with the
//!   [`tuning`] targets of a [`note::Pitch`] collection
//! - [`session::TrackingSession`] smooths the per-pitch cent offsets
//! - [`capture::DetectionSession`] collects [`pitch`] candidates over a short
//!   recording and [`chord::estimate_root`] picks the chord root

pub mod capture;
pub mod chord;
pub mod config;
pub mod error;
pub mod fft;
pub mod interpolation;
pub mod note;
pub mod pitch;
pub mod session;
pub mod smoothing;
pub mod spectrum;
pub mod tuning;

pub use capture::{DetectionSession, aggregate_pitch_results};
pub use chord::{ChordMatch, estimate_root, identify_chord};
pub use config::AnalysisSettings;
pub use error::{ChordLensError, Result};
pub use fft::SpectrumAnalyzer;
pub use interpolation::InterpolationMethod;
pub use note::{Pitch, PitchClass};
pub use pitch::{PitchCandidate, detect_pitch};
pub use session::{PitchReading, TrackingSession};
pub use smoothing::{
    EmaHoldOptions, EmaHoldReading, EmaHoldState, EmaHoldTracker, update_ema_hold, update_ema_hold_list,
};
pub use spectrum::{EvaluationParams, EvaluationResult, evaluate_spectrum};
pub use tuning::{
    JustIntonation, compute_just_intonation, equal_frequencies, equal_just_diff_cents, just_frequencies,
    single_equal_just_diff,
};
