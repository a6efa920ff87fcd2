//! # Tracking Session Module
//!
//! Drives the per-frame measurement loop: evaluate the spectrum against the
//! current pitch collection, then smooth each pitch's cent offset so the
//! display neither jitters nor blinks out between frames.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::AnalysisSettings;
use crate::note::Pitch;
use crate::smoothing::{EmaHoldReading, EmaHoldTracker};
use crate::spectrum::{EvaluationDebug, EvaluationResult, evaluate_spectrum};

/// What the display shows for one pitch after a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchReading {
    /// `"<pitch class><octave>"`, e.g. `"C#4"`.
    pub key: String,
    pub enabled: bool,
    /// Normalised deviation of this frame, [-1, 1].
    pub deviation: Option<f64>,
    /// Cent offset of this frame before smoothing.
    pub cent_deviation_raw: Option<f64>,
    /// Smoothed (or held) cent offset.
    pub cent_deviation_display: Option<f64>,
    pub is_detected: bool,
    pub is_held: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<EvaluationDebug>,
}

/// Per-frame evaluation plus smoothing for one measurement.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    settings: AnalysisSettings,
    tracker: EmaHoldTracker,
    keys: Vec<String>,
    include_debug: bool,
}

impl TrackingSession {
    pub fn new(settings: AnalysisSettings) -> Self {
        let tracker = EmaHoldTracker::new(settings.ema);
        Self {
            settings,
            tracker,
            keys: Vec::new(),
            include_debug: false,
        }
    }

    /// Attach the search window contents to every reading.
    pub fn with_debug(mut self, include_debug: bool) -> Self {
        self.include_debug = include_debug;
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Replaces the settings; smoothing state is kept.
    pub fn set_settings(&mut self, settings: AnalysisSettings) {
        self.tracker.set_options(settings.ema);
        self.settings = settings;
    }

    pub fn tracker(&self) -> &EmaHoldTracker {
        &self.tracker
    }

    /// Evaluates one spectrum frame.
    ///
    /// # Arguments
    /// * `spectrum_db` - Magnitude spectrum in dB
    /// * `bin_freqs` - Ascending bin frequencies in Hz
    /// * `pitches` - Target collection with exactly one root
    /// * `now_ms` - Frame timestamp
    ///
    /// # Returns
    /// * `Vec<PitchReading>` - One reading per pitch, empty when the
    ///   collection has no single root
    ///
    /// A pitch listed more than once shares one smoothing state; it is
    /// updated once per frame and every copy gets the same reading.
    pub fn process_frame(
        &mut self,
        spectrum_db: &[f32],
        bin_freqs: &[f64],
        pitches: &[Pitch],
        now_ms: f64,
    ) -> Vec<PitchReading> {
        let params = self.settings.evaluation_params(self.include_debug);
        let results = evaluate_spectrum(spectrum_db, bin_freqs, pitches, &params);
        if results.is_empty() {
            return Vec::new();
        }

        let keys: Vec<String> = pitches.iter().map(Pitch::key).collect();
        if keys != self.keys {
            debug!("pitch set changed to {keys:?}, clearing smoothing state");
            self.tracker.reset();
            self.keys = keys;
        }

        let eval_range = self.settings.eval_range_cents;
        let raw_values: Vec<Option<f64>> = results
            .iter()
            .map(|r| r.cent_deviation.or_else(|| r.deviation.map(|d| d * eval_range)))
            .collect();
        let mut frame_readings: HashMap<&str, EmaHoldReading> = HashMap::new();
        let smoothed: Vec<EmaHoldReading> = self
            .keys
            .iter()
            .zip(&raw_values)
            .map(|(key, &raw)| {
                *frame_readings
                    .entry(key.as_str())
                    .or_insert_with(|| self.tracker.update(key, raw, now_ms))
            })
            .collect();

        pitches
            .iter()
            .zip(self.keys.iter())
            .zip(results)
            .zip(raw_values.into_iter().zip(smoothed))
            .map(|(((pitch, key), result), (raw, reading))| {
                let EvaluationResult { deviation, debug, .. } = result;
                PitchReading {
                    key: key.clone(),
                    enabled: pitch.enabled,
                    deviation,
                    cent_deviation_raw: raw,
                    cent_deviation_display: reading.value,
                    is_detected: reading.is_detected,
                    is_held: reading.is_held,
                    debug,
                }
            })
            .collect()
    }

    /// Drops all smoothing state.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::PitchClass;
    use crate::smoothing::EmaHoldOptions;
    use crate::tuning::just_frequencies;
    use approx::assert_abs_diff_eq;

    fn axis() -> Vec<f64> {
        (0..1000).map(f64::from).collect()
    }

    fn spectrum_with_peaks(freqs: &[f64], peaks: &[f64]) -> Vec<f32> {
        freqs
            .iter()
            .map(|&f| {
                peaks
                    .iter()
                    .map(|&p| (-20.0 - 6.0 * (f - p) * (f - p)) as f32)
                    .fold(-140.0_f32, f32::max)
            })
            .collect()
    }

    fn c_major() -> Vec<Pitch> {
        vec![
            Pitch::root(PitchClass::C, 4),
            Pitch::new(PitchClass::E, 4),
            Pitch::new(PitchClass::G, 4),
        ]
    }

    fn session() -> TrackingSession {
        TrackingSession::new(AnalysisSettings {
            ema: EmaHoldOptions {
                alpha: 0.5,
                hold_ms: 100.0,
            },
            ..AnalysisSettings::default()
        })
    }

    #[test]
    fn in_tune_chord_is_detected() {
        let freqs = axis();
        let pitches = c_major();
        let spectrum = spectrum_with_peaks(&freqs, &just_frequencies(&pitches, 442.0));

        let readings = session().process_frame(&spectrum, &freqs, &pitches, 0.0);
        assert_eq!(
            readings.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
            ["C4", "E4", "G4"]
        );
        for reading in &readings {
            assert!(reading.is_detected);
            assert!(!reading.is_held);
            assert_abs_diff_eq!(reading.cent_deviation_display.unwrap(), 0.0, epsilon = 1.0);
            assert_eq!(reading.cent_deviation_display, reading.cent_deviation_raw);
        }
    }

    #[test]
    fn silence_holds_then_clears() {
        let freqs = axis();
        let pitches = c_major();
        let loud = spectrum_with_peaks(&freqs, &just_frequencies(&pitches, 442.0));
        let quiet = vec![-140.0_f32; freqs.len()];
        let mut session = session();

        let first = session.process_frame(&loud, &freqs, &pitches, 0.0);
        let held = session.process_frame(&quiet, &freqs, &pitches, 80.0);
        assert!(held.iter().all(|r| r.is_held && !r.is_detected && r.cent_deviation_raw.is_none()));
        assert_eq!(held[1].cent_deviation_display, first[1].cent_deviation_display);

        let cleared = session.process_frame(&quiet, &freqs, &pitches, 200.0);
        assert!(cleared.iter().all(|r| r.cent_deviation_display.is_none() && !r.is_held));
    }

    #[test]
    fn changing_pitch_set_clears_state() {
        let freqs = axis();
        let pitches = c_major();
        let loud = spectrum_with_peaks(&freqs, &just_frequencies(&pitches, 442.0));
        let mut session = session();

        session.process_frame(&loud, &freqs, &pitches, 0.0);
        assert!(session.tracker().state("E4").is_some());

        let other = vec![Pitch::root(PitchClass::D, 4)];
        session.process_frame(&loud, &freqs, &other, 10.0);
        assert!(session.tracker().state("E4").is_none());
    }

    #[test]
    fn repeated_pitch_is_smoothed_once_per_frame() {
        let freqs = axis();
        let pitches = vec![
            Pitch::root(PitchClass::A, 4),
            Pitch::new(PitchClass::E, 5),
            Pitch::new(PitchClass::A, 4),
        ];
        let targets = just_frequencies(&pitches, 442.0);
        let sharp: Vec<f64> = targets.iter().map(|f| f * 2f64.powf(10.0 / 1200.0)).collect();
        let mut session = session();

        let first = session.process_frame(&spectrum_with_peaks(&freqs, &targets), &freqs, &pitches, 0.0);
        let second = session.process_frame(&spectrum_with_peaks(&freqs, &sharp), &freqs, &pitches, 10.0);

        let start = first[0].cent_deviation_raw.unwrap();
        let expected = start + (second[0].cent_deviation_raw.unwrap() - start) * 0.5;
        assert_abs_diff_eq!(second[0].cent_deviation_display.unwrap(), expected, epsilon = 1e-9);
        assert_eq!(second[2].cent_deviation_display, second[0].cent_deviation_display);
    }

    #[test]
    fn no_root_yields_nothing() {
        let freqs = axis();
        let pitches = vec![Pitch::new(PitchClass::C, 4)];
        let spectrum = vec![-20.0_f32; freqs.len()];
        assert!(session().process_frame(&spectrum, &freqs, &pitches, 0.0).is_empty());
    }

    #[test]
    fn debug_payload_is_forwarded() {
        let freqs = axis();
        let pitches = vec![Pitch::root(PitchClass::A, 4)];
        let spectrum = spectrum_with_peaks(&freqs, &[442.0]);

        let mut session = session().with_debug(true);
        let reading = &session.process_frame(&spectrum, &freqs, &pitches, 0.0)[0];
        assert_eq!(reading.debug.as_ref().map(|d| d.peak.idx), Some(442));
    }
}
