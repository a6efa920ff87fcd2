//! # Configuration Module
//!
//! Plain settings the caller hands to the analysis core. Nothing here is
//! global: defaults exist only through [`Default`], and every analysis call
//! receives its values explicitly.
//!
//! Settings can be read from JSON, e.g.
//!
//! ```json
//! { "a4FreqHz": 440.0, "evalRangeCents": 30.0, "interpolation": "centroid" }
//! ```
//!
//! Missing fields take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ChordLensError;
use crate::interpolation::InterpolationMethod;
use crate::smoothing::EmaHoldOptions;
use crate::spectrum::EvaluationParams;

/// Reference pitch of A4 in Hz.
pub const DEFAULT_A4_FREQ_HZ: f64 = 442.0;
/// ± window around each target, in cents.
pub const DEFAULT_EVAL_RANGE_CENTS: f64 = 50.0;
/// Spectra below this level are not evaluated.
pub const DEFAULT_THRESHOLD_DB: f32 = -100.0;
pub const DEFAULT_FFT_SIZE: usize = 32768;
pub const DEFAULT_SMOOTHING_TIME_CONSTANT: f32 = 0.8;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// User sensitivity bounds (0 = loud notes only, 100 = most sensitive).
pub const SENSITIVITY_MIN: f64 = 0.0;
pub const SENSITIVITY_MAX: f64 = 100.0;
pub const SENSITIVITY_DEFAULT: f64 = 50.0;

/// Maps a 0..=100 sensitivity to a dB threshold.
///
/// 0 -> -60 dB, 50 -> -100 dB, 100 -> -140 dB.
pub fn sensitivity_to_db(sensitivity: f64) -> f64 {
    -60.0 - (sensitivity / 100.0) * 80.0
}

/// Inverse of [`sensitivity_to_db`], rounded to an integer step.
pub fn db_to_sensitivity(db: f64) -> f64 {
    ((-60.0 - db) / 80.0 * 100.0).round()
}

/// Analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisSettings {
    pub a4_freq_hz: f64,
    pub eval_range_cents: f64,
    pub threshold_db: f32,
    /// FFT length of the spectrum analyzer, a power of two.
    pub fft_size: usize,
    /// Spectral smoothing of the analyzer, 0..=1.
    pub smoothing_time_constant: f32,
    pub interpolation: InterpolationMethod,
    pub centroid_top_n: usize,
    pub ema: EmaHoldOptions,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            a4_freq_hz: DEFAULT_A4_FREQ_HZ,
            eval_range_cents: DEFAULT_EVAL_RANGE_CENTS,
            threshold_db: DEFAULT_THRESHOLD_DB,
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: DEFAULT_SMOOTHING_TIME_CONSTANT,
            interpolation: InterpolationMethod::Parabolic,
            centroid_top_n: 3,
            ema: EmaHoldOptions::default(),
        }
    }
}

impl AnalysisSettings {
    /// Checks ranges the analysis relies on.
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| -> crate::error::Result<()> {
            Err(ChordLensError::InvalidSettings(msg))
        };

        if !(self.a4_freq_hz.is_finite() && self.a4_freq_hz > 0.0) {
            return invalid(format!("a4FreqHz must be positive, got {}", self.a4_freq_hz));
        }
        if !(self.eval_range_cents.is_finite() && self.eval_range_cents > 0.0) {
            return invalid(format!("evalRangeCents must be positive, got {}", self.eval_range_cents));
        }
        if self.threshold_db.is_nan() {
            return invalid("thresholdDb must be a number".to_string());
        }
        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size) {
            return invalid(format!(
                "fftSize must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {}",
                self.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return invalid(format!(
                "smoothingTimeConstant must be within 0..=1, got {}",
                self.smoothing_time_constant
            ));
        }
        if self.centroid_top_n == 0 {
            return invalid("centroidTopN must be at least 1".to_string());
        }
        Ok(())
    }

    /// Sets the detection threshold from a 0..=100 sensitivity.
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        let sensitivity = sensitivity.clamp(SENSITIVITY_MIN, SENSITIVITY_MAX);
        self.threshold_db = sensitivity_to_db(sensitivity) as f32;
        self
    }

    pub fn sensitivity(&self) -> f64 {
        db_to_sensitivity(self.threshold_db as f64)
    }

    /// Parameters for one spectrum evaluation.
    pub fn evaluation_params(&self, include_debug: bool) -> EvaluationParams {
        EvaluationParams {
            eval_range_cents: self.eval_range_cents,
            a4_freq_hz: self.a4_freq_hz,
            threshold_db: self.threshold_db,
            interpolation: self.interpolation,
            centroid_top_n: self.centroid_top_n,
            include_debug,
        }
    }

    /// Parses and validates settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("failed to parse analysis settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Writes settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write settings to {}", path.display()))
    }
}
