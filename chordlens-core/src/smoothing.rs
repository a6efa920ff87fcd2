//! # Temporal Smoothing Module
//!
//! EMA + hold smoothing for per-pitch measurement streams. A detected value
//! updates an exponential moving average; a missing value keeps showing the
//! last average for `hold_ms` and then disappears. State is kept per key so
//! that simultaneous notes do not share hold timers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Smoothing state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmaHoldState {
    pub last_seen_ms: f64,
    pub smoothed_value: f64,
}

/// Smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmaHoldOptions {
    /// 0..=1, higher follows the raw value faster.
    pub alpha: f64,
    /// How long a value is held after detection stops.
    pub hold_ms: f64,
}

impl Default for EmaHoldOptions {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            hold_ms: 250.0,
        }
    }
}

impl EmaHoldOptions {
    /// Alpha clamped to [0, 1] (NaN becomes 0) and hold clamped to >= 0
    /// (non-finite becomes 0).
    pub fn sanitized(self) -> Self {
        let alpha = if self.alpha.is_nan() { 0.0 } else { self.alpha.clamp(0.0, 1.0) };
        let hold_ms = if self.hold_ms.is_finite() { self.hold_ms.max(0.0) } else { 0.0 };
        Self { alpha, hold_ms }
    }
}

/// What to display for one key after an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmaHoldReading {
    pub value: Option<f64>,
    pub is_detected: bool,
    pub is_held: bool,
}

/// Updates the state of `key` with one raw measurement.
///
/// - `Some(raw)`: EMA update (the first value, or the first one after an
///   expired hold, seeds the average)
/// - `None` within `hold_ms` of the last detection: previous average, held
/// - otherwise: no value, and the key's state is dropped
///
/// A held reading does not modify the state.
pub fn update_ema_hold(
    states: &mut HashMap<String, EmaHoldState>,
    key: &str,
    raw_value: Option<f64>,
    now_ms: f64,
    options: EmaHoldOptions,
) -> EmaHoldReading {
    let EmaHoldOptions { alpha, hold_ms } = options.sanitized();
    let previous = states
        .get(key)
        .copied()
        .filter(|p| now_ms - p.last_seen_ms <= hold_ms);

    if let Some(raw) = raw_value {
        let prev_smoothed = previous.map_or(raw, |p| p.smoothed_value);
        let smoothed = prev_smoothed + (raw - prev_smoothed) * alpha;

        states.insert(
            key.to_string(),
            EmaHoldState {
                last_seen_ms: now_ms,
                smoothed_value: smoothed,
            },
        );
        return EmaHoldReading {
            value: Some(smoothed),
            is_detected: true,
            is_held: false,
        };
    }

    match previous {
        Some(prev) => EmaHoldReading {
            value: Some(prev.smoothed_value),
            is_detected: false,
            is_held: true,
        },
        None => {
            states.remove(key);
            EmaHoldReading::default()
        }
    }
}

/// Batch form of [`update_ema_hold`]; `raw_values` aligns with `keys`, and
/// missing entries count as `None`.
pub fn update_ema_hold_list(
    states: &mut HashMap<String, EmaHoldState>,
    keys: &[String],
    raw_values: &[Option<f64>],
    now_ms: f64,
    options: EmaHoldOptions,
) -> Vec<EmaHoldReading> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| update_ema_hold(states, key, raw_values.get(i).copied().flatten(), now_ms, options))
        .collect()
}

/// Smoothing state owned by one measurement session.
#[derive(Debug, Clone, Default)]
pub struct EmaHoldTracker {
    options: EmaHoldOptions,
    states: HashMap<String, EmaHoldState>,
}

impl EmaHoldTracker {
    pub fn new(options: EmaHoldOptions) -> Self {
        Self {
            options,
            states: HashMap::new(),
        }
    }

    pub fn options(&self) -> EmaHoldOptions {
        self.options
    }

    pub fn set_options(&mut self, options: EmaHoldOptions) {
        self.options = options;
    }

    pub fn update(&mut self, key: &str, raw_value: Option<f64>, now_ms: f64) -> EmaHoldReading {
        update_ema_hold(&mut self.states, key, raw_value, now_ms, self.options)
    }

    pub fn update_all(&mut self, keys: &[String], raw_values: &[Option<f64>], now_ms: f64) -> Vec<EmaHoldReading> {
        update_ema_hold_list(&mut self.states, keys, raw_values, now_ms, self.options)
    }

    pub fn state(&self, key: &str) -> Option<&EmaHoldState> {
        self.states.get(key)
    }

    /// Drops every key's state.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn opts(alpha: f64, hold_ms: f64) -> EmaHoldOptions {
        EmaHoldOptions { alpha, hold_ms }
    }

    #[test]
    fn ema_seeds_then_smooths() {
        let mut states = HashMap::new();

        let first = update_ema_hold(&mut states, "A4", Some(10.0), 0.0, opts(0.5, 250.0));
        assert_abs_diff_eq!(first.value.unwrap(), 10.0);
        assert!(first.is_detected && !first.is_held);

        let second = update_ema_hold(&mut states, "A4", Some(20.0), 10.0, opts(0.5, 250.0));
        assert_abs_diff_eq!(second.value.unwrap(), 15.0);
        assert!(second.is_detected && !second.is_held);
    }

    #[test]
    fn holds_within_window_then_clears() {
        let mut states = HashMap::new();
        update_ema_hold(&mut states, "A4", Some(10.0), 0.0, opts(1.0, 50.0));

        let held = update_ema_hold(&mut states, "A4", None, 30.0, opts(1.0, 50.0));
        assert_eq!(held, EmaHoldReading { value: Some(10.0), is_detected: false, is_held: true });
        assert_eq!(states["A4"].last_seen_ms, 0.0);

        let cleared = update_ema_hold(&mut states, "A4", None, 100.0, opts(1.0, 50.0));
        assert_eq!(cleared, EmaHoldReading::default());
    }

    #[test]
    fn expired_state_reseeds() {
        let mut states = HashMap::new();
        update_ema_hold(&mut states, "C4", Some(10.0), 0.0, opts(0.5, 50.0));

        let expired = update_ema_hold(&mut states, "C4", None, 1000.0, opts(0.5, 50.0));
        assert_eq!(expired, EmaHoldReading::default());
        assert!(!states.contains_key("C4"));

        let next = update_ema_hold(&mut states, "C4", Some(20.0), 1100.0, opts(0.5, 50.0));
        assert_eq!(next.value, Some(20.0));
    }

    #[test]
    fn late_value_without_gap_reading_reseeds() {
        let mut states = HashMap::new();
        update_ema_hold(&mut states, "C4", Some(10.0), 0.0, opts(0.5, 50.0));

        let next = update_ema_hold(&mut states, "C4", Some(20.0), 51.0, opts(0.5, 50.0));
        assert_eq!(next.value, Some(20.0));

        let blended = update_ema_hold(&mut states, "C4", Some(30.0), 100.0, opts(0.5, 50.0));
        assert_eq!(blended.value, Some(25.0));
    }

    #[test]
    fn keys_do_not_interfere() {
        let mut tracker = EmaHoldTracker::new(opts(1.0, 50.0));
        let keys = vec!["C4".to_string(), "E4".to_string()];

        tracker.update_all(&keys, &[Some(1.0), Some(2.0)], 0.0);
        tracker.update_all(&keys, &[Some(3.0), None], 40.0);
        let readings = tracker.update_all(&keys, &[None, None], 80.0);

        assert_eq!(readings[0].value, Some(3.0));
        assert!(readings[0].is_held);
        assert_eq!(readings[1], EmaHoldReading::default());
    }

    #[test]
    fn missing_raw_entries_count_as_none() {
        let mut tracker = EmaHoldTracker::new(opts(0.5, 0.0));
        let keys = vec!["C4".to_string(), "E4".to_string()];
        let readings = tracker.update_all(&keys, &[Some(1.0)], 0.0);
        assert!(readings[0].is_detected);
        assert!(!readings[1].is_detected && readings[1].value.is_none());
    }

    #[test]
    fn options_are_sanitized() {
        assert_eq!(opts(f64::NAN, f64::INFINITY).sanitized(), opts(0.0, 0.0));
        assert_eq!(opts(2.0, -5.0).sanitized(), opts(1.0, 0.0));

        // alpha 0 freezes the seeded value
        let mut states = HashMap::new();
        update_ema_hold(&mut states, "G4", Some(5.0), 0.0, opts(-1.0, 100.0));
        let frozen = update_ema_hold(&mut states, "G4", Some(50.0), 1.0, opts(-1.0, 100.0));
        assert_eq!(frozen.value, Some(5.0));
    }

    #[test]
    fn reset_forgets_all_keys() {
        let mut tracker = EmaHoldTracker::default();
        tracker.update("A4", Some(1.0), 0.0);
        tracker.reset();
        assert!(tracker.state("A4").is_none());
        assert_eq!(tracker.update("A4", None, 1.0), EmaHoldReading::default());
    }
}
