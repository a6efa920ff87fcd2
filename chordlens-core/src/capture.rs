//! # Capture Module
//!
//! Turns a short recording of per-frame pitch detections into a ranked
//! suggestion. Single frames are noisy: a note that shows up in many frames
//! with good confidence should beat one that spikes once.
//!
//! A [`DetectionSession`] owns the frame buffer for one recording window and
//! is consumed when the result is taken, so no buffer outlives its session.

use log::debug;

use crate::pitch::{DetectorConfig, MAX_CANDIDATES, PitchCandidate, detect_pitch_with};

/// Default recording window in milliseconds.
pub const DEFAULT_RECORD_DURATION_MS: f64 = 1500.0;
/// Default spacing between analysed frames in milliseconds.
pub const DEFAULT_ANALYSIS_INTERVAL_MS: f64 = 100.0;

/// Occurrences of one (pitch class, octave) across frames.
#[derive(Debug, Clone)]
struct CandidateGroup {
    count: usize,
    total_confidence: f64,
    /// The most confident sighting, used for presentation.
    representative: PitchCandidate,
}

impl CandidateGroup {
    /// count * average confidence
    fn score(&self) -> f64 {
        let average = self.total_confidence / self.count as f64;
        self.count as f64 * average
    }
}

/// Merges the candidate lists of several frames into a top-3 ranking.
///
/// Candidates are grouped by pitch class and octave and scored by
/// `count * average_confidence`. The returned confidences are the scores
/// renormalised to sum to 1. Groups with equal scores keep the order in
/// which they were first seen.
pub fn aggregate_pitch_results(frame_results: &[Vec<PitchCandidate>]) -> Vec<PitchCandidate> {
    let mut groups: Vec<CandidateGroup> = Vec::new();

    for candidate in frame_results.iter().flatten() {
        let existing = groups.iter_mut().find(|g| {
            g.representative.pitch_class == candidate.pitch_class && g.representative.octave == candidate.octave
        });
        match existing {
            Some(group) => {
                group.count += 1;
                group.total_confidence += candidate.confidence;
                if candidate.confidence > group.representative.confidence {
                    group.representative = candidate.clone();
                }
            }
            None => groups.push(CandidateGroup {
                count: 1,
                total_confidence: candidate.confidence,
                representative: candidate.clone(),
            }),
        }
    }

    let mut scored: Vec<(f64, PitchCandidate)> = groups.into_iter().map(|g| (g.score(), g.representative)).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(MAX_CANDIDATES);

    let total_score: f64 = scored.iter().map(|(score, _)| score).sum();
    scored
        .into_iter()
        .map(|(score, candidate)| PitchCandidate {
            confidence: if total_score > 0.0 { score / total_score } else { 0.0 },
            ..candidate
        })
        .collect()
}

/// Frame buffer of one pitch detection recording.
#[derive(Debug, Clone)]
pub struct DetectionSession {
    started_at_ms: f64,
    record_duration_ms: f64,
    analysis_interval_ms: f64,
    last_analysis_ms: Option<f64>,
    detector: DetectorConfig,
    frames: Vec<Vec<PitchCandidate>>,
}

impl DetectionSession {
    /// Starts a session with the default window and detector bounds.
    pub fn new(started_at_ms: f64) -> Self {
        Self::with_window(started_at_ms, DEFAULT_RECORD_DURATION_MS, DEFAULT_ANALYSIS_INTERVAL_MS)
    }

    pub fn with_window(started_at_ms: f64, record_duration_ms: f64, analysis_interval_ms: f64) -> Self {
        debug!("pitch detection session started at {started_at_ms:.0} ms ({record_duration_ms:.0} ms window)");
        Self {
            started_at_ms,
            record_duration_ms: record_duration_ms.max(0.0),
            analysis_interval_ms: analysis_interval_ms.max(0.0),
            last_analysis_ms: None,
            detector: DetectorConfig::default(),
            frames: Vec::new(),
        }
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Whether the recording window has elapsed.
    pub fn is_complete(&self, now_ms: f64) -> bool {
        now_ms - self.started_at_ms >= self.record_duration_ms
    }

    /// Whether enough time has passed since the last analysed frame.
    pub fn is_due(&self, now_ms: f64) -> bool {
        match self.last_analysis_ms {
            Some(last) => now_ms - last >= self.analysis_interval_ms,
            None => true,
        }
    }

    /// Stores one frame's candidates taken at `now_ms`.
    ///
    /// Empty frames and frames arriving after the window closed are ignored.
    pub fn push_frame(&mut self, now_ms: f64, candidates: Vec<PitchCandidate>) {
        if !candidates.is_empty() && !self.is_complete(now_ms) {
            self.frames.push(candidates);
        }
    }

    /// Runs the detector on `buffer` and stores the result.
    ///
    /// Does nothing once the window is complete or before the next interval
    /// is due. Returns the frame's candidates.
    pub fn analyze(
        &mut self,
        now_ms: f64,
        buffer: &[f32],
        sample_rate: u32,
        a4_freq_hz: f64,
    ) -> Vec<PitchCandidate> {
        if self.is_complete(now_ms) || !self.is_due(now_ms) {
            return Vec::new();
        }
        self.last_analysis_ms = Some(now_ms);

        let candidates = detect_pitch_with(buffer, sample_rate, a4_freq_hz, &self.detector);
        self.push_frame(now_ms, candidates.clone());
        candidates
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Ends the session and returns the aggregated suggestion.
    pub fn finish(self) -> Vec<PitchCandidate> {
        let result = aggregate_pitch_results(&self.frames);
        debug!(
            "pitch detection session finished: {} frames, best {:?}",
            self.frames.len(),
            result.first().map(|c| format!("{}{}", c.pitch_class, c.octave))
        );
        result
    }
}
