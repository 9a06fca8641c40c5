//! Posture scoring
//!
//! Weighted-deviation model: each metric is compared against an ideal target,
//! the deviation is scaled into penalty points, and the penalties are
//! subtracted from a perfect 100.
//!
//! Angle metrics are penalized in both directions. Distance metrics treat the
//! ideal as a tolerance and only penalize the excess above it, so a perfectly
//! level, centered subject loses nothing on them.

use crate::config::{MetricTarget, ScoringConfig};
use crate::types::FeatureSet;
use serde::{Deserialize, Serialize};

/// Score ceiling before penalties
pub const MAX_SCORE: f64 = 100.0;

/// Per-metric penalties behind a score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub elbow_penalty: f64,
    pub knee_penalty: f64,
    pub shoulder_penalty: f64,
    pub hip_penalty: f64,
    pub head_penalty: f64,
    pub spine_penalty: f64,
    /// 100 minus all penalties, before clamping
    pub raw_score: f64,
    /// Final clamped, rounded score
    pub score: u8,
}

impl ScoreBreakdown {
    pub fn total_penalty(&self) -> f64 {
        self.elbow_penalty
            + self.knee_penalty
            + self.shoulder_penalty
            + self.hip_penalty
            + self.head_penalty
            + self.spine_penalty
    }
}

/// Scorer holding the calibration it applies
#[derive(Debug, Clone, Copy, Default)]
pub struct PostureScorer {
    config: ScoringConfig,
}

impl PostureScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a feature set (0-100)
    pub fn score(&self, features: &FeatureSet) -> u8 {
        self.breakdown(features).score
    }

    /// Score a feature set and keep the individual penalties
    pub fn breakdown(&self, features: &FeatureSet) -> ScoreBreakdown {
        let c = &self.config;

        let elbow_penalty = two_sided(features.average_elbow_angle(), c.elbow_angle);
        let knee_penalty = two_sided(features.average_knee_angle(), c.knee_angle);
        let shoulder_penalty = over_tolerance(features.shoulder_diff, c.shoulder_diff);
        let hip_penalty = over_tolerance(features.hip_diff, c.hip_diff);
        let head_penalty = over_tolerance(features.head_alignment, c.head_alignment);
        let spine_penalty = over_tolerance(features.spine_alignment, c.spine_alignment);

        let raw_score = MAX_SCORE
            - (elbow_penalty
                + knee_penalty
                + shoulder_penalty
                + hip_penalty
                + head_penalty
                + spine_penalty);

        ScoreBreakdown {
            elbow_penalty,
            knee_penalty,
            shoulder_penalty,
            hip_penalty,
            head_penalty,
            spine_penalty,
            raw_score,
            score: finalize(raw_score),
        }
    }
}

fn two_sided(observed: f64, target: MetricTarget) -> f64 {
    (observed - target.ideal).abs() * target.scale
}

/// `f64::max` would swallow a NaN here, so it is passed through explicitly
fn over_tolerance(observed: f64, target: MetricTarget) -> f64 {
    if observed.is_nan() {
        return f64::NAN;
    }
    (observed - target.ideal).max(0.0) * target.scale
}

/// Clamp to 0-100 and round; anything non-numeric scores zero
fn finalize(raw_score: f64) -> u8 {
    if raw_score.is_nan() {
        return 0;
    }
    raw_score.clamp(0.0, MAX_SCORE).round() as u8
}
