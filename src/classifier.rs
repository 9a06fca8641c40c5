//! Status classification
//!
//! Maps scores to discrete status categories, advisory messages, and
//! posture-improvement recommendations.

use crate::scorer::ScoreBreakdown;
use crate::types::PostureStatus;
use crate::validator::ValidationError;

/// Advisory shown when the provider reports no subject in view
pub const NO_SUBJECT_MESSAGE: &str = "No person detected. Please step into the camera frame.";

/// Posture-improvement tips
pub const TIP_NEUTRAL_SPINE: &str = "Maintain a neutral spine position.";
pub const TIP_TAKE_BREAKS: &str = "Take regular breaks from sitting.";
pub const TIP_STRETCH: &str = "Perform stretching exercises.";
pub const TIP_ERGONOMICS: &str = "Adjust your workspace ergonomics.";
pub const TIP_KEEP_GOING: &str =
    "Keep a straight back, relax your shoulders, and avoid slouching.";

/// Status thresholds; a score must exceed a threshold to earn its status
const EXCELLENT_ABOVE: u8 = 90;
const GOOD_ABOVE: u8 = 75;
const FAIR_ABOVE: u8 = 60;
const POOR_ABOVE: u8 = 40;

pub struct StatusClassifier;

impl StatusClassifier {
    /// Classify a score, checked from the top category down
    pub fn classify(score: u8) -> PostureStatus {
        if score > EXCELLENT_ABOVE {
            PostureStatus::Excellent
        } else if score > GOOD_ABOVE {
            PostureStatus::Good
        } else if score > FAIR_ABOVE {
            PostureStatus::Fair
        } else if score > POOR_ABOVE {
            PostureStatus::Poor
        } else {
            PostureStatus::Critical
        }
    }

    /// Fixed advisory message for a scored status
    pub fn message(status: PostureStatus) -> &'static str {
        match status {
            PostureStatus::Excellent => "Excellent posture! Keep it up.",
            PostureStatus::Good => "Good posture. Minor adjustments could help.",
            PostureStatus::Fair => "Fair posture. Try to straighten up.",
            PostureStatus::Poor => "Poor posture. Please adjust your position.",
            PostureStatus::Critical => "Critical posture issues detected. Take a break and reset.",
            PostureStatus::Unknown => NO_SUBJECT_MESSAGE,
        }
    }

    /// Message for a frame that could not be scored
    pub fn unknown_message(error: &ValidationError) -> String {
        match error.joint() {
            Some(joint) => format!("Incomplete pose: {joint} not visible."),
            None => NO_SUBJECT_MESSAGE.to_string(),
        }
    }

    /// Whether a score counts as good posture for persistence
    pub fn is_good_posture(score: u8) -> bool {
        score > GOOD_ABOVE
    }

    /// Pick a tip addressing the largest penalty
    pub fn recommendation(breakdown: &ScoreBreakdown, status: PostureStatus) -> &'static str {
        match status {
            PostureStatus::Critical => return TIP_TAKE_BREAKS,
            PostureStatus::Excellent => return TIP_KEEP_GOING,
            _ => {}
        }

        let alignment = breakdown.head_penalty + breakdown.spine_penalty;
        let levelness = breakdown.shoulder_penalty + breakdown.hip_penalty;
        let limbs = breakdown.elbow_penalty + breakdown.knee_penalty;

        if alignment >= levelness && alignment >= limbs {
            TIP_NEUTRAL_SPINE
        } else if levelness >= limbs {
            TIP_ERGONOMICS
        } else {
            TIP_STRETCH
        }
    }
}
