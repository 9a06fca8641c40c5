//! Pipeline orchestration
//!
//! This module runs a single frame through the full assessment:
//! validation → feature extraction → scoring → classification → history.
//! It has no notion of lifecycle or timers; the session drives it.

use crate::classifier::StatusClassifier;
use crate::config::EngineConfig;
use crate::encoder::ReportEncoder;
use crate::error::PostureError;
use crate::features::FeatureExtractor;
use crate::history::HistoryBuffer;
use crate::scorer::{PostureScorer, ScoreBreakdown};
use crate::types::{FeatureSet, Frame, Joint, PostureStatus, ScoreRecord};
use crate::validator::{LandmarkValidator, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frame that passed validation and was scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFrame {
    pub record: ScoreRecord,
    pub features: FeatureSet,
    pub breakdown: ScoreBreakdown,
    pub message: String,
    pub recommendation: String,
    /// Capture time reported by the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// A frame that could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscoredFrame {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_joint: Option<Joint>,
    pub message: String,
}

/// Result of processing one provider notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FrameOutcome {
    Scored(ScoredFrame),
    Unknown(UnscoredFrame),
}

impl FrameOutcome {
    pub fn status(&self) -> PostureStatus {
        match self {
            FrameOutcome::Scored(scored) => scored.record.status,
            FrameOutcome::Unknown(_) => PostureStatus::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FrameOutcome::Scored(scored) => &scored.message,
            FrameOutcome::Unknown(unscored) => &unscored.message,
        }
    }

    pub fn record(&self) -> Option<&ScoreRecord> {
        match self {
            FrameOutcome::Scored(scored) => Some(&scored.record),
            FrameOutcome::Unknown(_) => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, FrameOutcome::Scored(_))
    }
}

/// Stateful processor owning the score history.
///
/// Use this directly when frames are pulled rather than pushed, or through
/// `PostureSession` for the full start/stop/tick lifecycle.
#[derive(Debug, Clone)]
pub struct FrameProcessor {
    validator: LandmarkValidator,
    scorer: PostureScorer,
    history: HistoryBuffer,
    next_ordinal: u64,
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl FrameProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            validator: LandmarkValidator::with_min_visibility(config.min_visibility),
            scorer: PostureScorer::new(config.scoring),
            history: HistoryBuffer::new(config.history_capacity),
            next_ordinal: 0,
        }
    }

    /// Process one provider notification; `None` means no subject was detected
    pub fn process(&mut self, frame: Option<Frame>) -> FrameOutcome {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let captured_at = frame.as_ref().and_then(|f| f.timestamp);

        let validated = match self.validator.validate_notification(frame) {
            Ok(validated) => validated,
            Err(err) => {
                tracing::debug!(ordinal, reason = %err, "frame not scored");
                return FrameOutcome::Unknown(unscored(&err));
            }
        };

        let features = FeatureExtractor::extract(&validated);
        let breakdown = self.scorer.breakdown(&features);
        let status = StatusClassifier::classify(breakdown.score);

        let record = ScoreRecord {
            score: breakdown.score,
            status,
            timestamp_ordinal: ordinal,
        };
        self.history.append(record);

        tracing::debug!(ordinal, score = record.score, %status, "frame scored");

        FrameOutcome::Scored(ScoredFrame {
            record,
            features,
            breakdown,
            message: StatusClassifier::message(status).to_string(),
            recommendation: StatusClassifier::recommendation(&breakdown, status).to_string(),
            captured_at,
        })
    }

    /// Parse a frame JSON document (`null` for no subject) and process it
    pub fn process_json(&mut self, json: &str) -> Result<FrameOutcome, PostureError> {
        let frame = FrameParser::parse_frame(json)?;
        Ok(self.process(frame))
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn history_snapshot(&self) -> Vec<ScoreRecord> {
        self.history.snapshot()
    }

    /// Clear history and restart ordinals
    pub fn reset(&mut self) {
        self.history.clear();
        self.next_ordinal = 0;
    }

    /// Save history state to JSON
    pub fn save_history(&self) -> Result<String, PostureError> {
        Ok(self.history.to_json()?)
    }

    /// Load history state from JSON; new ordinals continue after the loaded ones
    ///
    /// The configured capacity wins over the saved one; surplus oldest records are dropped.
    pub fn load_history(&mut self, json: &str) -> Result<(), PostureError> {
        let capacity = self.history.capacity();
        self.history = HistoryBuffer::from_json(json)?.resized(capacity);
        self.next_ordinal = self
            .history
            .latest()
            .map(|r| r.timestamp_ordinal + 1)
            .unwrap_or(0);
        Ok(())
    }
}

fn unscored(err: &ValidationError) -> UnscoredFrame {
    UnscoredFrame {
        reason: err.to_string(),
        missing_joint: err.joint(),
        message: StatusClassifier::unknown_message(err),
    }
}

/// Parsers for recorded frame streams
pub struct FrameParser;

impl FrameParser {
    /// Parse a single frame; the literal `null` is an absent frame
    pub fn parse_frame(json: &str) -> Result<Option<Frame>, PostureError> {
        Ok(serde_json::from_str::<Option<Frame>>(json)?)
    }

    /// Parse a JSON array of frames (entries may be `null`)
    pub fn parse_array(json: &str) -> Result<Vec<Option<Frame>>, PostureError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse NDJSON, one frame (or `null`) per non-empty line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Option<Frame>>, PostureError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Option<Frame>>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(PostureError::InvalidFrame(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }
}

/// Assess a single frame JSON document and return a report JSON payload.
///
/// Stateless: the history in the report contains at most this frame.
///
/// # Example
/// ```ignore
/// let report = frame_to_report(frame_json.to_string())?;
/// ```
pub fn frame_to_report(frame_json: String) -> Result<String, PostureError> {
    let mut processor = FrameProcessor::default();
    let outcome = processor.process_json(&frame_json)?;
    let encoder = ReportEncoder::new();
    encoder.encode_to_json(&outcome, processor.history())
}
