//! Report encoding
//!
//! This module encodes frame outcomes into versioned JSON report payloads.
//! Each report carries producer metadata, the outcome, and the history as it
//! stood after the frame was processed.

use crate::error::PostureError;
use crate::history::HistoryBuffer;
use crate::pipeline::FrameOutcome;
use crate::types::ScoreRecord;
use crate::{POSTURE_FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Report producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Complete posture report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub outcome: FrameOutcome,
    /// History contents, oldest first
    pub history: Vec<ScoreRecord>,
    pub history_average: Option<f64>,
}

/// Report encoder with a stable per-instance identity
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, outcome: &FrameOutcome, history: &HistoryBuffer) -> PostureReport {
        PostureReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: POSTURE_FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            outcome: outcome.clone(),
            history: history.snapshot(),
            history_average: history.average_score(),
        }
    }

    /// Encode to a pretty JSON string
    pub fn encode_to_json(
        &self,
        outcome: &FrameOutcome,
        history: &HistoryBuffer,
    ) -> Result<String, PostureError> {
        let report = self.encode(outcome, history);
        serde_json::to_string_pretty(&report).map_err(PostureError::JsonError)
    }
}
