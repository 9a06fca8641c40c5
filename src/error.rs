//! Error types for Posture Flux

use crate::types::Joint;
use thiserror::Error;

/// Errors that can occur while assessing posture or running a session
#[derive(Debug, Error)]
pub enum PostureError {
    #[error("Missing required landmark: {0}")]
    MissingLandmark(Joint),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Pose provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Pose provider error: {0}")]
    ProviderError(String),

    #[error("Pose provider closed the frame stream")]
    ProviderClosed,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Invalid posture sample: {0}")]
    InvalidSample(String),

    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Session must be stopped before reset")]
    NotStopped,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostureError {
    /// Whether this error ends the running session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PostureError::ProviderUnavailable(_)
                | PostureError::ProviderError(_)
                | PostureError::ProviderClosed
        )
    }
}

impl From<crate::validator::ValidationError> for PostureError {
    fn from(err: crate::validator::ValidationError) -> Self {
        match err {
            crate::validator::ValidationError::MissingLandmark(joint) => {
                PostureError::MissingLandmark(joint)
            }
            other => PostureError::InvalidFrame(other.to_string()),
        }
    }
}
