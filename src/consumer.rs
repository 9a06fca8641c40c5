//! Session consumers
//!
//! The display side of the engine. A consumer receives score updates, status
//! changes, elapsed time, history snapshots, and session-ending errors. All
//! methods default to no-ops so a consumer only implements what it shows.

use crate::error::PostureError;
use crate::types::{PostureStatus, ScoreRecord};
use std::sync::{Arc, Mutex};

/// Receiver for session output
pub trait SessionConsumer: Send {
    fn on_score_update(&mut self, _record: &ScoreRecord) {}

    fn on_status_change(&mut self, _status: PostureStatus, _message: &str) {}

    fn on_elapsed_time(&mut self, _seconds: u64) {}

    fn on_history_snapshot(&mut self, _history: &[ScoreRecord]) {}

    fn on_error(&mut self, _error: &PostureError) {}
}

/// Consumer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsumer;

impl SessionConsumer for NullConsumer {}

/// One published session event
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ScoreUpdate { record: ScoreRecord },
    StatusChange { status: PostureStatus, message: String },
    ElapsedTime { seconds: u64 },
    HistorySnapshot { history: Vec<ScoreRecord> },
    Error { message: String },
}

/// Consumer that records every event; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingConsumer {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SessionEvent) {
        // A poisoned log only means another holder panicked mid-push
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    /// Copy of all events recorded so far
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn statuses(&self) -> Vec<PostureStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StatusChange { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn scores(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::ScoreUpdate { record } => Some(record.score),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl SessionConsumer for RecordingConsumer {
    fn on_score_update(&mut self, record: &ScoreRecord) {
        self.push(SessionEvent::ScoreUpdate { record: *record });
    }

    fn on_status_change(&mut self, status: PostureStatus, message: &str) {
        self.push(SessionEvent::StatusChange {
            status,
            message: message.to_string(),
        });
    }

    fn on_elapsed_time(&mut self, seconds: u64) {
        self.push(SessionEvent::ElapsedTime { seconds });
    }

    fn on_history_snapshot(&mut self, history: &[ScoreRecord]) {
        self.push(SessionEvent::HistorySnapshot {
            history: history.to_vec(),
        });
    }

    fn on_error(&mut self, error: &PostureError) {
        self.push(SessionEvent::Error {
            message: error.to_string(),
        });
    }
}

/// Consumer that logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsumer;

impl SessionConsumer for TracingConsumer {
    fn on_score_update(&mut self, record: &ScoreRecord) {
        tracing::info!(score = record.score, status = %record.status, "score update");
    }

    fn on_status_change(&mut self, status: PostureStatus, message: &str) {
        tracing::info!(%status, advice = message, "status change");
    }

    fn on_elapsed_time(&mut self, seconds: u64) {
        tracing::debug!(seconds, "elapsed");
    }

    fn on_error(&mut self, error: &PostureError) {
        tracing::error!(%error, "session error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(ordinal: u64, score: u8, status: PostureStatus) -> ScoreRecord {
        ScoreRecord {
            score,
            status,
            timestamp_ordinal: ordinal,
        }
    }

    fn publish_all(consumer: &mut dyn SessionConsumer) {
        let first = record(0, 92, PostureStatus::Excellent);
        let second = record(1, 55, PostureStatus::Poor);
        consumer.on_elapsed_time(0);
        consumer.on_score_update(&first);
        consumer.on_status_change(PostureStatus::Excellent, "Keep it up");
        consumer.on_score_update(&second);
        consumer.on_status_change(PostureStatus::Poor, "Sit back");
        consumer.on_history_snapshot(&[first, second]);
        consumer.on_error(&PostureError::ProviderClosed);
    }

    #[test]
    fn test_recording_clones_share_log() {
        let consumer = RecordingConsumer::new();
        let mut handle = consumer.clone();
        publish_all(&mut handle);

        assert_eq!(consumer.events().len(), 7);
        assert_eq!(consumer.scores(), vec![92, 55]);
        assert_eq!(
            consumer.statuses(),
            vec![PostureStatus::Excellent, PostureStatus::Poor]
        );
        assert_eq!(
            consumer.errors(),
            vec![PostureError::ProviderClosed.to_string()]
        );
    }

    #[test]
    fn test_take_drains_log() {
        let mut consumer = RecordingConsumer::new();
        consumer.on_elapsed_time(3);

        assert_eq!(consumer.take(), vec![SessionEvent::ElapsedTime { seconds: 3 }]);
        assert!(consumer.events().is_empty());
        assert!(consumer.take().is_empty());
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = SessionEvent::StatusChange {
            status: PostureStatus::Fair,
            message: "Level your shoulders".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "status_change",
                "status": "fair",
                "message": "Level your shoulders",
            })
        );

        let json = serde_json::to_value(SessionEvent::ElapsedTime { seconds: 12 }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "elapsed_time", "seconds": 12}));
    }

    #[test]
    fn test_logging_and_null_consumers_accept_every_event() {
        publish_all(&mut TracingConsumer);
        publish_all(&mut NullConsumer);
    }
}
