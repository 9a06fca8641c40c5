//! Score history
//!
//! This module keeps the most recent score records for trend display.
//! Records are kept in arrival order; once the buffer is full the oldest
//! record is evicted for each new one.

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::types::ScoreRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded FIFO of score records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBuffer {
    records: VecDeque<ScoreRecord>,
    /// Maximum number of records retained
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// Create an empty buffer; capacity is at least one record
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail, evicting from the head when over capacity
    pub fn append(&mut self, record: ScoreRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Ordered copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<ScoreRecord> {
        self.records.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&ScoreRecord> {
        self.records.back()
    }

    /// Mean score over the retained records
    pub fn average_score(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let sum: f64 = self.records.iter().map(|r| r.score as f64).sum();
        Some(sum / self.records.len() as f64)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Same records in a buffer of `capacity`, dropping the oldest that no longer fit
    pub fn resized(self, capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        for record in self.records {
            buffer.append(record);
        }
        buffer
    }

    /// Load a history buffer from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut buffer: Self = serde_json::from_str(json)?;
        buffer.capacity = buffer.capacity.max(1);
        while buffer.records.len() > buffer.capacity {
            buffer.records.pop_front();
        }
        Ok(buffer)
    }

    /// Serialize the history buffer to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostureStatus;
    use pretty_assertions::assert_eq;

    fn record(ordinal: u64, score: u8) -> ScoreRecord {
        ScoreRecord {
            score,
            status: PostureStatus::Good,
            timestamp_ordinal: ordinal,
        }
    }

    #[test]
    fn test_resized_keeps_newest_records() {
        let mut history = HistoryBuffer::new(5);
        for i in 0..5 {
            history.append(record(i, 70 + i as u8));
        }

        let shrunk = history.clone().resized(2);
        assert_eq!(shrunk.capacity(), 2);
        assert_eq!(shrunk.snapshot(), vec![record(3, 73), record(4, 74)]);

        let grown = history.resized(8);
        assert_eq!(grown.capacity(), 8);
        assert_eq!(grown.len(), 5);
    }

    #[test]
    fn test_eleventh_append_evicts_first() {
        let mut history = HistoryBuffer::new(10);

        for i in 0..11 {
            history.append(record(i, 80));
        }

        let ordinals: Vec<u64> = history
            .snapshot()
            .iter()
            .map(|r| r.timestamp_ordinal)
            .collect();
        assert_eq!(ordinals, (1..11).collect::<Vec<u64>>());
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut history = HistoryBuffer::default();
        history.append(record(0, 70));
        history.append(record(1, 90));

        let first = history.snapshot();
        let second = history.snapshot();
        assert_eq!(first, second);
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|r| r.score), Some(90));
    }

    #[test]
    fn test_average_score() {
        let mut history = HistoryBuffer::new(3);
        assert_eq!(history.average_score(), None);

        // 60 is evicted, leaving 70, 80, 90
        for (i, score) in [60, 70, 80, 90].into_iter().enumerate() {
            history.append(record(i as u64, score));
        }
        assert!((history.average_score().unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut history = HistoryBuffer::new(0);
        history.append(record(0, 50));
        history.append(record(1, 55));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot(), vec![record(1, 55)]);
    }

    #[test]
    fn test_serialization() {
        let mut history = HistoryBuffer::new(4);
        history.append(record(7, 88));

        let json = history.to_json().unwrap();
        let loaded = HistoryBuffer::from_json(&json).unwrap();

        assert_eq!(loaded, history);
    }

    #[test]
    fn test_loaded_history_respects_capacity() {
        let json = r#"{
            "records": [
                {"score": 10, "status": "critical", "timestamp_ordinal": 0},
                {"score": 20, "status": "critical", "timestamp_ordinal": 1},
                {"score": 30, "status": "critical", "timestamp_ordinal": 2}
            ],
            "capacity": 2
        }"#;
        let loaded = HistoryBuffer::from_json(json).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.snapshot()[0].timestamp_ordinal, 1);
    }
}
