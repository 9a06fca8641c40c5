//! Persistence sinks
//!
//! Scored frames can be handed to a sink as `PostureSample`s. Sinks are
//! fire-and-forget from the session's point of view: a failing push is logged
//! and never reaches scoring or session state.

use crate::error::PostureError;
use crate::types::PostureSample;
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};

impl PostureSample {
    /// Check the fields a stored sample must carry
    pub fn validate(&self) -> Result<(), PostureError> {
        if self.user_id.trim().is_empty() {
            return Err(PostureError::InvalidSample("user_id is empty".to_string()));
        }
        if self.recommendation.trim().is_empty() {
            return Err(PostureError::InvalidSample(
                "recommendation is empty".to_string(),
            ));
        }
        if !self.shoulder_diff.is_finite() || !self.hip_diff.is_finite() {
            return Err(PostureError::InvalidSample(
                "shoulder_diff and hip_diff must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Destination for posture samples
pub trait PersistenceSink: Send {
    fn push(&mut self, sample: &PostureSample) -> Result<(), PostureError>;

    /// Persist anything still buffered
    fn flush(&mut self) -> Result<(), PostureError> {
        Ok(())
    }
}

/// Sink that discards samples
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl PersistenceSink for NoopSink {
    fn push(&mut self, _sample: &PostureSample) -> Result<(), PostureError> {
        Ok(())
    }
}

/// Sink writing one JSON sample per line
///
/// Lines are buffered and only reach the writer when the buffer fills, on
/// `flush`, or when the sink is dropped. A push never waits on a per-line flush.
pub struct NdjsonSink<W: Write + Send> {
    writer: BufWriter<W>,
}

impl<W: Write + Send> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Underlying writer; buffered lines are not visible here until flushed
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Flush buffered lines and hand back the writer
    pub fn into_inner(self) -> Result<W, PostureError> {
        self.writer
            .into_inner()
            .map_err(|e| PostureError::PersistenceFailure(e.error().to_string()))
    }
}

impl<W: Write + Send> PersistenceSink for NdjsonSink<W> {
    fn push(&mut self, sample: &PostureSample) -> Result<(), PostureError> {
        sample.validate()?;
        let line = serde_json::to_string(sample)?;
        writeln!(self.writer, "{line}")
            .map_err(|e| PostureError::PersistenceFailure(e.to_string()))
    }

    fn flush(&mut self) -> Result<(), PostureError> {
        self.writer
            .flush()
            .map_err(|e| PostureError::PersistenceFailure(e.to_string()))
    }
}

/// In-memory sink; clones share storage. Can be told to fail every push.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<PostureSample>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose pushes always fail
    pub fn failing() -> Self {
        Self {
            samples: Arc::default(),
            fail: true,
        }
    }

    pub fn samples(&self) -> Vec<PostureSample> {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl PersistenceSink for MemorySink {
    fn push(&mut self, sample: &PostureSample) -> Result<(), PostureError> {
        if self.fail {
            return Err(PostureError::PersistenceFailure(
                "sink unavailable".to_string(),
            ));
        }
        sample.validate()?;
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sample.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> PostureSample {
        PostureSample {
            shoulder_diff: 0.01,
            hip_diff: 0.03,
            is_good_posture: true,
            recommendation: "Maintain a neutral spine position.".to_string(),
            timestamp: Utc::now(),
            user_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_sample_validation() {
        assert!(sample().validate().is_ok());

        let missing_user = PostureSample {
            user_id: "  ".to_string(),
            ..sample()
        };
        assert!(matches!(
            missing_user.validate(),
            Err(PostureError::InvalidSample(_))
        ));

        let missing_tip = PostureSample {
            recommendation: String::new(),
            ..sample()
        };
        assert!(missing_tip.validate().is_err());
    }

    #[test]
    fn test_ndjson_sink_writes_lines() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.push(&sample()).unwrap();
        sink.push(&sample()).unwrap();

        let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["user_id"], "user-1");
        assert_eq!(value["is_good_posture"], true);
    }

    #[test]
    fn test_ndjson_sink_buffers_until_flush() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.push(&sample()).unwrap();
        assert!(sink.get_ref().is_empty());

        sink.flush().unwrap();
        assert_eq!(sink.get_ref().iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn test_ndjson_sink_rejects_invalid_sample() {
        let mut sink = NdjsonSink::new(Vec::new());
        let invalid = PostureSample {
            user_id: String::new(),
            ..sample()
        };
        assert!(matches!(
            sink.push(&invalid),
            Err(PostureError::InvalidSample(_))
        ));
        assert!(sink.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_memory_sink_shares_storage() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.push(&sample()).unwrap();
        assert_eq!(sink.samples().len(), 1);
    }

    #[test]
    fn test_failing_sink() {
        let mut sink = MemorySink::failing();
        assert!(matches!(
            sink.push(&sample()),
            Err(PostureError::PersistenceFailure(_))
        ));
        assert!(sink.samples().is_empty());
    }
}
