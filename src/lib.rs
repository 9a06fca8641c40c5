//! Posture Flux - Real-time posture assessment engine
//!
//! Flux turns body-landmark frames from a pose estimator into posture scores
//! through a deterministic pipeline: landmark validation → feature extraction
//! → scoring → status classification → bounded history.
//!
//! ## Modules
//!
//! - **Pipeline**: Score single frames (`FrameProcessor`, `frame_to_report`)
//! - **Session**: Drive the pipeline from a live `PoseProvider` with a
//!   start/stop lifecycle, an elapsed-time counter, and consumer callbacks

pub mod classifier;
pub mod config;
pub mod consumer;
pub mod encoder;
pub mod error;
pub mod features;
pub mod history;
pub mod pipeline;
pub mod provider;
pub mod scorer;
pub mod session;
pub mod sink;
pub mod types;
pub mod validator;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{EngineConfig, MetricTarget, ScoringConfig};
pub use error::PostureError;
pub use history::HistoryBuffer;
pub use pipeline::{frame_to_report, FrameOutcome, FrameParser, FrameProcessor};
pub use types::{
    FeatureSet, Frame, Joint, Landmark, PostureSample, PostureStatus, ScoreRecord, SessionPhase,
};

// Session exports
pub use consumer::{NullConsumer, RecordingConsumer, SessionConsumer, TracingConsumer};
pub use provider::{FramePusher, PoseProvider, PushProvider, ReplayProvider};
pub use session::PostureSession;
pub use sink::{MemorySink, NdjsonSink, NoopSink, PersistenceSink};

/// Flux version embedded in all reports
pub const POSTURE_FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "posture-flux";
