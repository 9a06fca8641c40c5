//! Assessment session lifecycle
//!
//! A `PostureSession` subscribes to a pose provider on `start`, runs every
//! delivered frame through the `FrameProcessor`, publishes results to its
//! consumer, and counts elapsed seconds on a timer. `stop` tears down the
//! subscription and the timer together.
//!
//! Lifecycle:
//!
//! ```text
//! Idle --start--> Running --stop / provider error--> Stopped --reset--> Idle
//! ```
//!
//! All mutation happens through `&mut self`, so frame handling, ticks, and
//! lifecycle calls are serialized by construction. The async driver
//! (`step`, `run_until_stopped`, `run_until`) waits on the frame channel and
//! the timer and dispatches to the synchronous handlers, which can also be
//! called directly.

use crate::classifier::StatusClassifier;
use crate::config::EngineConfig;
use crate::consumer::SessionConsumer;
use crate::error::PostureError;
use crate::history::HistoryBuffer;
use crate::pipeline::{FrameOutcome, FrameProcessor, ScoredFrame};
use crate::provider::{frame_channel, PoseProvider, ProviderEvent, SubscriptionHandle};
use crate::sink::{NoopSink, PersistenceSink};
use crate::types::{Frame, PostureSample, PostureStatus, ScoreRecord, SessionPhase};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// What the session woke up for
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Provider(ProviderEvent),
    Tick,
    /// The provider dropped its end of the frame channel
    Closed,
}

/// Live provider subscription and its timer
struct Subscription {
    handle: SubscriptionHandle,
    frames: mpsc::Receiver<ProviderEvent>,
    /// Created on first wait so `start` does not need a runtime
    ticker: Option<Interval>,
}

/// Posture assessment session
pub struct PostureSession {
    config: EngineConfig,
    phase: SessionPhase,
    elapsed_secs: u64,
    processor: FrameProcessor,
    subscription: Option<Subscription>,
    last_published: Option<(PostureStatus, String)>,
    provider: Box<dyn PoseProvider>,
    consumer: Box<dyn SessionConsumer>,
    sink: Box<dyn PersistenceSink>,
}

impl PostureSession {
    pub fn new(
        config: EngineConfig,
        provider: impl PoseProvider + 'static,
        consumer: impl SessionConsumer + 'static,
    ) -> Self {
        Self {
            processor: FrameProcessor::new(&config),
            config,
            phase: SessionPhase::Idle,
            elapsed_secs: 0,
            subscription: None,
            last_published: None,
            provider: Box::new(provider),
            consumer: Box::new(consumer),
            sink: Box::new(NoopSink),
        }
    }

    /// Persist a sample for every scored frame
    pub fn with_sink(mut self, sink: impl PersistenceSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn history(&self) -> &HistoryBuffer {
        self.processor.history()
    }

    pub fn history_snapshot(&self) -> Vec<ScoreRecord> {
        self.processor.history_snapshot()
    }

    /// Status most recently published to the consumer
    pub fn current_status(&self) -> Option<PostureStatus> {
        self.last_published.as_ref().map(|(status, _)| *status)
    }

    pub fn subscription_handle(&self) -> Option<SubscriptionHandle> {
        self.subscription.as_ref().map(|s| s.handle)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to the provider and begin assessing.
    ///
    /// Allowed from `Idle` and `Stopped`; elapsed time restarts at zero while
    /// history carries over until `reset`. If the provider refuses, the
    /// session stays where it was and the consumer is told.
    pub fn start(&mut self) -> Result<(), PostureError> {
        if self.phase == SessionPhase::Running {
            return Err(PostureError::AlreadyRunning);
        }

        let (sender, frames) = frame_channel();
        let handle = match self.provider.subscribe(sender) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(error = %err, "provider refused subscription");
                self.consumer.on_error(&err);
                return Err(err);
            }
        };

        self.subscription = Some(Subscription {
            handle,
            frames,
            ticker: None,
        });
        self.phase = SessionPhase::Running;
        self.elapsed_secs = 0;
        self.last_published = None;
        self.consumer.on_elapsed_time(0);

        tracing::info!(%handle, "session started");
        Ok(())
    }

    /// Stop assessing. Always succeeds; stopping twice is a no-op.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.provider.unsubscribe(subscription.handle);
            tracing::info!(handle = %subscription.handle, elapsed = self.elapsed_secs, "session stopped");
        }
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Stopped;
            if let Err(error) = self.sink.flush() {
                tracing::warn!(%error, "failed to flush persistence sink");
            }
        }
    }

    /// Clear history and elapsed time; only valid once stopped
    pub fn reset(&mut self) -> Result<(), PostureError> {
        match self.phase {
            SessionPhase::Running => Err(PostureError::NotStopped),
            SessionPhase::Idle => Ok(()),
            SessionPhase::Stopped => {
                self.processor.reset();
                self.elapsed_secs = 0;
                self.last_published = None;
                self.phase = SessionPhase::Idle;
                tracing::debug!("session reset");
                Ok(())
            }
        }
    }

    /// Process one provider notification. Ignored unless running.
    pub fn handle_frame(&mut self, frame: Option<Frame>) -> Option<FrameOutcome> {
        if !self.is_running() {
            tracing::debug!(phase = ?self.phase, "frame ignored");
            return None;
        }

        let outcome = self.processor.process(frame);

        if let FrameOutcome::Scored(scored) = &outcome {
            self.consumer.on_score_update(&scored.record);
        }
        self.publish_status(outcome.status(), outcome.message());
        if let FrameOutcome::Scored(scored) = &outcome {
            self.consumer
                .on_history_snapshot(&self.processor.history_snapshot());
            self.persist(scored);
        }

        Some(outcome)
    }

    /// Advance elapsed time by one second. Ignored unless running.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }
        self.elapsed_secs += 1;
        self.consumer.on_elapsed_time(self.elapsed_secs);
    }

    /// End a running session because of a provider error
    pub fn provider_failed(&mut self, error: PostureError) {
        if !self.is_running() {
            tracing::debug!(%error, "provider error after stop ignored");
            return;
        }
        tracing::error!(%error, "provider failed, stopping session");
        self.stop();
        self.consumer.on_error(&error);
    }

    /// Dispatch one input to its handler
    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Provider(ProviderEvent::Frame(frame)) => {
                self.handle_frame(frame);
            }
            SessionInput::Provider(ProviderEvent::Failed(message)) => {
                self.provider_failed(PostureError::ProviderError(message));
            }
            SessionInput::Closed => self.provider_failed(PostureError::ProviderClosed),
            SessionInput::Tick => self.tick(),
        }
    }

    /// Wait for the next frame or timer tick; `None` when not subscribed.
    ///
    /// Cancel safe: nothing is consumed unless this returns.
    pub async fn next_event(&mut self) -> Option<SessionInput> {
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let Subscription { frames, ticker, .. } = self.subscription.as_mut()?;

        let ticker = ticker.get_or_insert_with(|| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let input = tokio::select! {
            biased;
            event = frames.recv() => match event {
                Some(event) => SessionInput::Provider(event),
                None => SessionInput::Closed,
            },
            _ = ticker.tick() => SessionInput::Tick,
        };
        Some(input)
    }

    /// Handle one input; returns whether the session is still running
    pub async fn step(&mut self) -> bool {
        match self.next_event().await {
            Some(input) => {
                self.handle_input(input);
                self.is_running()
            }
            None => false,
        }
    }

    /// Drive the session until it stops
    pub async fn run_until_stopped(&mut self) {
        while self.step().await {}
    }

    /// Drive the session until it stops or `shutdown` resolves, then stop it
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.stop();
                    break;
                }
                running = self.step() => {
                    if !running {
                        break;
                    }
                }
            }
        }
    }

    fn publish_status(&mut self, status: PostureStatus, message: &str) {
        let changed = match &self.last_published {
            Some((last_status, last_message)) => {
                *last_status != status || last_message != message
            }
            None => true,
        };
        if changed {
            self.consumer.on_status_change(status, message);
            self.last_published = Some((status, message.to_string()));
        }
    }

    fn persist(&mut self, scored: &ScoredFrame) {
        let sample = PostureSample {
            shoulder_diff: scored.features.shoulder_diff,
            hip_diff: scored.features.hip_diff,
            is_good_posture: StatusClassifier::is_good_posture(scored.record.score),
            recommendation: scored.recommendation.clone(),
            timestamp: scored.captured_at.unwrap_or_else(Utc::now),
            user_id: self.config.user_id.clone(),
        };
        if let Err(error) = self.sink.push(&sample) {
            tracing::warn!(%error, "failed to persist posture sample");
        }
    }
}

impl Drop for PostureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NO_SUBJECT_MESSAGE;
    use crate::consumer::{RecordingConsumer, SessionEvent};
    use crate::provider::{PushProvider, ReplayProvider};
    use crate::sink::{MemorySink, NdjsonSink};
    use crate::types::{Joint, Landmark};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Writer whose bytes stay readable after the sink is boxed
    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl SharedWriter {
        fn line_count(&self) -> usize {
            self.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count()
        }
    }

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn upright_frame() -> Frame {
        Frame::new()
            .with(Joint::Nose, Landmark::new(0.50, 0.30))
            .with(Joint::LeftEar, Landmark::new(0.45, 0.28))
            .with(Joint::RightEar, Landmark::new(0.55, 0.28))
            .with(Joint::LeftShoulder, Landmark::new(0.30, 0.50))
            .with(Joint::RightShoulder, Landmark::new(0.70, 0.50))
            .with(Joint::LeftElbow, Landmark::new(0.28, 0.65))
            .with(Joint::RightElbow, Landmark::new(0.72, 0.65))
            .with(Joint::LeftWrist, Landmark::new(0.30, 0.78))
            .with(Joint::RightWrist, Landmark::new(0.70, 0.78))
            .with(Joint::LeftHip, Landmark::new(0.35, 0.80))
            .with(Joint::RightHip, Landmark::new(0.65, 0.80))
            .with(Joint::LeftKnee, Landmark::new(0.35, 0.90))
            .with(Joint::RightKnee, Landmark::new(0.65, 0.90))
            .with(Joint::LeftAnkle, Landmark::new(0.35, 0.99))
            .with(Joint::RightAnkle, Landmark::new(0.65, 0.99))
    }

    fn session() -> (PostureSession, RecordingConsumer) {
        let (provider, _pusher) = PushProvider::new();
        let consumer = RecordingConsumer::new();
        let session = PostureSession::new(EngineConfig::default(), provider, consumer.clone());
        (session, consumer)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (mut session, _) = session();
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.start().unwrap();
        assert_eq!(session.phase(), SessionPhase::Running);
        assert!(session.subscription_handle().is_some());
        assert!(matches!(session.start(), Err(PostureError::AlreadyRunning)));
        assert!(matches!(session.reset(), Err(PostureError::NotStopped)));

        session.stop();
        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert!(session.subscription_handle().is_none());

        session.reset().unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut session, _) = session();
        session.stop();
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.start().unwrap();
        session.stop();
        session.stop();
        assert_eq!(session.phase(), SessionPhase::Stopped);
    }

    #[test]
    fn test_refused_subscription_leaves_state() {
        let (provider, _pusher) = PushProvider::unavailable();
        let consumer = RecordingConsumer::new();
        let mut session =
            PostureSession::new(EngineConfig::default(), provider, consumer.clone());

        let err = session.start().unwrap_err();
        assert!(matches!(err, PostureError::ProviderUnavailable(_)));
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(consumer.errors().len(), 1);
    }

    #[test]
    fn test_scored_frame_publishes_everything() {
        let (mut session, consumer) = session();
        let sink = MemorySink::new();
        session = session.with_sink(sink.clone());
        session.start().unwrap();
        consumer.take();

        let outcome = session.handle_frame(Some(upright_frame())).unwrap();
        let record = *outcome.record().unwrap();

        let events = consumer.events();
        assert_eq!(events[0], SessionEvent::ScoreUpdate { record });
        assert!(matches!(events[1], SessionEvent::StatusChange { status, .. } if status == record.status));
        assert_eq!(
            events[2],
            SessionEvent::HistorySnapshot {
                history: vec![record]
            }
        );

        let samples = sink.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].user_id, "anonymous");
        assert_eq!(
            samples[0].is_good_posture,
            StatusClassifier::is_good_posture(record.score)
        );
    }

    #[test]
    fn test_absent_frame_publishes_unknown_only() {
        let (mut session, consumer) = session();
        session.start().unwrap();
        session.handle_frame(Some(upright_frame()));
        consumer.take();

        let outcome = session.handle_frame(None).unwrap();
        assert_eq!(outcome.status(), PostureStatus::Unknown);
        assert_eq!(
            consumer.events(),
            vec![SessionEvent::StatusChange {
                status: PostureStatus::Unknown,
                message: NO_SUBJECT_MESSAGE.to_string(),
            }]
        );
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_repeated_status_is_published_once() {
        let (mut session, consumer) = session();
        session.start().unwrap();
        session.handle_frame(Some(upright_frame()));
        session.handle_frame(Some(upright_frame()));
        session.handle_frame(None);
        session.handle_frame(None);

        assert_eq!(consumer.statuses().len(), 2);
        assert_eq!(consumer.scores().len(), 2);
    }

    #[test]
    fn test_frames_ignored_unless_running() {
        let (mut session, consumer) = session();
        assert!(session.handle_frame(Some(upright_frame())).is_none());
        session.tick();

        session.start().unwrap();
        session.stop();
        assert!(session.handle_frame(Some(upright_frame())).is_none());
        session.tick();

        assert!(session.history().is_empty());
        assert_eq!(session.elapsed_seconds(), 0);
        assert!(consumer.scores().is_empty());
    }

    #[test]
    fn test_sink_failure_does_not_affect_scoring() {
        let (mut session, consumer) = session();
        session = session.with_sink(MemorySink::failing());
        session.start().unwrap();

        let outcome = session.handle_frame(Some(upright_frame())).unwrap();
        assert!(outcome.is_scored());
        assert_eq!(session.history().len(), 1);
        assert!(session.is_running());
        assert!(consumer.errors().is_empty());
    }

    #[test]
    fn test_stop_flushes_buffered_samples() {
        let (mut session, _) = session();
        let output = SharedWriter::default();
        session = session.with_sink(NdjsonSink::new(output.clone()));
        session.start().unwrap();

        session.handle_frame(Some(upright_frame())).unwrap();
        session.handle_frame(Some(upright_frame())).unwrap();
        assert_eq!(output.line_count(), 0);

        session.stop();
        assert_eq!(output.line_count(), 2);
    }

    #[test]
    fn test_provider_failure_stops_session() {
        let (mut session, consumer) = session();
        session.start().unwrap();
        session.handle_input(SessionInput::Provider(ProviderEvent::Failed(
            "camera unplugged".to_string(),
        )));

        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert!(session.subscription_handle().is_none());
        assert_eq!(consumer.errors().len(), 1);
        assert!(consumer.errors()[0].contains("camera unplugged"));
    }

    #[test]
    fn test_restart_resets_elapsed_but_keeps_history() {
        let (mut session, _) = session();
        session.start().unwrap();
        session.handle_frame(Some(upright_frame()));
        session.tick();
        session.tick();
        assert_eq!(session.elapsed_seconds(), 2);
        session.stop();

        session.start().unwrap();
        assert_eq!(session.elapsed_seconds(), 0);
        assert_eq!(session.history().len(), 1);
        session.stop();

        session.reset().unwrap();
        assert!(session.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_once_per_second() {
        let (mut session, consumer) = session();
        session.start().unwrap();
        consumer.take();

        for _ in 0..3 {
            assert!(session.step().await);
        }

        assert_eq!(session.elapsed_seconds(), 3);
        assert_eq!(
            consumer.events(),
            vec![
                SessionEvent::ElapsedTime { seconds: 1 },
                SessionEvent::ElapsedTime { seconds: 2 },
                SessionEvent::ElapsedTime { seconds: 3 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushed_frames_are_processed() {
        let (provider, pusher) = PushProvider::new();
        let consumer = RecordingConsumer::new();
        let mut session =
            PostureSession::new(EngineConfig::default(), provider, consumer.clone());
        session.start().unwrap();

        assert!(pusher.try_push(Some(upright_frame())).unwrap());
        assert!(!pusher.try_push(Some(upright_frame())).unwrap());
        assert!(session.step().await);

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.elapsed_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_runs_until_stream_closes() {
        let provider = ReplayProvider::new(vec![
            Some(upright_frame()),
            None,
            Some(upright_frame()),
        ]);
        let consumer = RecordingConsumer::new();
        let mut session =
            PostureSession::new(EngineConfig::default(), provider, consumer.clone());
        session.start().unwrap();

        session.run_until_stopped().await;

        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert_eq!(session.history().len(), 2);
        assert_eq!(consumer.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_session() {
        let (mut session, _) = session();
        session.start().unwrap();

        session
            .run_until(tokio::time::sleep(Duration::from_millis(2500)))
            .await;

        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert_eq!(session.elapsed_seconds(), 2);
    }
}
