//! Pose providers
//!
//! A provider delivers frames to a subscribed session through a `FrameSender`.
//! The channel behind it holds a single undelivered notification, so a
//! provider can never get more than one frame ahead of the session. Whether a
//! provider waits for room (`send_frame`) or drops the frame (`try_send_frame`)
//! is its own buffering policy.

use crate::error::PostureError;
use crate::types::Frame;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notifications a provider can deliver
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A new estimate; `None` when no subject is in view
    Frame(Option<Frame>),
    /// The provider hit an unrecoverable error
    Failed(String),
}

/// Identifies one subscription with one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Sending half of a session's frame channel
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<ProviderEvent>,
}

impl FrameSender {
    /// Deliver a frame, waiting until the session has taken the previous one
    pub async fn send_frame(&self, frame: Option<Frame>) -> Result<(), PostureError> {
        self.tx
            .send(ProviderEvent::Frame(frame))
            .await
            .map_err(|_| PostureError::ProviderError("session is no longer listening".to_string()))
    }

    /// Deliver a frame if the session is idle; returns `false` if it was dropped
    pub fn try_send_frame(&self, frame: Option<Frame>) -> Result<bool, PostureError> {
        match self.tx.try_send(ProviderEvent::Frame(frame)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PostureError::ProviderError(
                "session is no longer listening".to_string(),
            )),
        }
    }

    /// Report a fatal provider error to the session
    pub async fn fail(&self, message: impl Into<String>) -> Result<(), PostureError> {
        self.tx
            .send(ProviderEvent::Failed(message.into()))
            .await
            .map_err(|_| PostureError::ProviderError("session is no longer listening".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a frame channel with room for exactly one pending notification
pub fn frame_channel() -> (FrameSender, mpsc::Receiver<ProviderEvent>) {
    let (tx, rx) = mpsc::channel(1);
    (FrameSender { tx }, rx)
}

/// Source of pose frames
pub trait PoseProvider: Send {
    /// Start delivering frames to `sender`
    fn subscribe(&mut self, sender: FrameSender) -> Result<SubscriptionHandle, PostureError>;

    /// Stop delivering frames for `handle`; unknown handles are ignored
    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}

/// Provider replaying a recorded frame sequence.
///
/// Each subscription spawns a task on the current Tokio runtime that delivers
/// the frames in order and then closes the stream (or fails, if configured).
pub struct ReplayProvider {
    frames: Arc<Vec<Option<Frame>>>,
    frame_interval: Option<Duration>,
    fail_with: Option<String>,
    available: bool,
    next_id: u64,
    tasks: HashMap<SubscriptionHandle, JoinHandle<()>>,
}

impl ReplayProvider {
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: Arc::new(frames),
            frame_interval: None,
            fail_with: None,
            available: true,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    /// Pace delivery, e.g. 33ms for a 30 fps recording
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Report a provider failure after the last frame instead of closing
    pub fn failing_after_frames(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// A provider that refuses every subscription
    pub fn unavailable() -> Self {
        let mut provider = Self::new(Vec::new());
        provider.available = false;
        provider
    }

    pub fn active_subscriptions(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl PoseProvider for ReplayProvider {
    fn subscribe(&mut self, sender: FrameSender) -> Result<SubscriptionHandle, PostureError> {
        if !self.available {
            return Err(PostureError::ProviderUnavailable(
                "replay source is not available".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PostureError::ProviderUnavailable("no async runtime to replay frames on".to_string())
        })?;

        let handle = SubscriptionHandle::new(self.next_id);
        self.next_id += 1;

        let frames = Arc::clone(&self.frames);
        let frame_interval = self.frame_interval;
        let fail_with = self.fail_with.clone();

        let task = runtime.spawn(async move {
            for frame in frames.iter() {
                if let Some(interval) = frame_interval {
                    tokio::time::sleep(interval).await;
                }
                if sender.send_frame(frame.clone()).await.is_err() {
                    return;
                }
            }
            if let Some(message) = fail_with {
                let _ = sender.fail(message).await;
            }
            tracing::debug!(%handle, "replay finished");
        });

        tracing::debug!(%handle, frames = self.frames.len(), "replay subscribed");
        self.tasks.insert(handle, task);
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
            tracing::debug!(%handle, "replay unsubscribed");
        }
    }
}

impl Drop for ReplayProvider {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

type SharedSender = Arc<Mutex<Option<(SubscriptionHandle, FrameSender)>>>;

/// Provider fed by the host application through a `FramePusher`
pub struct PushProvider {
    current: SharedSender,
    available: bool,
    next_id: u64,
}

/// Application side of a `PushProvider`
#[derive(Debug, Clone)]
pub struct FramePusher {
    current: SharedSender,
}

impl PushProvider {
    pub fn new() -> (Self, FramePusher) {
        let current: SharedSender = Arc::default();
        let provider = Self {
            current: Arc::clone(&current),
            available: true,
            next_id: 0,
        };
        (provider, FramePusher { current })
    }

    /// A provider that refuses every subscription
    pub fn unavailable() -> (Self, FramePusher) {
        let (mut provider, pusher) = Self::new();
        provider.available = false;
        (provider, pusher)
    }
}

impl PoseProvider for PushProvider {
    fn subscribe(&mut self, sender: FrameSender) -> Result<SubscriptionHandle, PostureError> {
        if !self.available {
            return Err(PostureError::ProviderUnavailable(
                "camera is not available".to_string(),
            ));
        }
        let handle = SubscriptionHandle::new(self.next_id);
        self.next_id += 1;
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some((handle, sender));
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(current.as_ref(), Some((active, _)) if *active == handle) {
            *current = None;
        }
    }
}

impl FramePusher {
    fn sender(&self) -> Result<FrameSender, PostureError> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, sender)| sender.clone())
            .ok_or_else(|| PostureError::ProviderError("no active subscription".to_string()))
    }

    /// Whether a session is currently subscribed
    pub fn is_subscribed(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Push a frame, waiting for the session to take the previous one
    pub async fn push(&self, frame: Option<Frame>) -> Result<(), PostureError> {
        self.sender()?.send_frame(frame).await
    }

    /// Push a frame unless one is already pending; returns `false` if dropped
    pub fn try_push(&self, frame: Option<Frame>) -> Result<bool, PostureError> {
        self.sender()?.try_send_frame(frame)
    }

    /// Report a fatal provider error to the subscribed session
    pub async fn fail(&self, message: impl Into<String>) -> Result<(), PostureError> {
        self.sender()?.fail(message).await
    }
}
