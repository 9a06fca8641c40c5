//! Core types for the Posture Flux engine
//!
//! This module defines the data structures that flow through each stage of the
//! assessment: landmarks and frames in, feature sets, score records and
//! persistence samples out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Joint identity for a single landmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftEye => "left_eye",
            Joint::RightEye => "right_eye",
            Joint::LeftEar => "left_ear",
            Joint::RightEar => "right_ear",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single 2D landmark (normalized coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, 0-1 across the image
    pub x: f64,
    /// Vertical position, 0-1 down the image
    pub y: f64,
    /// Detection visibility/confidence (0-1), if the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// All landmarks estimated for one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Capture time, if the provider stamps frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Landmarks keyed by joint
    pub landmarks: HashMap<Joint, Landmark>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by providers and tests
    pub fn with(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.landmarks.insert(joint, landmark);
        self
    }

    pub fn insert(&mut self, joint: Joint, landmark: Landmark) {
        self.landmarks.insert(joint, landmark);
    }

    pub fn remove(&mut self, joint: Joint) -> Option<Landmark> {
        self.landmarks.remove(&joint)
    }

    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.landmarks.get(&joint)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Geometric features derived from a validated frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Vertical offset between shoulders (normalized)
    pub shoulder_diff: f64,
    /// Vertical offset between hips (normalized)
    pub hip_diff: f64,
    /// Horizontal offset of the nose from the shoulder midpoint (normalized)
    pub head_alignment: f64,
    /// Horizontal offset between shoulder and hip midpoints (normalized)
    pub spine_alignment: f64,
    /// Shoulder-elbow-wrist angle (degrees, 0-180)
    pub left_elbow_angle: f64,
    pub right_elbow_angle: f64,
    /// Hip-knee-ankle angle (degrees, 0-180)
    pub left_knee_angle: f64,
    pub right_knee_angle: f64,
}

impl FeatureSet {
    pub fn average_elbow_angle(&self) -> f64 {
        (self.left_elbow_angle + self.right_elbow_angle) / 2.0
    }

    pub fn average_knee_angle(&self) -> f64 {
        (self.left_knee_angle + self.right_knee_angle) / 2.0
    }
}

/// Categorical posture status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
    Unknown,
}

impl PostureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureStatus::Excellent => "excellent",
            PostureStatus::Good => "good",
            PostureStatus::Fair => "fair",
            PostureStatus::Poor => "poor",
            PostureStatus::Critical => "critical",
            PostureStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored frame as kept in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Posture score (0-100)
    pub score: u8,
    pub status: PostureStatus,
    /// Monotonic arrival ordinal within the processor
    pub timestamp_ordinal: u64,
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Stopped,
}

/// Sample handed to the persistence sink for each scored frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureSample {
    pub shoulder_diff: f64,
    pub hip_diff: f64,
    pub is_good_posture: bool,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}
