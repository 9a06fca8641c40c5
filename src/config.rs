//! Engine configuration
//!
//! The ideal targets and scales below are empirical calibration parameters,
//! not physiological constants. They are kept configurable so deployments can
//! retune them without touching the scoring code.

use crate::error::PostureError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of score records retained for trend display
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Default session timer period (1 Hz)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Ideal target and penalty scale for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTarget {
    pub ideal: f64,
    pub scale: f64,
}

impl MetricTarget {
    pub const fn new(ideal: f64, scale: f64) -> Self {
        Self { ideal, scale }
    }
}

/// Calibration for the weighted-deviation scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Average elbow angle (degrees)
    pub elbow_angle: MetricTarget,
    /// Average knee angle (degrees)
    pub knee_angle: MetricTarget,
    pub shoulder_diff: MetricTarget,
    pub hip_diff: MetricTarget,
    pub head_alignment: MetricTarget,
    pub spine_alignment: MetricTarget,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            elbow_angle: MetricTarget::new(160.0, 0.5),
            knee_angle: MetricTarget::new(175.0, 0.5),
            shoulder_diff: MetricTarget::new(0.02, 100.0),
            hip_diff: MetricTarget::new(0.02, 100.0),
            head_alignment: MetricTarget::new(0.05, 100.0),
            spine_alignment: MetricTarget::new(0.05, 100.0),
        }
    }
}

impl ScoringConfig {
    fn targets(&self) -> [(&'static str, MetricTarget); 6] {
        [
            ("elbow_angle", self.elbow_angle),
            ("knee_angle", self.knee_angle),
            ("shoulder_diff", self.shoulder_diff),
            ("hip_diff", self.hip_diff),
            ("head_alignment", self.head_alignment),
            ("spine_alignment", self.spine_alignment),
        ]
    }

    pub fn validate(&self) -> Result<(), PostureError> {
        for (name, target) in self.targets() {
            if !target.ideal.is_finite() || target.ideal < 0.0 {
                return Err(PostureError::Config(format!(
                    "{name}: ideal must be a non-negative number, got {}",
                    target.ideal
                )));
            }
            if !target.scale.is_finite() || target.scale < 0.0 {
                return Err(PostureError::Config(format!(
                    "{name}: scale must be a non-negative number, got {}",
                    target.scale
                )));
            }
        }
        Ok(())
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of score records kept in history
    pub history_capacity: usize,
    /// Session timer period in milliseconds
    pub tick_interval_ms: u64,
    /// Landmarks reporting visibility below this are treated as missing
    pub min_visibility: Option<f64>,
    /// User identifier stamped on persistence samples
    pub user_id: String,
    pub scoring: ScoringConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            min_visibility: None,
            user_id: "anonymous".to_string(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), PostureError> {
        if self.history_capacity == 0 {
            return Err(PostureError::Config(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(PostureError::Config(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        if let Some(threshold) = self.min_visibility {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PostureError::Config(format!(
                    "min_visibility must be within 0-1, got {threshold}"
                )));
            }
        }
        self.scoring.validate()
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, PostureError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, PostureError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, PostureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
