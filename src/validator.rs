//! Landmark validation
//!
//! A frame is only scored when every joint the feature extractor reads is
//! present and usable. Validation failures are non-fatal: the frame is reported
//! as `Unknown` and the session carries on.

use crate::types::{Frame, Joint, Landmark};

/// Joints required for analysis, in the order they are checked
pub const REQUIRED_JOINTS: [Joint; 15] = [
    Joint::Nose,
    Joint::LeftEar,
    Joint::RightEar,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
];

/// Validation errors for incoming frames
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No person detected")]
    NoSubject,

    #[error("Missing required landmark: {0}")]
    MissingLandmark(Joint),

    #[error("Landmark {0} has a non-finite coordinate")]
    NonFiniteCoordinate(Joint),

    #[error("Landmark {0} is below the visibility threshold")]
    LowVisibility(Joint),
}

impl ValidationError {
    /// The joint that caused the failure, if any
    pub fn joint(&self) -> Option<Joint> {
        match self {
            ValidationError::NoSubject => None,
            ValidationError::MissingLandmark(joint)
            | ValidationError::NonFiniteCoordinate(joint)
            | ValidationError::LowVisibility(joint) => Some(*joint),
        }
    }
}

/// A frame known to contain every required joint with finite coordinates
#[derive(Debug, Clone)]
pub struct ValidatedFrame {
    frame: Frame,
}

impl ValidatedFrame {
    /// Landmark for a required joint
    pub fn landmark(&self, joint: Joint) -> Landmark {
        // Required joints were checked at construction; optional joints fall
        // back to the origin rather than panic.
        self.frame
            .get(joint)
            .copied()
            .unwrap_or_else(|| Landmark::new(0.0, 0.0))
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn into_inner(self) -> Frame {
        self.frame
    }
}

/// Validator for incoming frames
#[derive(Debug, Clone, Copy, Default)]
pub struct LandmarkValidator {
    min_visibility: Option<f64>,
}

impl LandmarkValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat landmarks whose reported visibility is below `threshold` as missing
    pub fn with_min_visibility(threshold: Option<f64>) -> Self {
        Self {
            min_visibility: threshold,
        }
    }

    /// Validate a frame, reporting the first unusable required joint
    pub fn validate(&self, frame: Frame) -> Result<ValidatedFrame, ValidationError> {
        for joint in REQUIRED_JOINTS.iter() {
            let landmark = frame
                .get(*joint)
                .ok_or(ValidationError::MissingLandmark(*joint))?;

            if !landmark.is_finite() {
                return Err(ValidationError::NonFiniteCoordinate(*joint));
            }

            if let (Some(threshold), Some(visibility)) = (self.min_visibility, landmark.visibility)
            {
                if visibility < threshold {
                    return Err(ValidationError::LowVisibility(*joint));
                }
            }
        }

        Ok(ValidatedFrame { frame })
    }

    /// Validate a provider notification, where `None` means no subject was detected
    pub fn validate_notification(
        &self,
        frame: Option<Frame>,
    ) -> Result<ValidatedFrame, ValidationError> {
        match frame {
            Some(frame) => self.validate(frame),
            None => Err(ValidationError::NoSubject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame() -> Frame {
        let mut frame = Frame::new();
        for (i, joint) in REQUIRED_JOINTS.into_iter().enumerate() {
            frame.insert(joint, Landmark::new(0.1 + i as f64 * 0.05, 0.5));
        }
        frame
    }

    #[test]
    fn test_required_set_is_nose_plus_left_right_pairs() {
        let joints: Vec<Joint> = REQUIRED_JOINTS.into_iter().collect();
        assert!(joints.contains(&Joint::Nose));
        assert!(joints.contains(&Joint::LeftAnkle));
        assert!(!joints.contains(&Joint::LeftEye));

        let mut deduped = joints.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), joints.len());
    }

    #[test]
    fn test_full_frame_is_valid() {
        let validator = LandmarkValidator::new();
        assert!(validator.validate(full_frame()).is_ok());
    }

    #[test]
    fn test_each_missing_joint_is_reported() {
        let validator = LandmarkValidator::new();
        for joint in REQUIRED_JOINTS.into_iter() {
            let mut frame = full_frame();
            frame.remove(joint);
            let err = validator.validate(frame).unwrap_err();
            assert_eq!(err, ValidationError::MissingLandmark(joint));
        }
    }

    #[test]
    fn test_optional_joints_not_required() {
        let validator = LandmarkValidator::new();
        let frame = full_frame().with(Joint::LeftEye, Landmark::new(0.4, 0.2));
        assert!(validator.validate(frame).is_ok());
    }

    #[test]
    fn test_non_finite_coordinate_rejected() {
        let validator = LandmarkValidator::new();
        let frame = full_frame().with(Joint::LeftKnee, Landmark::new(f64::NAN, 0.7));
        assert_eq!(
            validator.validate(frame).unwrap_err(),
            ValidationError::NonFiniteCoordinate(Joint::LeftKnee)
        );
    }

    #[test]
    fn test_visibility_threshold() {
        let frame =
            full_frame().with(Joint::RightWrist, Landmark::new(0.6, 0.6).with_visibility(0.2));

        assert!(LandmarkValidator::new().validate(frame.clone()).is_ok());

        let strict = LandmarkValidator::with_min_visibility(Some(0.5));
        assert_eq!(
            strict.validate(frame).unwrap_err(),
            ValidationError::LowVisibility(Joint::RightWrist)
        );
    }

    #[test]
    fn test_absent_frame_is_no_subject() {
        let validator = LandmarkValidator::new();
        assert_eq!(
            validator.validate_notification(None).unwrap_err(),
            ValidationError::NoSubject
        );
    }
}
