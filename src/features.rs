//! Feature extraction
//!
//! This module derives geometric posture features from a validated frame:
//! - Shoulder and hip levelness
//! - Head and spine horizontal alignment
//! - Elbow and knee joint angles
//!
//! Everything here is a pure function of the landmarks.

use crate::types::{FeatureSet, Joint, Landmark};
use crate::validator::ValidatedFrame;

/// Feature extractor for computing a feature set from landmarks
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract features from a validated frame
    pub fn extract(frame: &ValidatedFrame) -> FeatureSet {
        let nose = frame.landmark(Joint::Nose);
        let left_shoulder = frame.landmark(Joint::LeftShoulder);
        let right_shoulder = frame.landmark(Joint::RightShoulder);
        let left_hip = frame.landmark(Joint::LeftHip);
        let right_hip = frame.landmark(Joint::RightHip);

        let shoulder_mid_x = midpoint_x(&left_shoulder, &right_shoulder);
        let hip_mid_x = midpoint_x(&left_hip, &right_hip);

        FeatureSet {
            shoulder_diff: (left_shoulder.y - right_shoulder.y).abs(),
            hip_diff: (left_hip.y - right_hip.y).abs(),
            head_alignment: (shoulder_mid_x - nose.x).abs(),
            spine_alignment: (shoulder_mid_x - hip_mid_x).abs(),
            left_elbow_angle: joint_angle(
                &left_shoulder,
                &frame.landmark(Joint::LeftElbow),
                &frame.landmark(Joint::LeftWrist),
            ),
            right_elbow_angle: joint_angle(
                &right_shoulder,
                &frame.landmark(Joint::RightElbow),
                &frame.landmark(Joint::RightWrist),
            ),
            left_knee_angle: joint_angle(
                &left_hip,
                &frame.landmark(Joint::LeftKnee),
                &frame.landmark(Joint::LeftAnkle),
            ),
            right_knee_angle: joint_angle(
                &right_hip,
                &frame.landmark(Joint::RightKnee),
                &frame.landmark(Joint::RightAnkle),
            ),
        }
    }
}

fn midpoint_x(a: &Landmark, b: &Landmark) -> f64 {
    (a.x + b.x) / 2.0
}

/// Angle at vertex `b` formed by `a` and `c`, in degrees (0-180)
///
/// The difference of the two ray headings can exceed a half turn; that reflex
/// angle is folded back so `joint_angle(a, b, c) == joint_angle(c, b, a)`.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let to_c = (c.y - b.y).atan2(c.x - b.x);
    let to_a = (a.y - b.y).atan2(a.x - b.x);

    let angle = (to_c - to_a).abs().to_degrees();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;
    use crate::validator::{LandmarkValidator, REQUIRED_JOINTS};

    fn point(x: f64, y: f64) -> Landmark {
        Landmark::new(x, y)
    }

    fn make_frame(overrides: &[(Joint, Landmark)]) -> ValidatedFrame {
        let mut frame = Frame::new();
        for joint in REQUIRED_JOINTS {
            frame.insert(joint, point(0.5, 0.5));
        }
        for (joint, landmark) in overrides {
            frame.insert(*joint, *landmark);
        }
        LandmarkValidator::new().validate(frame).unwrap()
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(&point(0.0, 0.0), &point(0.5, 0.0), &point(0.5, 0.5));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_line() {
        let angle = joint_angle(&point(0.0, 0.0), &point(0.5, 0.0), &point(1.0, 0.0));
        assert!((angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_reflex_angle_is_folded() {
        // Headings of +135° and -135° differ by 270°
        let a = point(-1.0, 1.0);
        let b = point(0.0, 0.0);
        let c = point(-1.0, -1.0);
        let angle = joint_angle(&a, &b, &c);
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_is_symmetric_and_bounded() {
        let samples = [
            (0.1, 0.9),
            (0.7, 0.2),
            (0.45, 0.45),
            (0.95, 0.05),
            (0.3, 0.6),
            (0.0, 1.0),
        ];
        let vertex = point(0.5, 0.5);
        for &(ax, ay) in &samples {
            for &(cx, cy) in &samples {
                let a = point(ax, ay);
                let c = point(cx, cy);
                let forward = joint_angle(&a, &vertex, &c);
                let backward = joint_angle(&c, &vertex, &a);
                assert!((forward - backward).abs() < 1e-9);
                assert!((0.0..=180.0).contains(&forward));
            }
        }
    }

    #[test]
    fn test_symmetric_landmarks_have_no_level_difference() {
        let frame = make_frame(&[
            (Joint::LeftShoulder, point(0.3, 0.5)),
            (Joint::RightShoulder, point(0.7, 0.5)),
            (Joint::LeftHip, point(0.35, 0.8)),
            (Joint::RightHip, point(0.65, 0.8)),
        ]);
        let features = FeatureExtractor::extract(&frame);
        assert_eq!(features.shoulder_diff, 0.0);
        assert_eq!(features.hip_diff, 0.0);
    }

    #[test]
    fn test_alignment_features() {
        let frame = make_frame(&[
            (Joint::Nose, point(0.6, 0.3)),
            (Joint::LeftShoulder, point(0.3, 0.5)),
            (Joint::RightShoulder, point(0.7, 0.55)),
            (Joint::LeftHip, point(0.3, 0.8)),
            (Joint::RightHip, point(0.5, 0.8)),
        ]);
        let features = FeatureExtractor::extract(&frame);

        assert!((features.shoulder_diff - 0.05).abs() < 1e-9);
        // shoulder midpoint 0.5, nose 0.6
        assert!((features.head_alignment - 0.1).abs() < 1e-9);
        // shoulder midpoint 0.5, hip midpoint 0.4
        assert!((features.spine_alignment - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_limb_angles() {
        let frame = make_frame(&[
            (Joint::LeftShoulder, point(0.3, 0.5)),
            (Joint::LeftElbow, point(0.3, 0.6)),
            (Joint::LeftWrist, point(0.4, 0.6)),
            (Joint::LeftHip, point(0.4, 0.7)),
            (Joint::LeftKnee, point(0.4, 0.8)),
            (Joint::LeftAnkle, point(0.4, 0.9)),
        ]);
        let features = FeatureExtractor::extract(&frame);

        assert!((features.left_elbow_angle - 90.0).abs() < 1e-9);
        assert!((features.left_knee_angle - 180.0).abs() < 1e-9);
    }
}
