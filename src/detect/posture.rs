//! Posture family: classifies body orientation from pose landmarks.

use super::backend::PoseLandmarks;
use super::finding::{Finding, Posture, PostureFinding};

/// Default margin by which the nose must sit below the hips to count as a fall.
pub const DEFAULT_FALL_MARGIN: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostureClassifier {
    pub fall_margin: f32,
}

impl Default for PostureClassifier {
    fn default() -> Self {
        Self {
            fall_margin: DEFAULT_FALL_MARGIN,
        }
    }
}

impl PostureClassifier {
    pub fn classify(&self, landmarks: Option<&PoseLandmarks>) -> Posture {
        let Some(pose) = landmarks else {
            return Posture::NoPose;
        };
        if pose.nose_y > pose.hip_y() + self.fall_margin {
            Posture::Fall
        } else if pose.nose_y > pose.shoulder_y() {
            Posture::FaceDown
        } else {
            Posture::Normal
        }
    }

    pub fn assess(&self, landmarks: Option<&PoseLandmarks>) -> Vec<Finding> {
        vec![Finding::Posture(PostureFinding {
            posture: self.classify(landmarks),
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    fn pose(nose_y: f32) -> PoseLandmarks {
        PoseLandmarks {
            nose_y,
            ..PoseLandmarks::upright()
        }
    }

    #[test]
    fn classifies_postures() {
        let c = PostureClassifier::default();
        assert_eq!(c.classify(None), Posture::NoPose);
        assert_eq!(c.classify(Some(&PoseLandmarks::upright())), Posture::Normal);
        // between shoulders (0.35) and hips + margin (0.75)
        assert_eq!(c.classify(Some(&pose(0.5))), Posture::FaceDown);
        assert_eq!(c.classify(Some(&pose(0.8))), Posture::Fall);
        // inside the margin is still face-down
        assert_eq!(c.classify(Some(&pose(0.74))), Posture::FaceDown);
    }

    #[test]
    fn missing_pose_is_danger() {
        let findings = PostureClassifier::default().assess(None);
        assert_eq!(findings[0].level(), Level::Danger);
        assert_eq!(findings[0].reason(), Some("no_pose_detected"));
    }
}
