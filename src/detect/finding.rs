//! Typed per-family findings.
//!
//! Each detector family produces its own payload; `Finding` closes over the
//! three families and projects the shared `level` and `reason` that fusion
//! reads.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::hazard::HazardCategory;
use crate::track::BoundingBox;
use crate::Level;

/// Detector family. Fusion lists causes in this declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    DangerObject,
    Suffocation,
    Posture,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::DangerObject => "danger_object",
            Family::Suffocation => "suffocation",
            Family::Posture => "posture",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hazardous (or explicitly harmless) object seen in frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HazardFinding {
    pub category: HazardCategory,
    pub level: Level,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: i32,
    /// Track the detection was bound to this frame.
    pub track_id: Option<u64>,
}

/// Face visibility. A visible face is Safe; a missing face escalates with time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceFinding {
    pub level: Level,
    pub bbox: Option<BoundingBox>,
    pub confidence: f32,
    /// Seconds the face has been missing, rounded to 2 decimals.
    pub duration_secs: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    NoPose,
    Fall,
    FaceDown,
    Normal,
}

impl Posture {
    pub fn level(self) -> Level {
        match self {
            Posture::NoPose | Posture::Fall => Level::Danger,
            Posture::FaceDown => Level::Warning,
            Posture::Normal => Level::Safe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Posture::NoPose => "no_pose_detected",
            Posture::Fall => "fall_detected",
            Posture::FaceDown => "face_down",
            Posture::Normal => "normal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PostureFinding {
    pub posture: Posture,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Finding {
    DangerObject(HazardFinding),
    Suffocation(FaceFinding),
    Posture(PostureFinding),
}

impl Finding {
    pub fn family(&self) -> Family {
        match self {
            Finding::DangerObject(_) => Family::DangerObject,
            Finding::Suffocation(_) => Family::Suffocation,
            Finding::Posture(_) => Family::Posture,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Finding::DangerObject(f) => f.level,
            Finding::Suffocation(f) => f.level,
            Finding::Posture(f) => f.posture.level(),
        }
    }

    /// Reason text, if the family supplies one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Finding::DangerObject(f) => Some(f.category.as_str()),
            Finding::Suffocation(_) => None,
            Finding::Posture(f) => Some(f.posture.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posture_levels() {
        assert_eq!(Posture::NoPose.level(), Level::Danger);
        assert_eq!(Posture::Fall.level(), Level::Danger);
        assert_eq!(Posture::FaceDown.level(), Level::Warning);
        assert_eq!(Posture::Normal.level(), Level::Safe);
    }

    #[test]
    fn projections() {
        let face = Finding::Suffocation(FaceFinding {
            level: Level::Warning,
            bbox: None,
            confidence: 0.0,
            duration_secs: Some(1.25),
        });
        assert_eq!(face.family(), Family::Suffocation);
        assert_eq!(face.level(), Level::Warning);
        assert_eq!(face.reason(), None);

        let pose = Finding::Posture(PostureFinding {
            posture: Posture::FaceDown,
        });
        assert_eq!(pose.reason(), Some("face_down"));
    }
}
