use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::track::BoundingBox;

/// One box produced by an external model. Opaque beyond this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
    pub class_id: i32,
    /// Optional label supplied by the model.
    #[serde(default)]
    pub category: Option<String>,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: i32) -> Self {
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            class_id,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Normalized vertical keypoint positions (0 = top of frame, 1 = bottom).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub nose_y: f32,
    pub left_shoulder_y: f32,
    pub right_shoulder_y: f32,
    pub left_hip_y: f32,
    pub right_hip_y: f32,
}

impl PoseLandmarks {
    pub fn shoulder_y(&self) -> f32 {
        (self.left_shoulder_y + self.right_shoulder_y) / 2.0
    }

    pub fn hip_y(&self) -> f32 {
        (self.left_hip_y + self.right_hip_y) / 2.0
    }

    /// A sitting/standing pose: nose above shoulders above hips.
    pub fn upright() -> Self {
        Self {
            nose_y: 0.2,
            left_shoulder_y: 0.35,
            right_shoulder_y: 0.35,
            left_hip_y: 0.7,
            right_hip_y: 0.7,
        }
    }
}

/// Box detector backend (object model, face model).
///
/// Implementations must treat the frame as read-only and must not retain it
/// past the `detect` call. Inference may block; it only blocks the calling
/// worker.
pub trait DetectorBackend: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, run once when a worker starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pose estimation backend. `Ok(None)` means no person pose was found.
pub trait PoseBackend: Send {
    fn name(&self) -> &str;

    fn estimate(&mut self, frame: &Frame) -> Result<Option<PoseLandmarks>>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The three model handles one worker runs on every frame.
pub struct DetectorSet {
    pub objects: Box<dyn DetectorBackend>,
    pub faces: Box<dyn DetectorBackend>,
    pub pose: Box<dyn PoseBackend>,
}

impl DetectorSet {
    pub fn new(
        objects: impl DetectorBackend + 'static,
        faces: impl DetectorBackend + 'static,
        pose: impl PoseBackend + 'static,
    ) -> Self {
        Self {
            objects: Box::new(objects),
            faces: Box::new(faces),
            pose: Box::new(pose),
        }
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.objects.warm_up()?;
        self.faces.warm_up()?;
        self.pose.warm_up()
    }
}

impl std::fmt::Debug for DetectorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorSet")
            .field("objects", &self.objects.name())
            .field("faces", &self.faces.name())
            .field("pose", &self.pose.name())
            .finish()
    }
}
