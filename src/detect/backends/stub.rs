use anyhow::Result;

use crate::detect::backend::{DetectorBackend, PoseBackend, PoseLandmarks, RawDetection};
use crate::frame::Frame;
use crate::track::BoundingBox;

/// Scripted box backend for tests and `stub://` sources.
///
/// Each `detect` call returns the next entry of the script, wrapping around.
/// An empty script always returns no detections.
pub struct StubBackend {
    name: &'static str,
    script: Vec<Vec<RawDetection>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new(name: &'static str, script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            name,
            script,
            cursor: 0,
        }
    }

    pub fn empty(name: &'static str) -> Self {
        Self::new(name, Vec::new())
    }

    /// The same detections on every frame.
    pub fn constant(name: &'static str, detections: Vec<RawDetection>) -> Self {
        Self::new(name, vec![detections])
    }

    /// Demo object model: a knife appears for `visible` frames out of every
    /// `quiet + visible`, drifting right while in view.
    pub fn demo_objects(quiet: usize, visible: usize) -> Self {
        let mut script = vec![Vec::new(); quiet];
        let start = BoundingBox::new(220, 260, 300, 300);
        for i in 0..visible {
            let bbox = start.translate(3 * i as i32, 0);
            script.push(vec![RawDetection::new(bbox, 0.82, 43)]);
        }
        Self::new("stub-objects", script)
    }

    /// Demo face model: one face always visible.
    pub fn demo_faces() -> Self {
        Self::constant(
            "stub-faces",
            vec![RawDetection::new(BoundingBox::new(300, 120, 360, 190), 0.91, 0)],
        )
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let out = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(out)
    }
}

/// Scripted pose backend.
pub struct StubPoseBackend {
    script: Vec<Option<PoseLandmarks>>,
    cursor: usize,
}

impl StubPoseBackend {
    pub fn new(script: Vec<Option<PoseLandmarks>>) -> Self {
        Self { script, cursor: 0 }
    }

    pub fn upright() -> Self {
        Self::new(vec![Some(PoseLandmarks::upright())])
    }

    pub fn absent() -> Self {
        Self::new(vec![None])
    }
}

impl PoseBackend for StubPoseBackend {
    fn name(&self) -> &str {
        "stub-pose"
    }

    fn estimate(&mut self, _frame: &Frame) -> Result<Option<PoseLandmarks>> {
        if self.script.is_empty() {
            return Ok(None);
        }
        let out = self.script[self.cursor % self.script.len()];
        self.cursor = self.cursor.wrapping_add(1);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_wraps_around() {
        let frame = Frame::blank(2, 2, 1);
        let mut backend = StubBackend::demo_objects(2, 1);
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.detect(&frame).unwrap()[0].class_id, 43);
        assert!(backend.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn pose_script() {
        let frame = Frame::blank(2, 2, 1);
        let mut pose = StubPoseBackend::new(vec![None, Some(PoseLandmarks::upright())]);
        assert!(pose.estimate(&frame).unwrap().is_none());
        assert!(pose.estimate(&frame).unwrap().is_some());
        assert!(StubPoseBackend::absent().estimate(&frame).unwrap().is_none());
    }
}
