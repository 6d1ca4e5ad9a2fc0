//! Suffocation family: a face that stays out of view escalates with time.

use std::time::{Duration, Instant};

use super::backend::RawDetection;
use super::finding::{FaceFinding, Finding};
use crate::escalate::TemporalEscalator;
use crate::Level;

#[derive(Clone, Debug, Default)]
pub struct SuffocationMonitor {
    escalator: TemporalEscalator,
}

impl SuffocationMonitor {
    pub fn new(danger_after: Duration) -> Self {
        Self {
            escalator: TemporalEscalator::new(danger_after),
        }
    }

    /// Visible faces each yield a Safe finding and reset the timer. No face
    /// yields one escalated finding carrying the missing duration.
    pub fn assess(&mut self, faces: &[RawDetection], now: Instant) -> Vec<Finding> {
        match self.escalator.observe(faces.is_empty(), now) {
            Some(escalation) => vec![Finding::Suffocation(FaceFinding {
                level: escalation.level,
                bbox: None,
                confidence: 0.0,
                duration_secs: Some(escalation.duration_secs),
            })],
            None => faces
                .iter()
                .map(|face| {
                    Finding::Suffocation(FaceFinding {
                        level: Level::Safe,
                        bbox: Some(face.bbox),
                        confidence: face.confidence,
                        duration_secs: None,
                    })
                })
                .collect(),
        }
    }

    pub fn face_missing(&self) -> bool {
        self.escalator.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::BoundingBox;

    #[test]
    fn missing_face_escalates_and_visible_face_resets() {
        let base = Instant::now();
        let mut monitor = SuffocationMonitor::new(Duration::from_secs(10));

        let findings = monitor.assess(&[], base);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level(), Level::Warning);

        let findings = monitor.assess(&[], base + Duration::from_secs(10));
        assert_eq!(findings[0].level(), Level::Danger);
        assert!(monitor.face_missing());

        let face = RawDetection::new(BoundingBox::new(10, 10, 40, 40), 0.9, 0);
        let findings = monitor.assess(&[face], base + Duration::from_secs(11));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level(), Level::Safe);
        assert!(!monitor.face_missing());
    }
}
