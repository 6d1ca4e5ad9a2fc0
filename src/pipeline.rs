//! Per-frame composition of tracking, detector families, fusion, escalation
//! and cooldown for one source.
//!
//! A `FramePipeline` is owned by exactly one worker, so nothing in here locks.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::cooldown::{CooldownGate, DEFAULT_COOLDOWN_WINDOW};
use crate::detect::posture::DEFAULT_FALL_MARGIN;
use crate::detect::{
    DetectorSet, Family, Finding, HazardTable, PostureClassifier, SuffocationMonitor,
};
use crate::error::SentinelError;
use crate::escalate::DEFAULT_ESCALATION_THRESHOLD;
use crate::frame::Frame;
use crate::fusion::{FusedVerdict, FusionEngine};
use crate::track::{TrackedObject, Tracker, TrackerConfig};
use crate::Level;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub tracker: TrackerConfig,
    /// Minimum spacing between repeats of the same alert message.
    pub cooldown: Duration,
    /// How long a face may stay out of view before it is Danger.
    pub no_face_danger_after: Duration,
    pub fall_margin: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            cooldown: DEFAULT_COOLDOWN_WINDOW,
            no_face_danger_after: DEFAULT_ESCALATION_THRESHOLD,
            fall_margin: DEFAULT_FALL_MARGIN,
        }
    }
}

/// An alert that passed the cooldown gate and still needs an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAlert {
    pub family: Family,
    pub level: Level,
    pub message: String,
}

/// Wall-clock time spent in each stage of one frame.
///
/// A family stage covers its backend call and the assessment of its output;
/// `decision` covers fusion and the cooldown gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub objects: Duration,
    pub faces: Duration,
    pub pose: Duration,
    pub decision: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.objects + self.faces + self.pose + self.decision
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameOutcome {
    pub sequence: u64,
    pub tracks: Vec<TrackedObject>,
    pub verdict: FusedVerdict,
    /// Admitted alerts in verdict order.
    pub alerts: Vec<PendingAlert>,
    /// Families whose backend failed this frame.
    pub skipped: Vec<Family>,
    pub timings: StageTimings,
}

pub struct FramePipeline {
    detectors: DetectorSet,
    tracker: Tracker,
    hazards: HazardTable,
    suffocation: SuffocationMonitor,
    posture: PostureClassifier,
    fusion: FusionEngine,
    cooldown: CooldownGate,
}

impl FramePipeline {
    pub fn new(detectors: DetectorSet, settings: &PipelineSettings) -> Self {
        Self {
            detectors,
            tracker: Tracker::new(settings.tracker.clone()),
            hazards: HazardTable::default(),
            suffocation: SuffocationMonitor::new(settings.no_face_danger_after),
            posture: PostureClassifier {
                fall_margin: settings.fall_margin,
            },
            fusion: FusionEngine::new(),
            cooldown: CooldownGate::new(settings.cooldown),
        }
    }

    pub fn warm_up(&mut self) -> anyhow::Result<()> {
        self.detectors.warm_up()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Run every stage on one frame observed at `now`.
    pub fn process(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        let mut findings: Vec<Finding> = Vec::new();
        let mut skipped = Vec::new();
        let mut tracks = Vec::new();
        let mut timings = StageTimings::default();

        let started = Instant::now();
        match self.detectors.objects.detect(frame) {
            Ok(detections) => {
                let step = self.tracker.update(&detections);
                findings.extend(self.hazards.assess(&detections, &step.detection_tracks));
                tracks = step.tracks;
            }
            Err(err) => {
                report_skip(Family::DangerObject, err, &mut skipped);
            }
        }
        timings.objects = started.elapsed();

        let started = Instant::now();
        match self.detectors.faces.detect(frame) {
            Ok(faces) => findings.extend(self.suffocation.assess(&faces, now)),
            Err(err) => report_skip(Family::Suffocation, err, &mut skipped),
        }
        timings.faces = started.elapsed();

        let started = Instant::now();
        match self.detectors.pose.estimate(frame) {
            Ok(landmarks) => findings.extend(self.posture.assess(landmarks.as_ref())),
            Err(err) => report_skip(Family::Posture, err, &mut skipped),
        }
        timings.pose = started.elapsed();

        let started = Instant::now();
        let verdict = self.fusion.fuse(&findings);

        let mut alerts = Vec::new();
        for cause in verdict.actionable() {
            if self.cooldown.admit(cause.level, &cause.reason, now) {
                alerts.push(PendingAlert {
                    family: cause.family,
                    level: cause.level,
                    message: cause.reason.clone(),
                });
            }
        }
        timings.decision = started.elapsed();

        FrameOutcome {
            sequence: frame.sequence,
            tracks,
            verdict,
            alerts,
            skipped,
            timings,
        }
    }
}

fn report_skip(family: Family, err: anyhow::Error, skipped: &mut Vec<Family>) {
    let err = SentinelError::detector(family, format!("{:#}", err));
    log::warn!("frame skipped for family: {}", err);
    skipped.push(family);
}
