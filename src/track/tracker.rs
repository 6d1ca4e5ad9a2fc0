//! Frame-to-frame multi-object tracker.

use serde::{Deserialize, Serialize};

use super::assignment::associate;
use super::bbox::{iou_matrix, BoundingBox};
use super::kalman::KalmanNoise;
use super::registry::TrackRegistry;
use crate::detect::RawDetection;

/// Tracker tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track may go unmatched before eviction.
    pub max_age: u32,
    /// Consecutive hits that make a track confirmed.
    pub min_hits: u32,
    /// Minimum IoU for a detection/track match.
    pub iou_threshold: f64,
    /// Report every surviving track, confirmed or not.
    pub report_unconfirmed: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            min_hits: 3,
            iou_threshold: 0.3,
            report_unconfirmed: true,
        }
    }
}

/// A track as reported for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedObject {
    pub track_id: u64,
    pub bbox: BoundingBox,
    pub hit_streak: u32,
}

/// Result of one tracker step.
#[derive(Clone, Debug, Default)]
pub struct TrackerStep {
    /// Reported tracks in creation order.
    pub tracks: Vec<TrackedObject>,
    /// Track id each input detection was bound to, by detection index.
    pub detection_tracks: Vec<u64>,
    /// Ids evicted during this step.
    pub evicted: Vec<u64>,
}

/// IoU + Kalman tracker. One instance per worker; restart by building a new one.
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    registry: TrackRegistry,
    frame_count: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_noise(config, KalmanNoise::default())
    }

    pub fn with_noise(config: TrackerConfig, noise: KalmanNoise) -> Self {
        let registry = TrackRegistry::new(config.max_age, noise);
        Self {
            config,
            registry,
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn live_tracks(&self) -> usize {
        self.registry.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run one frame: associate, update, spawn, predict, evict, report.
    ///
    /// Zero-area detections are not tracked; their `detection_tracks` entry
    /// stays 0.
    pub fn update(&mut self, detections: &[RawDetection]) -> TrackerStep {
        self.frame_count += 1;
        self.registry.begin_step();

        let mut detection_tracks = vec![0u64; detections.len()];
        let trackable: Vec<usize> = (0..detections.len())
            .filter(|&d| {
                let degenerate = detections[d].bbox.is_degenerate();
                if degenerate {
                    log::debug!(
                        "skipping zero-area detection {} (class {})",
                        detections[d].bbox,
                        detections[d].class_id
                    );
                }
                !degenerate
            })
            .collect();

        if self.registry.is_empty() {
            // first sighting: every detection is its own new track
            for &d in &trackable {
                let det = &detections[d];
                detection_tracks[d] = self.registry.spawn(&det.bbox, Some(det.class_id));
            }
        } else {
            self.associate_and_update(detections, &trackable, &mut detection_tracks);
        }

        let evicted = self.registry.predict_and_evict();
        if !evicted.is_empty() {
            log::debug!("tracker evicted {:?}", evicted);
        }

        let tracks = self
            .registry
            .iter()
            .filter(|track| self.reportable(track.hit_streak))
            .map(|track| TrackedObject {
                track_id: track.id,
                bbox: track.bbox(),
                hit_streak: track.hit_streak,
            })
            .collect();

        TrackerStep {
            tracks,
            detection_tracks,
            evicted,
        }
    }

    fn associate_and_update(
        &mut self,
        detections: &[RawDetection],
        trackable: &[usize],
        detection_tracks: &mut [u64],
    ) {
        let boxes: Vec<BoundingBox> = trackable.iter().map(|&d| detections[d].bbox).collect();
        let track_boxes = self.registry.boxes();
        let association = associate(
            &iou_matrix(&boxes, &track_boxes),
            track_boxes.len(),
            self.config.iou_threshold,
        );

        for &(i, t) in &association.matches {
            let d = trackable[i];
            let det = &detections[d];
            if let Some(track) = self.registry.get_mut(t) {
                if let Err(err) = track.update(&det.bbox, Some(det.class_id)) {
                    log::warn!("track {} update skipped: {}", track.id, err);
                }
                detection_tracks[d] = track.id;
            }
        }

        for &i in &association.unmatched_detections {
            let d = trackable[i];
            let det = &detections[d];
            detection_tracks[d] = self.registry.spawn(&det.bbox, Some(det.class_id));
        }
    }

    fn reportable(&self, hit_streak: u32) -> bool {
        self.config.report_unconfirmed
            || hit_streak >= self.config.min_hits
            || self.frame_count <= self.config.min_hits as u64
    }
}
