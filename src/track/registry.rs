//! Ownership, aging and eviction of live tracks.

use anyhow::Result;

use super::bbox::BoundingBox;
use super::kalman::{BoxKalmanFilter, KalmanNoise};

/// One tracked object identity.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: u64,
    kf: BoxKalmanFilter,
    /// Number of frames with a matched detection.
    pub hits: u32,
    /// Consecutive frames with a matched detection.
    pub hit_streak: u32,
    /// Consecutive frames without a matched detection.
    pub frames_since_update: u32,
    /// Class of the most recent matched detection.
    pub class_id: Option<i32>,
}

impl Track {
    fn new(id: u64, bbox: &BoundingBox, class_id: Option<i32>, noise: &KalmanNoise) -> Self {
        Self {
            id,
            kf: BoxKalmanFilter::new(bbox, noise),
            hits: 1,
            hit_streak: 1,
            frames_since_update: 0,
            class_id,
        }
    }

    /// Measurement update with a matched detection.
    pub fn update(&mut self, bbox: &BoundingBox, class_id: Option<i32>) -> Result<()> {
        // several matches inside one step count once
        if self.frames_since_update > 0 {
            self.hits += 1;
            self.hit_streak += 1;
        }
        self.frames_since_update = 0;
        if class_id.is_some() {
            self.class_id = class_id;
        }
        self.kf.update(bbox)
    }

    /// Open a new frame: the track counts as stale until a detection
    /// matches it in this frame.
    pub fn begin_step(&mut self) {
        if self.frames_since_update > 0 {
            self.hit_streak = 0;
        }
        self.frames_since_update += 1;
    }

    /// Advance the motion model one frame and return the predicted box.
    pub fn predict(&mut self) -> BoundingBox {
        self.kf.predict();
        self.kf.bbox()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.kf.bbox()
    }
}

/// Set of live tracks for one tracker, in creation order.
///
/// Ids are issued from a counter owned by the registry, so two workers never
/// share or race on track ids. Ids are never reused.
#[derive(Debug)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    next_id: u64,
    max_age: u32,
    noise: KalmanNoise,
}

impl TrackRegistry {
    pub fn new(max_age: u32, noise: KalmanNoise) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_age,
            noise,
        }
    }

    pub fn spawn(&mut self, bbox: &BoundingBox, class_id: Option<i32>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.push(Track::new(id, bbox, class_id, &self.noise));
        id
    }

    /// Mark every live track stale for the frame about to be associated.
    pub fn begin_step(&mut self) {
        for track in &mut self.tracks {
            track.begin_step();
        }
    }

    /// Predict every track and drop those unmatched for more than `max_age`
    /// consecutive frames. Returns the ids evicted this step.
    pub fn predict_and_evict(&mut self) -> Vec<u64> {
        let max_age = self.max_age;
        let mut evicted = Vec::new();
        self.tracks.retain_mut(|track| {
            track.predict();
            if track.frames_since_update > max_age {
                evicted.push(track.id);
                false
            } else {
                true
            }
        });
        evicted
    }

    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.tracks.iter().map(Track::bbox).collect()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn find(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut reg = TrackRegistry::new(0, KalmanNoise::default());
        let b = BoundingBox::new(0, 0, 10, 10);
        let first = reg.spawn(&b, None);
        // a fresh track survives the frame it was born in
        assert!(reg.predict_and_evict().is_empty());
        // max_age 0: the first missed frame evicts
        reg.begin_step();
        let evicted = reg.predict_and_evict();
        assert_eq!(evicted, vec![first]);
        assert!(reg.is_empty());

        let second = reg.spawn(&b, None);
        assert!(second > first);
    }

    #[test]
    fn eviction_only_after_max_age() {
        let mut reg = TrackRegistry::new(2, KalmanNoise::default());
        let id = reg.spawn(&BoundingBox::new(0, 0, 10, 10), Some(43));
        reg.predict_and_evict();
        for _ in 0..2 {
            reg.begin_step();
            assert!(reg.predict_and_evict().is_empty());
        }
        assert_eq!(reg.find(id).map(|t| t.frames_since_update), Some(2));
        reg.begin_step();
        assert_eq!(reg.predict_and_evict(), vec![id]);
    }

    #[test]
    fn update_resets_staleness() {
        let mut reg = TrackRegistry::new(5, KalmanNoise::default());
        let b = BoundingBox::new(0, 0, 10, 10);
        reg.spawn(&b, None);
        reg.predict_and_evict();
        reg.begin_step();
        let track = reg.get_mut(0).unwrap();
        assert_eq!(track.hit_streak, 1);
        track.update(&b, Some(7)).unwrap();
        assert_eq!(track.frames_since_update, 0);
        assert_eq!(track.hits, 2);
        assert_eq!(track.hit_streak, 2);
        assert_eq!(track.class_id, Some(7));
    }
}
