//! Object tracking: Kalman motion model plus IoU-based optimal association.

pub mod assignment;
pub mod bbox;
pub mod kalman;
pub mod registry;
pub mod tracker;

pub use assignment::{associate, Association};
pub use bbox::{iou, BoundingBox};
pub use kalman::{BoxKalmanFilter, KalmanNoise};
pub use registry::{Track, TrackRegistry};
pub use tracker::{TrackedObject, Tracker, TrackerConfig, TrackerStep};
