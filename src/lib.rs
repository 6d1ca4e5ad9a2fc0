//! Nursery Sentinel
//!
//! Real-time risk fusion for monitored nursery cameras.
//!
//! # Architecture
//!
//! Every monitored source gets exactly one detection worker. A worker owns all
//! of its per-frame state and never shares it:
//!
//! 1. **Tracking**: Kalman-filtered boxes associated frame-to-frame by IOU.
//! 2. **Detector families**: danger objects, suffocation (no face), posture.
//! 3. **Fusion**: one ranked verdict per frame.
//! 4. **Escalation**: duration-based Warning to Danger upgrade.
//! 5. **Cooldown**: identical messages are not re-sent inside the window.
//!
//! Admitted alerts are recorded through a `NotificationStore` and handed to a
//! single dispatcher thread that fans them out to live subscribers.
//!
//! # Module Structure
//!
//! - `track`: bounding boxes, Kalman filter, assignment, tracker
//! - `detect`: backend contracts and detector families
//! - `fusion`, `escalate`, `cooldown`: per-frame decision stages
//! - `pipeline`: composition of the stages for one source
//! - `worker`: detection loop and `WorkerRegistry`
//! - `broadcast`, `transport`: alert fan-out and the TCP subscriber surface
//! - `storage`: notification persistence
//! - `ingest`, `frame`: frame sources

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod broadcast;
pub mod config;
pub mod cooldown;
pub mod detect;
pub mod error;
pub mod escalate;
pub mod frame;
pub mod fusion;
pub mod ingest;
pub mod pipeline;
pub mod storage;
pub mod track;
pub mod transport;
pub mod worker;

pub use broadcast::{
    AlertBroadcaster, AlertDispatcher, AlertEvent, AlertSender, BroadcastReport, Subscriber,
    SubscriberId,
};
pub use cooldown::CooldownGate;
pub use detect::{
    DetectorBackend, DetectorSet, Family, Finding, PoseBackend, PoseLandmarks, RawDetection,
};
pub use error::{Result, SentinelError};
pub use escalate::{Escalation, TemporalEscalator};
pub use frame::Frame;
pub use fusion::{Cause, FusedVerdict, FusionEngine};
pub use ingest::{FrameSource, SyntheticSource};
pub use pipeline::{FrameOutcome, FramePipeline, PendingAlert, PipelineSettings, StageTimings};
pub use storage::{InMemoryNotificationStore, Notification, NotificationStore, SqliteNotificationStore};
pub use track::{BoundingBox, TrackedObject, Tracker, TrackerConfig};
pub use worker::{WorkerFactory, WorkerRegistry, WorkerState, WorkerStatus};

// -------------------- Severity --------------------

/// Severity of a finding or verdict. Ordered `Safe < Warning < Danger`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Safe,
    Warning,
    Danger,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Safe => "safe",
            Level::Warning => "warning",
            Level::Danger => "danger",
        }
    }

    /// Warning and Danger are the levels that produce alerts.
    pub fn is_actionable(self) -> bool {
        self > Level::Safe
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "safe" => Some(Level::Safe),
            "warning" => Some(Level::Warning),
            "danger" => Some(Level::Danger),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Sources --------------------

/// Opaque identifier of a monitored video source.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        SourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        SourceId::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        SourceId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Safe < Level::Warning);
        assert!(Level::Warning < Level::Danger);
        assert_eq!(
            [Level::Warning, Level::Danger, Level::Safe].iter().max(),
            Some(&Level::Danger)
        );
        assert!(!Level::Safe.is_actionable());
        assert!(Level::Warning.is_actionable());
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Level::Danger).unwrap(), "\"danger\"");
        assert_eq!(Level::parse(" Warning "), Some(Level::Warning));
        assert_eq!(Level::parse("critical"), None);
    }
}
