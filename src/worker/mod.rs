//! Per-source detection workers.
//!
//! One OS thread per monitored source. The thread exclusively owns its frame
//! source, detector backends and pipeline state; the only shared pieces are
//! the notification store and the alert queue.

mod detection;
mod registry;

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::detect::DetectorSet;
use crate::ingest::{self, FrameSource};
use crate::SourceId;

pub use detection::{DetectionWorker, WorkerCounters};
pub use registry::{WorkerRegistry, WorkerSettings, WorkerState, WorkerStatus};

/// Builds what a worker needs for one source.
///
/// Called from `WorkerRegistry::start` on the caller's thread, so failures
/// surface synchronously.
pub trait WorkerFactory: Send + Sync {
    fn open_source(&self, source_id: &SourceId) -> Result<Box<dyn FrameSource>>;

    fn build_detectors(&self, source_id: &SourceId) -> Result<DetectorSet>;
}

type DetectorBuilder = dyn Fn(&SourceId) -> Result<DetectorSet> + Send + Sync;

/// Factory backed by a static `source id -> url` table.
pub struct UrlWorkerFactory {
    urls: BTreeMap<SourceId, String>,
    frame_interval: Duration,
    detectors: Box<DetectorBuilder>,
}

impl UrlWorkerFactory {
    pub fn new<F>(urls: BTreeMap<SourceId, String>, frame_interval: Duration, detectors: F) -> Self
    where
        F: Fn(&SourceId) -> Result<DetectorSet> + Send + Sync + 'static,
    {
        Self {
            urls,
            frame_interval,
            detectors: Box::new(detectors),
        }
    }

    pub fn url(&self, source_id: &SourceId) -> Option<&str> {
        self.urls.get(source_id).map(String::as_str)
    }
}

impl WorkerFactory for UrlWorkerFactory {
    fn open_source(&self, source_id: &SourceId) -> Result<Box<dyn FrameSource>> {
        let url = self
            .url(source_id)
            .ok_or_else(|| anyhow!("no url configured for source {}", source_id))?;
        ingest::open_url(url, self.frame_interval)
    }

    fn build_detectors(&self, source_id: &SourceId) -> Result<DetectorSet> {
        (self.detectors)(source_id)
    }
}
