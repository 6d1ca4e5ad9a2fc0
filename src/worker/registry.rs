use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use super::detection::{DetectionWorker, WorkerCounters};
use super::WorkerFactory;
use crate::broadcast::AlertSender;
use crate::error::{Result, SentinelError};
use crate::pipeline::{FramePipeline, PipelineSettings, StageTimings};
use crate::storage::NotificationStore;
use crate::SourceId;

pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSettings {
    pub pipeline: PipelineSettings,
    /// Sleep between loop iterations.
    pub loop_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            loop_interval: DEFAULT_LOOP_INTERVAL,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    /// Source opening and detector warm-up in progress.
    Starting,
    Running,
    Stopping,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub source_id: SourceId,
    pub state: WorkerState,
    pub frames_processed: u64,
    pub alerts_emitted: u64,
    /// Mean time per processed frame for each stage.
    pub avg_timings: StageTimings,
}

struct WorkerEntry {
    state: WorkerState,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    counters: Arc<WorkerCounters>,
}

/// Owns the `source id -> worker` table. At most one worker per source.
pub struct WorkerRegistry {
    factory: Arc<dyn WorkerFactory>,
    store: Arc<dyn NotificationStore>,
    alerts: AlertSender,
    settings: WorkerSettings,
    workers: Mutex<HashMap<SourceId, WorkerEntry>>,
}

impl WorkerRegistry {
    pub fn new(
        factory: Arc<dyn WorkerFactory>,
        store: Arc<dyn NotificationStore>,
        alerts: AlertSender,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            factory,
            store,
            alerts,
            settings,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Start detection for `source_id`.
    ///
    /// A `Starting` entry reserves the id while the source is opened and the
    /// detectors warm up, so the table lock is only held to reserve, promote
    /// or release it. A concurrent start for the same id gets `AlreadyRunning`.
    pub fn start(&self, source_id: &SourceId) -> Result<()> {
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut workers = self.lock();
            if workers.contains_key(source_id) {
                return Err(SentinelError::AlreadyRunning(source_id.clone()));
            }
            workers.insert(
                source_id.clone(),
                WorkerEntry {
                    state: WorkerState::Starting,
                    cancel: cancel.clone(),
                    join: None,
                    counters: Arc::new(WorkerCounters::default()),
                },
            );
        }

        match self.launch(source_id, cancel) {
            Ok((join, counters)) => {
                let mut workers = self.lock();
                if let Some(entry) = workers.get_mut(source_id) {
                    entry.state = WorkerState::Running;
                    entry.join = Some(join);
                    entry.counters = counters;
                }
                Ok(())
            }
            Err(err) => {
                self.lock().remove(source_id);
                Err(err)
            }
        }
    }

    fn launch(
        &self,
        source_id: &SourceId,
        cancel: Arc<AtomicBool>,
    ) -> Result<(JoinHandle<()>, Arc<WorkerCounters>)> {
        let source = self
            .factory
            .open_source(source_id)
            .map_err(|err| SentinelError::source_unavailable(source_id, format!("{:#}", err)))?;
        let detectors = self.factory.build_detectors(source_id).map_err(|err| {
            SentinelError::Worker(format!("detector setup for {}: {:#}", source_id, err))
        })?;
        let mut pipeline = FramePipeline::new(detectors, &self.settings.pipeline);
        pipeline.warm_up().map_err(|err| {
            SentinelError::Worker(format!("detector warm-up for {}: {:#}", source_id, err))
        })?;

        let worker = DetectionWorker::new(
            source_id.clone(),
            source,
            pipeline,
            self.store.clone(),
            self.alerts.clone(),
        );
        let counters = worker.counters();
        let interval = self.settings.loop_interval;
        let join = std::thread::Builder::new()
            .name(format!("detect-{}", source_id))
            .spawn(move || worker.run(cancel, interval))
            .map_err(|err| SentinelError::Worker(err.to_string()))?;
        Ok((join, counters))
    }

    /// Stop detection for `source_id` and wait for its thread to exit.
    ///
    /// A second stop issued while the first is still joining gets `NotRunning`,
    /// and so does a stop for a source that is still starting.
    pub fn stop(&self, source_id: &SourceId) -> Result<()> {
        let join = {
            let mut workers = self.lock();
            let entry = match workers.get_mut(source_id) {
                Some(entry) if entry.state == WorkerState::Running => entry,
                _ => return Err(SentinelError::NotRunning(source_id.clone())),
            };
            entry.state = WorkerState::Stopping;
            entry.cancel.store(true, Ordering::SeqCst);
            entry.join.take()
        };

        let joined = match join {
            Some(join) => join.join().map_err(|_| {
                SentinelError::Worker(format!("detection thread for {} panicked", source_id))
            }),
            None => Ok(()),
        };

        self.lock().remove(source_id);
        joined
    }

    pub fn state(&self, source_id: &SourceId) -> WorkerState {
        self.lock()
            .get(source_id)
            .map(|entry| entry.state)
            .unwrap_or(WorkerState::Idle)
    }

    pub fn status(&self, source_id: &SourceId) -> Option<WorkerStatus> {
        self.lock().get(source_id).map(|entry| WorkerStatus {
            source_id: source_id.clone(),
            state: entry.state,
            frames_processed: entry.counters.frames_processed(),
            alerts_emitted: entry.counters.alerts_emitted(),
            avg_timings: entry.counters.average_timings(),
        })
    }

    /// Sources with a Running worker, sorted.
    pub fn running_sources(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.state == WorkerState::Running)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn stop_all(&self) {
        for source_id in self.running_sources() {
            match self.stop(&source_id) {
                Ok(()) | Err(SentinelError::NotRunning(_)) => {}
                Err(err) => log::error!("failed to stop {}: {}", source_id, err),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceId, WorkerEntry>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for WorkerRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
