use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::{AlertEvent, AlertSender};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::pipeline::{FrameOutcome, FramePipeline, StageTimings};
use crate::storage::NotificationStore;
use crate::SourceId;

const HEALTH_LOG_EVERY: Duration = Duration::from_secs(30);

/// Progress counters readable from the registry while the worker runs.
///
/// Stage totals are kept in microseconds.
#[derive(Debug, Default)]
pub struct WorkerCounters {
    frames: AtomicU64,
    alerts: AtomicU64,
    objects_us: AtomicU64,
    faces_us: AtomicU64,
    pose_us: AtomicU64,
    decision_us: AtomicU64,
}

impl WorkerCounters {
    pub fn frames_processed(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn alerts_emitted(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    fn record_frame(&self, timings: &StageTimings) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.objects_us.fetch_add(micros(timings.objects), Ordering::Relaxed);
        self.faces_us.fetch_add(micros(timings.faces), Ordering::Relaxed);
        self.pose_us.fetch_add(micros(timings.pose), Ordering::Relaxed);
        self.decision_us.fetch_add(micros(timings.decision), Ordering::Relaxed);
    }

    /// Running totals over every processed frame.
    pub fn total_timings(&self) -> StageTimings {
        StageTimings {
            objects: Duration::from_micros(self.objects_us.load(Ordering::Relaxed)),
            faces: Duration::from_micros(self.faces_us.load(Ordering::Relaxed)),
            pose: Duration::from_micros(self.pose_us.load(Ordering::Relaxed)),
            decision: Duration::from_micros(self.decision_us.load(Ordering::Relaxed)),
        }
    }

    /// Per-frame averages; zero before the first frame.
    pub fn average_timings(&self) -> StageTimings {
        let frames = self.frames_processed();
        if frames == 0 {
            return StageTimings::default();
        }
        let total = self.total_timings();
        let per_frame = |d: Duration| Duration::from_micros(micros(d) / frames);
        StageTimings {
            objects: per_frame(total.objects),
            faces: per_frame(total.faces),
            pose: per_frame(total.pose),
            decision: per_frame(total.decision),
        }
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// The loop body for one source.
pub struct DetectionWorker {
    source_id: SourceId,
    source: Box<dyn FrameSource>,
    pipeline: FramePipeline,
    store: Arc<dyn NotificationStore>,
    alerts: AlertSender,
    counters: Arc<WorkerCounters>,
}

impl DetectionWorker {
    pub fn new(
        source_id: SourceId,
        source: Box<dyn FrameSource>,
        pipeline: FramePipeline,
        store: Arc<dyn NotificationStore>,
        alerts: AlertSender,
    ) -> Self {
        Self {
            source_id,
            source,
            pipeline,
            store,
            alerts,
            counters: Arc::new(WorkerCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<WorkerCounters> {
        self.counters.clone()
    }

    /// Run one frame through the pipeline, persist every admitted alert and
    /// queue it for broadcast.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        let outcome = self.pipeline.process(frame, now);
        self.counters.record_frame(&outcome.timings);

        for alert in &outcome.alerts {
            let notification = match self
                .store
                .record_alert(&self.source_id, alert.level, &alert.message)
            {
                Ok(notification) => notification,
                Err(err) => {
                    log::error!(
                        "[{}] failed to persist {} alert '{}': {:#}",
                        self.source_id,
                        alert.level,
                        alert.message,
                        err
                    );
                    continue;
                }
            };
            log::info!(
                "[{}] alert #{} {} {}",
                self.source_id,
                notification.id,
                notification.level,
                notification.message
            );
            self.counters.alerts.fetch_add(1, Ordering::Relaxed);
            self.alerts.submit(AlertEvent::from(&notification));
        }
        outcome
    }

    /// Poll until `cancel` is raised. The flag is checked once per iteration.
    pub fn run(mut self, cancel: Arc<AtomicBool>, interval: Duration) {
        log::info!(
            "[{}] detection started on {}",
            self.source_id,
            self.source.describe()
        );
        let mut last_health_log = Instant::now();

        while !cancel.load(Ordering::SeqCst) {
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    self.process_frame(&frame, Instant::now());
                }
                Ok(None) => {}
                Err(err) => log::warn!("[{}] frame read failed: {:#}", self.source_id, err),
            }

            if last_health_log.elapsed() >= HEALTH_LOG_EVERY {
                let avg = self.counters.average_timings();
                log::info!(
                    "[{}] health={} captured={} processed={} alerts={} avg_ms objects={:.2} faces={:.2} pose={:.2} decision={:.2}",
                    self.source_id,
                    self.source.is_healthy(),
                    self.source.frames_captured(),
                    self.counters.frames_processed(),
                    self.counters.alerts_emitted(),
                    ms(avg.objects),
                    ms(avg.faces),
                    ms(avg.pose),
                    ms(avg.decision)
                );
                last_health_log = Instant::now();
            }

            std::thread::sleep(interval);
        }

        log::info!(
            "[{}] detection stopped after {} frame(s)",
            self.source_id,
            self.counters.frames_processed()
        );
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
