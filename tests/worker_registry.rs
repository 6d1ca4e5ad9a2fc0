use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nursery_sentinel::detect::{DetectorBackend, RawDetection, StubBackend, StubPoseBackend};
use nursery_sentinel::frame::Frame;
use nursery_sentinel::ingest::FrameSource;
use nursery_sentinel::worker::{UrlWorkerFactory, WorkerSettings};
use nursery_sentinel::{
    AlertBroadcaster, AlertDispatcher, AlertEvent, BoundingBox, DetectorSet,
    InMemoryNotificationStore, Level, SentinelError, SourceId, Subscriber, WorkerFactory,
    WorkerRegistry, WorkerState,
};

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Subscriber for Recorder {
    fn send(&self, payload: &str) -> Result<()> {
        self.seen.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}

fn knife_set(_: &SourceId) -> Result<DetectorSet> {
    Ok(DetectorSet::new(
        StubBackend::constant(
            "objects",
            vec![RawDetection::new(BoundingBox::new(10, 10, 50, 90), 0.9, 43)],
        ),
        StubBackend::demo_faces(),
        StubPoseBackend::upright(),
    ))
}

fn fast_settings() -> WorkerSettings {
    WorkerSettings {
        loop_interval: Duration::from_millis(5),
        ..WorkerSettings::default()
    }
}

fn stub_factory() -> UrlWorkerFactory {
    let mut urls = BTreeMap::new();
    urls.insert(SourceId::from("crib"), "stub://crib".to_string());
    urls.insert(SourceId::from("hall"), "stub://hall".to_string());
    urls.insert(SourceId::from("porch"), "rtsp://10.1.1.1/live".to_string());
    UrlWorkerFactory::new(urls, Duration::from_millis(1), knife_set)
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn start_stop_lifecycle_is_not_idempotent() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 16).unwrap();
    let registry = WorkerRegistry::new(
        Arc::new(stub_factory()),
        Arc::new(InMemoryNotificationStore::new()),
        alerts,
        fast_settings(),
    );
    let crib = SourceId::from("crib");

    registry.start(&crib).unwrap();
    assert_eq!(registry.state(&crib), WorkerState::Running);
    assert!(matches!(
        registry.start(&crib),
        Err(SentinelError::AlreadyRunning(id)) if id == crib
    ));

    registry.stop(&crib).unwrap();
    assert_eq!(registry.state(&crib), WorkerState::Idle);
    assert!(registry.status(&crib).is_none());
    assert!(matches!(
        registry.stop(&crib),
        Err(SentinelError::NotRunning(_))
    ));

    // a fresh worker after a full stop
    registry.start(&crib).unwrap();
    registry.start(&SourceId::from("hall")).unwrap();
    assert_eq!(
        registry.running_sources(),
        vec![SourceId::from("crib"), SourceId::from("hall")]
    );
    registry.stop_all();
    assert!(registry.running_sources().is_empty());

    drop(registry);
    dispatcher.join().unwrap();
}

#[test]
fn unknown_or_undecodable_source_is_unavailable() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (_dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 4).unwrap();
    let registry = WorkerRegistry::new(
        Arc::new(stub_factory()),
        Arc::new(InMemoryNotificationStore::new()),
        alerts,
        fast_settings(),
    );

    for id in ["porch", "garage"] {
        let id = SourceId::from(id);
        let err = registry.start(&id).unwrap_err();
        assert!(matches!(err, SentinelError::SourceUnavailable { .. }), "{err}");
        assert!(err.is_lifecycle());
        assert_eq!(registry.state(&id), WorkerState::Idle);
    }
}

#[test]
fn running_worker_persists_and_broadcasts_alerts() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let recorder = Arc::new(Recorder::default());
    broadcaster.subscribe(recorder.clone());
    let (dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 16).unwrap();
    let store = Arc::new(InMemoryNotificationStore::new());
    let registry = WorkerRegistry::new(
        Arc::new(stub_factory()),
        store.clone(),
        alerts,
        fast_settings(),
    );
    let crib = SourceId::from("crib");

    registry.start(&crib).unwrap();
    assert!(wait_until(|| !recorder.seen.lock().unwrap().is_empty()));
    let status = registry.status(&crib).unwrap();
    assert!(status.frames_processed >= 1);
    assert_eq!(status.alerts_emitted, 1);
    registry.stop(&crib).unwrap();

    drop(registry);
    dispatcher.join().unwrap();

    // the 5s cooldown keeps a short run to a single alert
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let event: AlertEvent = serde_json::from_str(&seen[0]).unwrap();
    assert_eq!(event.id, 1);
    assert_eq!(event.level, Level::Danger);
    assert_eq!(event.message, "sharp_objects");
    assert_eq!(store.all()[0].source_id, crib);
}

struct SlowSource;

impl FrameSource for SlowSource {
    fn describe(&self) -> String {
        "slow://test".to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(None)
    }

    fn frames_captured(&self) -> u64 {
        0
    }
}

struct SlowFactory;

impl WorkerFactory for SlowFactory {
    fn open_source(&self, _source_id: &SourceId) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SlowSource))
    }

    fn build_detectors(&self, source_id: &SourceId) -> Result<DetectorSet> {
        knife_set(source_id)
    }
}

#[test]
fn stop_while_stopping_is_not_running() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (_dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 4).unwrap();
    let registry = Arc::new(WorkerRegistry::new(
        Arc::new(SlowFactory),
        Arc::new(InMemoryNotificationStore::new()),
        alerts,
        fast_settings(),
    ));
    let crib = SourceId::from("crib");
    registry.start(&crib).unwrap();

    let first_stop = {
        let registry = registry.clone();
        let crib = crib.clone();
        std::thread::spawn(move || registry.stop(&crib))
    };
    assert!(wait_until(|| registry.state(&crib) != WorkerState::Running));
    if registry.state(&crib) == WorkerState::Stopping {
        assert!(matches!(
            registry.stop(&crib),
            Err(SentinelError::NotRunning(_))
        ));
        assert!(matches!(
            registry.start(&crib),
            Err(SentinelError::AlreadyRunning(_))
        ));
    }
    first_stop.join().unwrap().unwrap();
    assert_eq!(registry.state(&crib), WorkerState::Idle);
}

struct IdleSource;

impl FrameSource for IdleSource {
    fn describe(&self) -> String {
        "idle://test".to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }

    fn frames_captured(&self) -> u64 {
        0
    }
}

/// Opening "slow" takes a full second, every other id opens at once.
struct SlowOpenFactory;

impl WorkerFactory for SlowOpenFactory {
    fn open_source(&self, source_id: &SourceId) -> Result<Box<dyn FrameSource>> {
        if source_id.as_str() == "slow" {
            std::thread::sleep(Duration::from_secs(1));
        }
        Ok(Box::new(IdleSource))
    }

    fn build_detectors(&self, source_id: &SourceId) -> Result<DetectorSet> {
        knife_set(source_id)
    }
}

#[test]
fn slow_start_does_not_block_other_sources() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (_dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 4).unwrap();
    let registry = Arc::new(WorkerRegistry::new(
        Arc::new(SlowOpenFactory),
        Arc::new(InMemoryNotificationStore::new()),
        alerts,
        fast_settings(),
    ));
    let fast = SourceId::from("fast");
    let slow = SourceId::from("slow");
    registry.start(&fast).unwrap();

    let slow_start = {
        let registry = registry.clone();
        let slow = slow.clone();
        std::thread::spawn(move || registry.start(&slow))
    };
    assert!(wait_until(|| registry.state(&slow) == WorkerState::Starting));

    let started = Instant::now();
    assert_eq!(registry.running_sources(), vec![fast.clone()]);
    assert_eq!(
        registry.status(&slow).map(|s| s.state),
        Some(WorkerState::Starting)
    );
    assert!(matches!(
        registry.start(&slow),
        Err(SentinelError::AlreadyRunning(_))
    ));
    assert!(matches!(
        registry.stop(&slow),
        Err(SentinelError::NotRunning(_))
    ));
    registry.stop(&fast).unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "registry calls waited {:?} on a starting source",
        started.elapsed()
    );

    slow_start.join().unwrap().unwrap();
    assert_eq!(registry.state(&slow), WorkerState::Running);
    registry.stop(&slow).unwrap();
}

struct SleepyObjects;

impl DetectorBackend for SleepyObjects {
    fn name(&self) -> &str {
        "sleepy-objects"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        std::thread::sleep(Duration::from_millis(10));
        Ok(Vec::new())
    }
}

#[test]
fn status_reports_average_stage_timings() {
    let broadcaster = Arc::new(AlertBroadcaster::new());
    let (_dispatcher, alerts) = AlertDispatcher::spawn(broadcaster, 16).unwrap();
    let mut urls = BTreeMap::new();
    urls.insert(SourceId::from("crib"), "stub://crib".to_string());
    let factory = UrlWorkerFactory::new(urls, Duration::from_millis(1), |_| {
        Ok(DetectorSet::new(
            SleepyObjects,
            StubBackend::demo_faces(),
            StubPoseBackend::upright(),
        ))
    });
    let registry = WorkerRegistry::new(
        Arc::new(factory),
        Arc::new(InMemoryNotificationStore::new()),
        alerts,
        fast_settings(),
    );
    let crib = SourceId::from("crib");
    registry.start(&crib).unwrap();
    assert!(wait_until(|| registry
        .status(&crib)
        .map(|s| s.frames_processed >= 3)
        .unwrap_or(false)));
    let status = registry.status(&crib).unwrap();
    assert!(status.avg_timings.objects >= Duration::from_millis(10));
    assert!(status.avg_timings.objects >= status.avg_timings.faces);
    registry.stop(&crib).unwrap();
}
