//! Alert fan-out.
//!
//! Workers never talk to subscribers directly. They push `AlertEvent`s into a
//! bounded queue (`AlertSender`); one dispatcher thread drains it in FIFO
//! order into the `AlertBroadcaster`, which delivers to every live subscriber.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::error::SentinelError;
use crate::storage::Notification;
use crate::Level;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Wire record sent to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: i64,
    pub level: Level,
    pub message: String,
}

impl From<&Notification> for AlertEvent {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            level: n.level,
            message: n.message.clone(),
        }
    }
}

/// A push channel to one client. A failed `send` means the client is gone.
pub trait Subscriber: Send + Sync {
    fn send(&self, payload: &str) -> Result<()>;

    fn describe(&self) -> String {
        "subscriber".to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
}

/// The live subscriber set.
///
/// Delivery happens on a snapshot taken under the lock; the lock is never
/// held while sending.
#[derive(Default)]
pub struct AlertBroadcaster {
    inner: Mutex<Subscribers>,
}

impl AlertBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriberId(inner.next_id);
        log::info!("subscriber {} connected: {}", id.0, subscriber.describe());
        inner.entries.push((id, subscriber));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(sid, _)| *sid != id);
        inner.entries.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Deliver one event to every subscriber. Failures never reach the
    /// caller; failed subscribers are removed after the pass.
    pub fn broadcast(&self, event: &AlertEvent) -> BroadcastReport {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("alert {} not serializable: {}", event.id, err);
                return BroadcastReport::default();
            }
        };

        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self.lock().entries.clone();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, subscriber) in snapshot {
            match subscriber.send(&payload) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    let err = SentinelError::DeliveryFailure(format!(
                        "{} ({}): {:#}",
                        id.0,
                        subscriber.describe(),
                        err
                    ));
                    log::warn!("dropping subscriber: {}", err);
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut inner = self.lock();
            inner.entries.retain(|(id, _)| !failed.contains(id));
            report.dropped = failed.len();
        }
        report
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Producer handle for the dispatcher queue. Cheap to clone, one per worker.
#[derive(Clone)]
pub struct AlertSender {
    tx: SyncSender<AlertEvent>,
}

impl AlertSender {
    /// Enqueue without blocking. Returns false if the alert was dropped.
    pub fn submit(&self, event: AlertEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                log::warn!("alert queue full, dropping alert {} ({})", event.id, event.message);
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                log::warn!("alert dispatcher gone, dropping alert {}", event.id);
                false
            }
        }
    }
}

/// The single thread that owns broadcasting.
pub struct AlertDispatcher {
    join: Option<JoinHandle<u64>>,
}

impl AlertDispatcher {
    /// Spawn the dispatcher. It exits once every `AlertSender` is dropped.
    pub fn spawn(
        broadcaster: Arc<AlertBroadcaster>,
        capacity: usize,
    ) -> Result<(Self, AlertSender)> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let join = std::thread::Builder::new()
            .name("alert-dispatch".to_string())
            .spawn(move || drain(rx, &broadcaster))?;
        Ok((Self { join: Some(join) }, AlertSender { tx }))
    }

    /// Wait for the queue to drain. Returns the number of alerts dispatched.
    pub fn join(mut self) -> Result<u64> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("alert dispatcher thread panicked")),
            None => Ok(0),
        }
    }
}

fn drain(rx: Receiver<AlertEvent>, broadcaster: &AlertBroadcaster) -> u64 {
    let mut dispatched = 0u64;
    for event in rx {
        let report = broadcaster.broadcast(&event);
        log::debug!(
            "alert {} delivered to {} subscriber(s), {} dropped",
            event.id,
            report.delivered,
            report.dropped
        );
        dispatched += 1;
    }
    log::info!("alert dispatcher stopped after {} alert(s)", dispatched);
    dispatched
}
