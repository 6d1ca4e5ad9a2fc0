//! Duration-based escalation of a persistent condition.
//!
//! The timer starts on the first frame the condition holds and resets on the
//! first frame it does not. There is no carry-over across gaps.

use std::time::{Duration, Instant};

use crate::Level;

/// Default time a condition must persist before it becomes Danger.
pub const DEFAULT_ESCALATION_THRESHOLD: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Escalation {
    pub level: Level,
    /// Seconds since the condition started, rounded to 2 decimals.
    pub duration_secs: f64,
}

#[derive(Clone, Debug)]
pub struct TemporalEscalator {
    threshold: Duration,
    condition_started_at: Option<Instant>,
}

impl TemporalEscalator {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            condition_started_at: None,
        }
    }

    /// Feed one frame. Returns the escalation while the condition holds.
    pub fn observe(&mut self, condition_holds: bool, now: Instant) -> Option<Escalation> {
        if !condition_holds {
            self.condition_started_at = None;
            return None;
        }
        let started = *self.condition_started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        let level = if elapsed >= self.threshold {
            Level::Danger
        } else {
            Level::Warning
        };
        Some(Escalation {
            level,
            duration_secs: round2(elapsed.as_secs_f64()),
        })
    }

    pub fn is_active(&self) -> bool {
        self.condition_started_at.is_some()
    }
}

impl Default for TemporalEscalator {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_THRESHOLD)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
