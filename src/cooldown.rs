//! Per-message notification cooldown.
//!
//! Keys are the literal message text, so two different causes that render to
//! the same text share one cooldown bucket. Entries are overwritten on fire
//! and never expired; the window is checked on read.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::Level;

/// Default minimum spacing between two firings of the same message.
pub const DEFAULT_COOLDOWN_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct CooldownGate {
    window: Duration,
    last_fired: HashMap<String, Instant>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    /// Returns true when the alert should fire, and records the firing.
    /// Safe never fires and leaves the map untouched.
    pub fn admit(&mut self, level: Level, message: &str, now: Instant) -> bool {
        if !level.is_actionable() {
            return false;
        }
        if let Some(&last) = self.last_fired.get(message) {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_fired.insert(message.to_string(), now);
        true
    }

    pub fn last_fired(&self, message: &str) -> Option<Instant> {
        self.last_fired.get(message).copied()
    }

    pub fn tracked_messages(&self) -> usize {
        self.last_fired.len()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_WINDOW)
    }
}
