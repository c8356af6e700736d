//! # Liveness Monitor
//!
//! Remembers when the socket last delivered anything. The heartbeat task
//! compares that against its own clock to decide whether the connection has
//! died without telling us.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct LivenessMonitor {
    last_response: Mutex<Instant>,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self {
            last_response: Mutex::new(Instant::now()),
        }
    }

    /// Records that a frame was received (or a connection was just established).
    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, at: Instant) {
        let mut last = self.last_response.lock().unwrap_or_else(PoisonError::into_inner);
        if at > *last {
            *last = at;
        }
    }

    pub fn last_response(&self) -> Instant {
        *self.last_response.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when nothing has arrived for strictly longer than `threshold` as of `now`.
    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_response()) > threshold
    }
}
