//! # Sequencer
//!
//! Hands out the `ref` of every outbound frame. The counter lives for the
//! whole client and is never reset by a reconnect.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next reference. The first call returns 1.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently issued reference (0 before any frame was sent).
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
