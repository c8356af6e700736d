//! # Engine
//!
//! Shared state behind a [`crate::StreamClient`]: the registry, the
//! sequencer, the liveness clock and the connection, plus the driver state
//! the protocol and dispatch tasks move through. The behaviour lives in
//! `protocol.rs` (joins, heartbeats, recovery) and `dispatch.rs` (the read
//! loop), both as `impl Engine` blocks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::configs::ClientConfig;
use crate::core::connection::ConnectionManager;
use crate::core::liveness::LivenessMonitor;
use crate::core::registry::Registry;
use crate::core::sequencer::Sequencer;

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Not started, or stopped.
    Disconnected,
    /// Waiting for the first dial to succeed.
    Connecting,
    /// Connected, sending `phx_join` frames.
    Joining,
    /// Joined and dispatching.
    Live,
    /// A failure was detected; the old connection is being replaced.
    Reconnecting,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Disconnected => "disconnected",
            DriverState::Connecting => "connecting",
            DriverState::Joining => "joining",
            DriverState::Live => "live",
            DriverState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

pub struct Engine {
    pub(crate) config: ClientConfig,
    pub(crate) registry: Registry,
    pub(crate) sequencer: Sequencer,
    pub(crate) liveness: LivenessMonitor,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) shutdown: CancellationToken,
    /// Serializes join passes so a topic is joined once per connection.
    pub(crate) join_lock: Mutex<()>,
    /// Last ref issued before the current connection's join round began.
    pub(crate) join_round: AtomicU64,
    state: watch::Sender<DriverState>,
    reconnects: AtomicU64,
}

impl Engine {
    pub fn new(config: ClientConfig, endpoint: Url, shutdown: CancellationToken) -> Self {
        let connection = Arc::new(ConnectionManager::new(endpoint, config.backoff, shutdown.clone()));
        let (state, _) = watch::channel(DriverState::Disconnected);
        Self {
            config,
            registry: Registry::new(),
            sequencer: Sequencer::new(),
            liveness: LivenessMonitor::new(),
            connection,
            shutdown,
            join_lock: Mutex::new(()),
            join_round: AtomicU64::new(0),
            state,
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, next: DriverState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            log::debug!("Driver state: {} -> {}", prev, next);
        }
    }

    /// Number of completed reconnects since the client was created.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn count_reconnect(&self) -> u64 {
        self.reconnects.fetch_add(1, Ordering::SeqCst) + 1
    }
}
