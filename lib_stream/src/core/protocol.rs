//! # Protocol Driver
//!
//! Channel joins and leaves, the heartbeat ticker, and recovery from a dead
//! connection. Every outbound frame takes its `ref` from the engine's
//! sequencer and goes through the connection's single write lock.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::codec::events::{HEARTBEAT, PHX_JOIN, PHX_LEAVE};
use crate::codec::{Envelope, Topic};
use crate::core::engine::{DriverState, Engine};
use crate::error::ConnectionError;

/// Topics to join for a registry snapshot. The all-collections topic already
/// covers every collection, so when it is registered it is joined alone.
pub(crate) fn join_targets(registered: Vec<Topic>) -> Vec<Topic> {
    if registered.iter().any(Topic::is_wildcard) {
        return vec![Topic::all_collections()];
    }
    registered
}

impl Engine {
    async fn send_control(&self, topic: Topic, event: &str) -> Result<u64, ConnectionError> {
        let reference = self.sequencer.next();
        self.connection.send(&Envelope::control(topic, event, reference)).await?;
        Ok(reference)
    }

    pub(crate) async fn join(&self, topic: &Topic) -> Result<u64, ConnectionError> {
        let reference = self.send_control(topic.clone(), PHX_JOIN).await?;
        self.registry.record_join_ref(topic, reference);
        log::info!("Start: {} (ref {})", topic, reference);
        Ok(reference)
    }

    /// Starts a join round for a new connection: every topic joined before
    /// this point counts as not joined.
    async fn begin_join_round(&self) {
        let _round = self.join_lock.lock().await;
        self.join_round.store(self.sequencer.current(), Ordering::SeqCst);
    }

    /// Joins every registered topic not yet joined on the current connection.
    pub(crate) async fn join_pending(&self) -> Result<(), ConnectionError> {
        let _round = self.join_lock.lock().await;
        let since = self.join_round.load(Ordering::SeqCst);
        for topic in join_targets(self.registry.topics()) {
            if self.registry.join_ref(&topic).is_some_and(|reference| reference > since) {
                continue;
            }
            self.join(&topic).await?;
        }
        Ok(())
    }

    pub(crate) async fn leave(&self, topic: &Topic) -> Result<(), ConnectionError> {
        let reference = self.send_control(topic.clone(), PHX_LEAVE).await?;
        log::info!("Leave: {} (ref {})", topic, reference);
        Ok(())
    }

    /// Joins topics registered while the client is live. A topic the
    /// all-collections join already covers is not joined again.
    pub(crate) async fn join_late(&self) {
        if self.state() != DriverState::Live || !self.connection.is_connected() {
            return;
        }
        let epoch = self.connection.epoch();
        if let Err(e) = self.join_pending().await {
            log::warn!("Late join failed: {}", e);
            self.recover(epoch, "join write failed").await;
        }
    }

    /// Sends `phx_leave` for `topic` and drops it from the registry.
    pub(crate) async fn unsubscribe(&self, topic: &Topic) {
        if !self.registry.contains(topic) {
            return;
        }
        let epoch = self.connection.epoch();
        let sent = if self.connection.is_connected() {
            self.leave(topic).await
        } else {
            log::debug!("Leave: {} skipped, not connected", topic);
            Ok(())
        };
        self.registry.remove(topic);

        if let Err(e) = sent {
            log::warn!("Failed to leave {}: {}", topic, e);
            self.recover(epoch, "leave write failed").await;
        }
    }

    /// Runs once a dial has installed a new connection.
    pub(crate) async fn on_connected(&self) -> Result<(), ConnectionError> {
        self.liveness.touch();
        self.set_state(DriverState::Joining);
        self.begin_join_round().await;
        self.join_pending().await?;
        self.set_state(DriverState::Live);
        // Topics subscribed while the first pass was running.
        self.join_pending().await
    }

    /// Replaces the connection of `epoch` with a fresh one and re-joins.
    ///
    /// A no-op when that connection was already replaced, so every task
    /// that noticed the same failure may call this.
    pub(crate) async fn recover(&self, mut epoch: u64, reason: &str) {
        loop {
            let Some(permit) = self.connection.teardown(epoch).await else {
                log::debug!("Reconnect for epoch {} skipped: {}", epoch, reason);
                return;
            };
            self.set_state(DriverState::Reconnecting);
            log::warn!("Reconnecting after {} (epoch {})", reason, epoch);

            let connected = self.connection.redial(permit);
            self.set_state(DriverState::Connecting);
            match connected.wait().await {
                Ok(next) => {
                    let total = self.count_reconnect();
                    log::info!("Reconnected (epoch {}, {} reconnects so far)", next, total);
                    match self.on_connected().await {
                        Ok(()) => return,
                        Err(e) => {
                            log::warn!("Re-join failed: {}", e);
                            epoch = next;
                        }
                    }
                }
                Err(e) => {
                    log::info!("Reconnect abandoned: {}", e);
                    return;
                }
            }
        }
    }

    async fn heartbeat(&self) -> Result<(), ConnectionError> {
        let reference = self.send_control(Topic::phoenix(), HEARTBEAT).await?;
        log::trace!("Heartbeat sent (ref {})", reference);
        Ok(())
    }

    /// Sends a heartbeat every interval while live and reconnects when the
    /// server has gone quiet for longer than the stale threshold.
    pub(crate) async fn heartbeat_loop(self: Arc<Self>) {
        let period = self.config.heartbeat_interval;
        let stale_after = self.config.stale_after();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.state() != DriverState::Live {
                continue;
            }

            let epoch = self.connection.epoch();
            if let Err(e) = self.heartbeat().await {
                log::warn!("Heartbeat failed: {}", e);
                self.recover(epoch, "heartbeat write failed").await;
                ticker.reset();
                continue;
            }

            let now = Instant::now();
            if self.liveness.is_stale(now, stale_after) {
                log::warn!(
                    "Heartbeat response timeout: nothing received for {:?}",
                    now.saturating_duration_since(self.liveness.last_response())
                );
                self.recover(epoch, "heartbeat response timeout").await;
                ticker.reset();
            }
        }
        log::debug!("Heartbeat loop stopped");
    }
}
