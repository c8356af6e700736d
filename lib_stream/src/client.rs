//! # Stream Client
//!
//! The caller-facing handle. Register handlers with [`StreamClient::subscribe`],
//! then [`StreamClient::start`] dials, joins every registered topic and
//! spawns the heartbeat and dispatch tasks. [`StreamClient::stop`] leaves all
//! topics and tears everything down; a stopped client cannot be restarted.
//!
//! ```no_run
//! use lib_stream::{ClientConfig, EventKind, EventPayload, Network, StreamClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = StreamClient::new(ClientConfig::new(Network::Mainnet, "my-api-key"))?;
//! let _listed = client.subscribe("*", EventKind::ItemListed, |msg| {
//!     if let EventPayload::ItemListed(listed) = &msg.payload {
//!         println!("{:?}", listed.item.metadata.image_url);
//!     }
//!     Ok(())
//! });
//! client.start().await?;
//! tokio::signal::ctrl_c().await?;
//! client.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{EventKind, Message, Topic};
use crate::configs::ClientConfig;
use crate::core::engine::{DriverState, Engine};
use crate::error::{ConfigError, StreamError};

pub struct StreamClient {
    engine: Arc<Engine>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamClient {
    /// Validates `config` and builds an idle client.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// Like [`StreamClient::new`], but cancelling `shutdown` (e.g. from a
    /// signal handler) aborts any dial in progress and stops the tasks.
    pub fn with_shutdown(config: ClientConfig, shutdown: CancellationToken) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let engine = Engine::new(config, endpoint, shutdown.child_token());
        Ok(Self {
            engine: Arc::new(engine),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Registers `handler` for `event` on the collection `slug` (`"*"` for
    /// every collection). Re-subscribing the same pair replaces the handler.
    ///
    /// Topics added while the client is live are joined right away.
    pub fn subscribe<F>(&self, slug: &str, event: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let topic = Topic::collection(slug);
        let is_new = self.engine.registry.insert(topic.clone(), event.as_str(), Arc::new(handler));
        log::debug!("Subscribed {} on {}", event, topic);

        if is_new && self.engine.state() == DriverState::Live {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let engine = Arc::clone(&self.engine);
                runtime.spawn(async move { engine.join_late().await });
            }
        }

        Subscription {
            engine: Arc::clone(&self.engine),
            topic,
        }
    }

    /// Leaves the collection's channel and drops every handler on it.
    pub async fn unsubscribe(&self, slug: &str) {
        self.engine.unsubscribe(&Topic::collection(slug)).await;
    }

    /// Connects, joins the registered topics and starts the background
    /// tasks. Returns once the first dial has succeeded.
    pub async fn start(&self) -> Result<(), StreamError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyStarted);
        }
        let engine = &self.engine;

        engine.set_state(DriverState::Connecting);
        let epoch = match engine.connection.dial().await.wait().await {
            Ok(epoch) => epoch,
            Err(e) => {
                engine.set_state(DriverState::Disconnected);
                return Err(e.into());
            }
        };

        let mut tasks = Vec::with_capacity(3);
        if let Err(e) = engine.on_connected().await {
            log::warn!("Initial join failed: {}", e);
            let engine = Arc::clone(engine);
            tasks.push(tokio::spawn(async move {
                engine.recover(epoch, "join write failed").await
            }));
        }
        tasks.push(tokio::spawn(Arc::clone(engine).heartbeat_loop()));
        tasks.push(tokio::spawn(Arc::clone(engine).dispatch_loop()));
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).extend(tasks);

        log::info!("Stream client started with {} topic(s)", engine.registry.len());
        Ok(())
    }

    /// Leaves every topic, closes the connection and waits for the
    /// background tasks to finish.
    pub async fn stop(&self) {
        let engine = &self.engine;

        if engine.connection.is_connected() {
            for topic in engine.registry.topics() {
                if let Err(e) = engine.leave(&topic).await {
                    log::warn!("Failed to leave {}: {}", topic, e);
                    break;
                }
            }
        }
        engine.registry.drain();
        engine.shutdown.cancel();
        engine.connection.close().await;

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("Background task ended abnormally: {}", e);
            }
        }
        engine.set_state(DriverState::Disconnected);
        log::info!("Stream client stopped");
    }

    pub fn state(&self) -> DriverState {
        self.engine.state()
    }

    /// Snapshot of the registered topics.
    pub fn topics(&self) -> Vec<Topic> {
        self.engine.registry.topics()
    }

    /// Completed reconnects since the client was created.
    pub fn reconnects(&self) -> u64 {
        self.engine.reconnects()
    }

    /// Reference the topic of `slug` was last joined with.
    pub fn join_ref(&self, slug: &str) -> Option<u64> {
        self.engine.registry.join_ref(&Topic::collection(slug))
    }

    /// Resolves when a state other than the current one is reached.
    pub async fn state_changed(&self, from: DriverState) -> DriverState {
        let mut states = self.engine.watch_state();
        let reached = match states.wait_for(|state| *state != from).await {
            Ok(state) => *state,
            Err(_) => self.engine.state(),
        };
        reached
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.engine.shutdown.cancel();
    }
}

/// Returned by [`StreamClient::subscribe`]; leaves the whole topic when used.
#[must_use = "dropping a Subscription keeps the handler registered"]
pub struct Subscription {
    engine: Arc<Engine>,
    topic: Topic,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Leaves the channel and removes every handler on the topic, not just
    /// the one this subscription registered.
    pub async fn unsubscribe(self) {
        self.engine.unsubscribe(&self.topic).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::Network;

    #[test]
    fn test_missing_token_fails_before_dial() {
        let err = StreamClient::new(ClientConfig::new(Network::Mainnet, "")).err().unwrap();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[tokio::test]
    async fn test_subscribe_before_start_only_registers() {
        let client = StreamClient::new(ClientConfig::new(Network::Testnet, "k")).unwrap();
        let sub = client.subscribe("azuki", EventKind::ItemSold, |_msg| Ok(()));
        let _ = client.subscribe("azuki", EventKind::All, |_msg| Ok(()));

        assert_eq!(sub.topic().as_str(), "collection:azuki");
        assert_eq!(client.topics(), vec![Topic::collection("azuki")]);
        assert_eq!(client.state(), DriverState::Disconnected);

        // Not connected: the topic is dropped without a leave frame.
        sub.unsubscribe().await;
        assert!(client.topics().is_empty());
        assert_eq!(client.reconnects(), 0);
    }
}
