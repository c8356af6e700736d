//! # Connection Manager
//!
//! Owns the single live socket. A connection is never mutated in place: a
//! reconnect tears the old one down and installs a fresh one under a new
//! *epoch*. Tasks that noticed a failure on epoch `n` ask for a teardown of
//! epoch `n`; if someone else already replaced it, the request is a no-op,
//! so one failure never produces two reconnects.
//!
//! Dialing is serialized by a lock that is held from the teardown until the
//! new connection is installed. Each dial publishes its own one-shot
//! [`Connected`] signal, created fresh for that dial.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex, OwnedMutexGuard};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::codec::Envelope;
use crate::core::backoff::{Backoff, BackoffPolicy};
use crate::error::ConnectionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// Write half of the socket.
pub type WsSink = SplitSink<WsStream, WsMessage>;
/// Read half of the socket.
pub type WsSource = SplitStream<WsStream>;

/// Upper bound for a single frame write before the connection is declared broken.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for the closing handshake of a connection being discarded.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One-shot readiness signal of a single dial. Resolves with the epoch of
/// the new connection, or [`ConnectionError::Shutdown`] if the dial was
/// abandoned.
#[must_use = "a dial is only observable through its Connected signal"]
pub struct Connected(oneshot::Receiver<Result<u64, ConnectionError>>);

impl Connected {
    pub async fn wait(self) -> Result<u64, ConnectionError> {
        self.0.await.unwrap_or(Err(ConnectionError::Shutdown))
    }
}

/// Proof that the caller holds the dial lock with the old connection torn down.
pub struct DialPermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct ConnectionManager {
    endpoint: Url,
    policy: BackoffPolicy,
    /// The single write lock every outbound frame goes through.
    writer: Mutex<Option<WsSink>>,
    /// Read half of the newest connection, waiting for the dispatch loop.
    reader: StdMutex<Option<(u64, WsSource)>>,
    connected: AtomicBool,
    epoch: watch::Sender<u64>,
    dial_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(endpoint: Url, policy: BackoffPolicy, shutdown: CancellationToken) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            endpoint,
            policy,
            writer: Mutex::new(None),
            reader: StdMutex::new(None),
            connected: AtomicBool::new(false),
            epoch,
            dial_lock: Arc::new(Mutex::new(())),
            shutdown,
        }
    }

    /// Epoch of the current connection; 0 before the first successful dial.
    pub fn epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    /// Notifies every time a new connection is installed.
    pub fn watch_epoch(&self) -> watch::Receiver<u64> {
        self.epoch.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Starts dialing in the background once no other dial is in progress.
    pub async fn dial(self: &Arc<Self>) -> Connected {
        let guard = Arc::clone(&self.dial_lock).lock_owned().await;
        self.redial(DialPermit { _guard: guard })
    }

    /// Closes the connection of `observed_epoch` and returns the permit to
    /// redial, or `None` if that connection was already replaced (or we are
    /// shutting down).
    pub async fn teardown(&self, observed_epoch: u64) -> Option<DialPermit> {
        let guard = Arc::clone(&self.dial_lock).lock_owned().await;
        if self.shutdown.is_cancelled() || self.epoch() != observed_epoch {
            return None;
        }
        self.close().await;
        Some(DialPermit { _guard: guard })
    }

    /// Dials with backoff while holding `permit`, publishing a fresh [`Connected`].
    pub fn redial(self: &Arc<Self>, permit: DialPermit) -> Connected {
        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let result = this.dial_with_backoff().await;
            let _ = tx.send(result);
        });
        Connected(rx)
    }

    async fn dial_with_backoff(&self) -> Result<u64, ConnectionError> {
        let mut backoff = Backoff::new(self.policy);
        let shown = redact_token(&self.endpoint);

        loop {
            if self.shutdown.is_cancelled() {
                return Err(ConnectionError::Shutdown);
            }

            let delay = backoff.next_delay();
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(ConnectionError::Shutdown),
                res = connect_async(self.endpoint.as_str()) => match res {
                    Ok((stream, _response)) => {
                        let epoch = self.install(stream).await;
                        log::info!("Dial: connection was successfully established with {} (epoch {})", shown, epoch);
                        return Ok(epoch);
                    }
                    Err(e) => {
                        log::warn!(
                            "Dial: attempt {} failed: {}. Will try again in {:?}",
                            backoff.attempts(),
                            ConnectionError::Dial(e),
                            delay
                        );
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(ConnectionError::Shutdown),
                _ = sleep(delay) => {}
            }
        }
    }

    /// Splits a fresh socket, stores both halves and bumps the epoch.
    async fn install(&self, stream: WsStream) -> u64 {
        let (sink, source) = stream.split();
        let epoch = self.epoch() + 1;
        *self.writer.lock().await = Some(sink);
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some((epoch, source));
        self.connected.store(true, Ordering::SeqCst);
        self.epoch.send_replace(epoch);
        epoch
    }

    /// Hands the read half of the newest connection to the caller.
    pub fn take_reader(&self) -> Option<(u64, WsSource)> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Writes one frame. Serialized with every other writer.
    pub async fn send(&self, frame: &Envelope) -> Result<(), ConnectionError> {
        let text = frame.encode()?;
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ConnectionError::NotConnected)?;
        log::debug!("write msg {}", text);
        match timeout(WRITE_TIMEOUT, sink.send(WsMessage::Text(text.into()))).await {
            Ok(res) => res.map_err(ConnectionError::Write),
            Err(_) => Err(ConnectionError::WriteTimeout(WRITE_TIMEOUT)),
        }
    }

    /// Closes the current connection. Safe to call repeatedly.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let sink = self.writer.lock().await.take();
        drop(self.take_reader());

        if let Some(mut sink) = sink {
            match timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => log::debug!("Connection closed (epoch {})", self.epoch()),
                Ok(Err(e)) => log::debug!("Close handshake failed: {}", e),
                Err(_) => log::debug!("Close handshake timed out after {:?}", CLOSE_TIMEOUT),
            }
        }
    }
}

/// The endpoint with the access token masked, safe for logs.
pub fn redact_token(endpoint: &Url) -> String {
    let mut shown = endpoint.clone();
    let masked: Vec<(String, String)> = endpoint
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "*****".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if masked.is_empty() {
        return shown.to_string();
    }
    shown.query_pairs_mut().clear().extend_pairs(masked);
    shown.to_string()
}
