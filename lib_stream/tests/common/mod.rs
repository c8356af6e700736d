//! In-process Phoenix socket used by the integration tests.
//!
//! Every accepted connection gets an index (0, 1, ...). Frames the client
//! sends are forwarded to the test as `Inbound`, and the test can push
//! frames to, or abruptly drop, any connection.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use lib_stream::{BackoffPolicy, ClientConfig, Network};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Inbound {
    pub conn: usize,
    pub frame: Value,
}

impl Inbound {
    pub fn topic(&self) -> &str {
        self.frame["topic"].as_str().unwrap_or_default()
    }

    pub fn event(&self) -> &str {
        self.frame["event"].as_str().unwrap_or_default()
    }

    pub fn reference(&self) -> u64 {
        self.frame["ref"].as_u64().expect("outbound frames carry an integer ref")
    }
}

enum Command {
    Push(String),
    Drop,
}

pub struct MockServer {
    pub endpoint: String,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Command>>>>,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    /// Starts listening on an ephemeral port. With `auto_reply`, every join
    /// and heartbeat is answered with an `ok` reply.
    pub async fn start(auto_reply: bool) -> Self {
        Self::start_replying_from(if auto_reply { 0 } else { usize::MAX }).await
    }

    /// Like [`MockServer::start`], but connections before `first_conn` never
    /// answer joins or heartbeats.
    pub async fn start_replying_from(first_conn: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Command>>>> = Arc::default();
        let accepted = Arc::new(AtomicUsize::new(0));

        let peers_accept = Arc::clone(&peers);
        let accepted_accept = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                    continue;
                };
                let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
                let conn = {
                    let mut peers = peers_accept.lock().unwrap();
                    peers.push(cmd_tx);
                    peers.len() - 1
                };
                accepted_accept.fetch_add(1, Ordering::SeqCst);
                let auto_reply = conn >= first_conn;
                let inbound_tx = inbound_tx.clone();

                tokio::spawn(async move {
                    let (mut sink, mut stream) = ws.split();
                    loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => match cmd {
                                Some(Command::Push(text)) => {
                                    if sink.send(WsMessage::Text(text.into())).await.is_err() {
                                        return;
                                    }
                                }
                                Some(Command::Drop) | None => return,
                            },
                            msg = stream.next() => match msg {
                                Some(Ok(WsMessage::Text(text))) => {
                                    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
                                    let event = frame["event"].as_str().unwrap_or_default().to_string();
                                    if auto_reply && (event == "phx_join" || event == "heartbeat") {
                                        let reply = json!({
                                            "topic": frame["topic"],
                                            "event": "phx_reply",
                                            "payload": {"status": "ok", "response": {}},
                                            "ref": frame["ref"],
                                        });
                                        let _ = sink.send(WsMessage::Text(reply.to_string().into())).await;
                                    }
                                    let _ = inbound_tx.send(Inbound { conn, frame });
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => return,
                            },
                        }
                    }
                });
            }
        });

        Self {
            endpoint: format!("ws://{}/socket/websocket", addr),
            inbound,
            peers,
            accepted,
        }
    }

    /// A client config pointed at this server with fast backoff.
    pub fn config(&self, heartbeat: Duration) -> ClientConfig {
        ClientConfig::new(Network::Testnet, "test-key")
            .with_endpoint(self.endpoint.clone())
            .with_heartbeat_interval(heartbeat)
            .with_backoff(BackoffPolicy {
                min: Duration::from_millis(20),
                max: Duration::from_millis(100),
                factor: 2.0,
                jitter: false,
            })
    }

    pub async fn next_frame(&mut self) -> Inbound {
        timeout(WAIT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("mock server stopped")
    }

    /// Next frame with the given event, skipping anything else.
    pub async fn next_event(&mut self, event: &str) -> Inbound {
        loop {
            let frame = self.next_frame().await;
            if frame.event() == event {
                return frame;
            }
        }
    }

    /// Collects every frame that arrives within `window`.
    pub async fn drain_for(&mut self, window: Duration) -> Vec<Inbound> {
        let mut frames = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, self.inbound.recv()).await {
            frames.push(frame);
        }
        frames
    }

    pub fn push(&self, conn: usize, frame: Value) {
        let peers = self.peers.lock().unwrap();
        peers[conn].send(Command::Push(frame.to_string())).unwrap();
    }

    /// Drops the socket without a closing handshake.
    pub fn kill(&self, conn: usize) {
        let peers = self.peers.lock().unwrap();
        let _ = peers[conn].send(Command::Drop);
    }

    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

pub fn item_listed(topic: &str, slug: &str, image_url: &str) -> Value {
    json!({
        "topic": topic,
        "event": "item_listed",
        "ref": null,
        "payload": {
            "event_type": "item_listed",
            "sent_at": "2023-03-01T12:00:00.000000+00:00",
            "payload": {
                "event_timestamp": "2023-03-01T12:00:00.000000+00:00",
                "base_price": "150000000000000000",
                "collection": {"slug": slug},
                "expiration_date": "2023-03-08T12:00:00.000000+00:00",
                "is_private": false,
                "listing_date": "2023-03-01T12:00:00.000000+00:00",
                "listing_type": "basic",
                "maker": {"address": "0x1111111111111111111111111111111111111111"},
                "payment_token": {
                    "address": "0x0000000000000000000000000000000000000000",
                    "decimals": 18,
                    "eth_price": 1.0,
                    "name": "Ether",
                    "symbol": "ETH",
                    "usd_price": "1600.50"
                },
                "item": {
                    "chain": {"name": "ethereum"},
                    "metadata": {
                        "name": "Token #1",
                        "image_url": image_url,
                        "animation_url": null,
                        "metadata_url": null
                    },
                    "nft_id": "ethereum/0xabc/1",
                    "permalink": "https://example.invalid/assets/ethereum/0xabc/1"
                },
                "quantity": 1,
                "taker": null
            }
        }
    })
}

pub fn simple_event(topic: &str, event: &str) -> Value {
    json!({
        "topic": topic,
        "event": event,
        "ref": null,
        "payload": {"event_type": event, "sent_at": "2023-03-01T12:00:00Z", "payload": {}}
    })
}
