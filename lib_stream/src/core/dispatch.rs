//! # Dispatch Loop
//!
//! Reads frames from the current connection, refreshes the liveness clock,
//! decodes and hands each message to its handler. Handlers run inline on
//! this task, so frames are delivered in arrival order.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use crate::codec::events::PHX_REPLY;
use crate::codec::Message;
use crate::core::engine::Engine;
use crate::error::ConnectionError;

impl Engine {
    pub(crate) async fn dispatch_loop(self: Arc<Self>) {
        let mut epochs = self.connection.watch_epoch();

        'connections: loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let Some((epoch, mut reader)) = self.connection.take_reader() else {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    changed = epochs.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };
            epochs.borrow_and_update();
            log::debug!("Dispatch: reading from epoch {}", epoch);

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break 'connections,
                    changed = epochs.changed() => {
                        if changed.is_err() {
                            break 'connections;
                        }
                        if *epochs.borrow_and_update() != epoch {
                            log::debug!("Dispatch: epoch {} was replaced", epoch);
                            continue 'connections;
                        }
                    }
                    frame = reader.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.liveness.touch();
                            self.route(text.as_str());
                        }
                        Some(Ok(WsMessage::Close(close))) => {
                            log::warn!("Connection closed by remote: {:?}", close);
                            self.recover(epoch, "close frame").await;
                            continue 'connections;
                        }
                        Some(Ok(_)) => self.liveness.touch(),
                        Some(Err(e)) => {
                            log::warn!("Quit on {}; start reconnect", ConnectionError::Read(e));
                            self.recover(epoch, "read error").await;
                            continue 'connections;
                        }
                        None => {
                            log::warn!("Connection stream ended; start reconnect");
                            self.recover(epoch, "end of stream").await;
                            continue 'connections;
                        }
                    }
                }
            }
        }
        log::debug!("Dispatch loop stopped");
    }

    /// Decodes one text frame and runs its handler. Returns whether a
    /// handler was invoked.
    pub(crate) fn route(&self, text: &str) -> bool {
        log::trace!("recv msg {}", text);
        let message = match Message::decode(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping undecodable frame: {}", e);
                return false;
            }
        };

        if message.event == PHX_REPLY {
            match message.reply_status() {
                Some("ok") | None => {
                    log::debug!("Reply on {} (ref {:?}): ok", message.topic, message.reference)
                }
                Some(status) => log::warn!(
                    "Reply on {} (ref {:?}): {} {}",
                    message.topic,
                    message.reference,
                    status,
                    message.raw_payload
                ),
            }
            return false;
        }

        if let Some(err) = &message.decode_error {
            log::warn!(
                "Payload of {} on {} could not be decoded: {}",
                message.event,
                message.topic,
                err
            );
        }

        let Some(handler) = self.registry.lookup(&message.topic, &message.event) else {
            log::trace!("No handler for {} on {}", message.event, message.topic);
            return false;
        };
        if let Err(e) = handler(&message) {
            log::warn!("Handler for {} on {} failed: {:#}", message.event, message.topic, e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EventPayload, Topic};
    use crate::configs::{ClientConfig, Network};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    fn engine() -> Engine {
        let config = ClientConfig::new(Network::Mainnet, "k");
        let endpoint = config.endpoint().unwrap();
        Engine::new(config, endpoint, CancellationToken::new())
    }

    const LISTED: &str = r#"{"topic":"collection:azuki","event":"item_listed","ref":null,
        "payload":{"event_type":"item_listed","sent_at":"2023-01-01T00:00:00Z",
        "payload":{"base_price":"1000","collection":{"slug":"azuki"},
        "item":{"nft_id":"ethereum/0xabc/1","metadata":{"image_url":"https://img/1.png"}}}}}"#;

    #[test]
    fn test_route_invokes_matching_handler() {
        let engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.registry.insert(
            Topic::collection("azuki"),
            "item_listed",
            Arc::new(move |msg: &Message| {
                if let EventPayload::ItemListed(listed) = &msg.payload {
                    sink.lock().unwrap().push(listed.base_price.clone());
                }
                Ok(())
            }),
        );

        assert!(engine.route(LISTED));
        assert_eq!(*seen.lock().unwrap(), vec!["1000".to_string()]);
    }

    #[test]
    fn test_route_ignores_replies_and_unregistered_topics() {
        let engine = engine();
        engine
            .registry
            .insert(Topic::collection("azuki"), "*", Arc::new(|_msg: &Message| Ok(())));

        let reply = r#"{"topic":"collection:azuki","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert!(!engine.route(reply));
        assert!(!engine.route(&LISTED.replace("collection:azuki", "collection:doodles")));
        assert!(!engine.route("not json"));
    }

    #[test]
    fn test_handler_error_is_swallowed() {
        let engine = engine();
        engine.registry.insert(
            Topic::collection("azuki"),
            "item_listed",
            Arc::new(|_msg: &Message| Err(anyhow::anyhow!("boom"))),
        );
        assert!(engine.route(LISTED));
        assert!(engine.route(LISTED));
    }
}
