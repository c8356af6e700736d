//! # Wire Envelope
//!
//! Every frame on the socket, in both directions, is a JSON object:
//!
//! ```text
//! {"topic": "collection:*", "event": "item_listed", "payload": {...}, "ref": 7}
//! ```
//!
//! Inbound frames are decoded in two stages. The routing metadata
//! (`topic`, `event`, `ref`) is extracted first; the nested payload is then
//! re-decoded into the schema selected by the event tag. A failure in the
//! second stage leaves the payload empty but never loses the routing
//! metadata, so the frame can still be dispatched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::events::{decode_payload, EventPayload, PHX_REPLY};
use super::topic::Topic;

/// The `payload` object of a frame.
///
/// Application events carry `event_type`, the nested `payload` and a
/// `sent_at` timestamp. Control frames we send carry none of them and
/// serialize to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
}

/// A frame as written to (or read from) the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: Topic,
    pub event: String,
    #[serde(default)]
    pub payload: PayloadEnvelope,
    #[serde(rename = "ref", default, deserialize_with = "deserialize_ref")]
    pub reference: Option<u64>,
}

impl Envelope {
    /// A control frame (`phx_join`, `phx_leave`, `heartbeat`) with an empty payload.
    pub fn control(topic: Topic, event: &str, reference: u64) -> Self {
        Self {
            topic,
            event: event.to_string(),
            payload: PayloadEnvelope::default(),
            reference: Some(reference),
        }
    }

    /// Serializes the frame to its JSON text form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server pushes carry `"ref": null`; replies echo our integer. Some
/// gateways stringify it, so numeric strings are accepted too.
fn deserialize_ref<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("ref is not an unsigned integer: {}", n))),
        Some(Value::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("ref is not numeric: {}", s))),
        Some(other) => Err(serde::de::Error::custom(format!("unexpected ref: {}", other))),
    }
}

/// First decode stage: routing metadata plus the still-opaque payload.
#[derive(Deserialize)]
struct RawFrame {
    topic: Topic,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default, deserialize_with = "deserialize_ref")]
    reference: Option<u64>,
}

/// A fully decoded inbound frame, as handed to subscription handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: Topic,
    pub event: String,
    pub reference: Option<u64>,
    pub event_type: Option<String>,
    pub sent_at: Option<String>,
    /// The tag-selected payload; [`EventPayload::Empty`] for control
    /// replies, unknown tags and payloads that failed to decode.
    pub payload: EventPayload,
    /// The frame's `payload` object exactly as received.
    pub raw_payload: Value,
    /// Why the nested payload could not be decoded, if it could not.
    pub decode_error: Option<String>,
}

impl Message {
    /// Decodes a text frame.
    ///
    /// Fails only when the routing metadata itself is unreadable; payload
    /// problems are reported through [`Message::decode_error`].
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(text)?;

        let mut message = Message {
            topic: raw.topic,
            event: raw.event,
            reference: raw.reference,
            event_type: None,
            sent_at: None,
            payload: EventPayload::Empty,
            raw_payload: Value::Null,
            decode_error: None,
        };

        if message.event == PHX_REPLY {
            message.raw_payload = raw.payload;
            return Ok(message);
        }

        match serde_json::from_value::<PayloadEnvelope>(raw.payload.clone()) {
            Ok(outer) => {
                message.event_type = outer.event_type;
                message.sent_at = outer.sent_at;
                match decode_payload(&message.event, outer.payload.unwrap_or(Value::Null)) {
                    Ok(payload) => message.payload = payload,
                    Err(e) => message.decode_error = Some(e.to_string()),
                }
            }
            Err(e) => message.decode_error = Some(e.to_string()),
        }
        message.raw_payload = raw.payload;

        Ok(message)
    }

    /// `status` of a `phx_reply` frame (`"ok"` / `"error"`).
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != PHX_REPLY {
            return None;
        }
        self.raw_payload.get("status").and_then(Value::as_str)
    }
}
