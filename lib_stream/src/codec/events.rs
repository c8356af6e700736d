//! # Event Kinds and the Payload Decode Table
//!
//! The `event` field of a frame selects which concrete schema the nested
//! payload is decoded into. The mapping is a closed table: supporting a new
//! kind means adding a row to [`DECODERS`] and a variant to [`EventPayload`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::schema::{
    CollectionOffer, ItemCancelled, ItemListed, ItemMetadataUpdated, ItemOffer, ItemSold,
    ItemTransferred, TraitOffer,
};

/// Control event: join a channel.
pub const PHX_JOIN: &str = "phx_join";
/// Control event: leave a channel.
pub const PHX_LEAVE: &str = "phx_leave";
/// Control event: server acknowledgement of a join/leave/heartbeat.
pub const PHX_REPLY: &str = "phx_reply";
/// Control event: socket keep-alive.
pub const HEARTBEAT: &str = "heartbeat";
/// Event key matching any event on a topic.
pub const ANY_EVENT: &str = "*";

/// Application event kinds a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ItemListed,
    ItemSold,
    ItemTransferred,
    ItemMetadataUpdated,
    ItemCancelled,
    ItemReceivedOffer,
    ItemReceivedBid,
    CollectionOffer,
    TraitOffer,
    /// Matches every event on the topic.
    All,
}

impl EventKind {
    /// Every kind, in wire-tag order.
    pub const ALL_KINDS: [EventKind; 10] = [
        EventKind::ItemListed,
        EventKind::ItemSold,
        EventKind::ItemTransferred,
        EventKind::ItemMetadataUpdated,
        EventKind::ItemCancelled,
        EventKind::ItemReceivedOffer,
        EventKind::ItemReceivedBid,
        EventKind::CollectionOffer,
        EventKind::TraitOffer,
        EventKind::All,
    ];

    /// The wire tag for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::ItemListed => "item_listed",
            EventKind::ItemSold => "item_sold",
            EventKind::ItemTransferred => "item_transferred",
            EventKind::ItemMetadataUpdated => "item_metadata_updated",
            EventKind::ItemCancelled => "item_cancelled",
            EventKind::ItemReceivedOffer => "item_received_offer",
            EventKind::ItemReceivedBid => "item_received_bid",
            EventKind::CollectionOffer => "collection_offer",
            EventKind::TraitOffer => "trait_offer",
            EventKind::All => ANY_EVENT,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known event tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// A decoded application payload, selected by the frame's event tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventPayload {
    ItemListed(ItemListed),
    ItemSold(ItemSold),
    ItemTransferred(ItemTransferred),
    ItemMetadataUpdated(ItemMetadataUpdated),
    ItemCancelled(ItemCancelled),
    ItemReceivedOffer(ItemOffer),
    ItemReceivedBid(ItemOffer),
    CollectionOffer(CollectionOffer),
    TraitOffer(TraitOffer),
    /// Control replies, unknown tags, and payloads that failed to decode.
    #[default]
    Empty,
}

impl EventPayload {
    pub fn is_empty(&self) -> bool {
        matches!(self, EventPayload::Empty)
    }
}

type Decoder = fn(Value) -> Result<EventPayload, serde_json::Error>;

fn decode<T: DeserializeOwned>(
    raw: Value,
    wrap: fn(T) -> EventPayload,
) -> Result<EventPayload, serde_json::Error> {
    serde_json::from_value(raw).map(wrap)
}

/// Tag → decoder. `item_metadata_update` is an older spelling still seen on the wire.
pub const DECODERS: &[(&str, Decoder)] = &[
    ("item_listed", |raw| decode(raw, EventPayload::ItemListed)),
    ("item_sold", |raw| decode(raw, EventPayload::ItemSold)),
    ("item_transferred", |raw| decode(raw, EventPayload::ItemTransferred)),
    ("item_metadata_updated", |raw| decode(raw, EventPayload::ItemMetadataUpdated)),
    ("item_metadata_update", |raw| decode(raw, EventPayload::ItemMetadataUpdated)),
    ("item_cancelled", |raw| decode(raw, EventPayload::ItemCancelled)),
    ("item_received_offer", |raw| decode(raw, EventPayload::ItemReceivedOffer)),
    ("item_received_bid", |raw| decode(raw, EventPayload::ItemReceivedBid)),
    ("collection_offer", |raw| decode(raw, EventPayload::CollectionOffer)),
    ("trait_offer", |raw| decode(raw, EventPayload::TraitOffer)),
];

/// Decodes a nested payload according to the event tag.
///
/// Tags without a table entry (including `phx_reply`) decode to
/// [`EventPayload::Empty`] without error.
pub fn decode_payload(event: &str, raw: Value) -> Result<EventPayload, serde_json::Error> {
    match DECODERS.iter().find(|(tag, _)| *tag == event) {
        Some((_, decoder)) => decoder(raw),
        None => Ok(EventPayload::Empty),
    }
}
