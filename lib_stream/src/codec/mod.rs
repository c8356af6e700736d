//! # Message Codec
//!
//! Wire framing for the Phoenix-channel protocol spoken by the stream
//! service, plus the closed table that turns a tagged payload into one of
//! the known event schemas.

pub mod envelope;
pub mod events;
pub mod schema;
pub mod topic;

pub use envelope::{Envelope, Message, PayloadEnvelope};
pub use events::{decode_payload, EventKind, EventPayload, UnknownEventKind};
pub use topic::Topic;
