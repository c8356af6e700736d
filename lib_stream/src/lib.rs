//! # lib_stream
//!
//! Long-lived client for the marketplace event stream. Keeps one websocket
//! open to a Phoenix-channel service, re-dials with backoff when it breaks,
//! notices silent death through heartbeats and hands typed events to the
//! handlers registered per collection and event kind.

#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod configs;
pub mod core;
pub mod error;

pub use client::{StreamClient, Subscription};
pub use codec::{schema, EventKind, EventPayload, Message, Topic};
pub use configs::{ClientConfig, Network};
pub use crate::core::{BackoffPolicy, DriverState};
pub use error::{ConfigError, ConnectionError, StreamError};
