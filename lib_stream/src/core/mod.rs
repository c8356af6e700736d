//! # Core
//!
//! Connection lifecycle and protocol machinery behind the client:
//!
//! - [`connection`]: dialing with backoff, the write lock, epochs.
//! - [`registry`]: topic and event handlers.
//! - [`sequencer`], [`liveness`], [`backoff`]: small shared primitives.
//! - [`engine`]: the state the background tasks share, with the protocol
//!   driver and the dispatch loop implemented on it.

pub mod backoff;
pub mod connection;
mod dispatch;
pub mod engine;
pub mod liveness;
mod protocol;
pub mod registry;
pub mod sequencer;

pub use backoff::{Backoff, BackoffPolicy};
pub use engine::{DriverState, Engine};
pub use registry::{Handler, Registry};
