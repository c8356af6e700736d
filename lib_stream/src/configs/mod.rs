//! # Configuration Modules
//!
//! Settings the stream client needs before it can dial: which network to
//! talk to, the access token, and the timing of heartbeats and reconnects.

/// Network selection, endpoint construction and timing knobs for the client.
pub mod config_client;

pub use config_client::{ClientConfig, Network};
