//! # Error Taxonomy
//!
//! Connection errors are recovered internally by the reconnect path and only
//! reach the caller when the client is shutting down. Configuration errors
//! are fatal and surface before any dial is attempted.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Problems with the client configuration, detected before connecting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No access token was supplied.
    #[error("an API key is required to connect to the stream")]
    MissingToken,

    /// The endpoint URL could not be built.
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// A setting is out of its valid range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Transport failures. All of these are transient from the caller's point
/// of view except [`ConnectionError::Shutdown`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("dial failed: {0}")]
    Dial(#[source] tungstenite::Error),

    #[error("write failed: {0}")]
    Write(#[source] tungstenite::Error),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("read failed: {0}")]
    Read(#[source] tungstenite::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// A write was attempted while no connection is established.
    #[error("websocket: not connected")]
    NotConnected,

    /// Shutdown was requested while waiting on the connection.
    #[error("client is shutting down")]
    Shutdown,
}

/// Errors returned by the public client API.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// `start` was called on a client that is already running.
    #[error("stream client already started")]
    AlreadyStarted,
}
