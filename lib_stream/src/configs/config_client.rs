//! # Client Configuration
//!
//! Resolves the socket endpoint for the selected network and carries the
//! heartbeat and backoff settings used by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::core::backoff::BackoffPolicy;
use crate::error::ConfigError;

/// Socket endpoint of the production stream.
pub const MAINNET_ENDPOINT: &str = "wss://stream.openseabeta.com/socket/websocket";
/// Socket endpoint of the testnet stream.
pub const TESTNET_ENDPOINT: &str = "wss://testnets-stream.openseabeta.com/socket/websocket";
/// Default interval between heartbeat frames.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Which deployment of the stream service to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_ENDPOINT,
            Network::Testnet => TESTNET_ENDPOINT,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "true" => Ok(Network::Mainnet),
            "testnet" | "test" | "false" => Ok(Network::Testnet),
            other => Err(ConfigError::InvalidSetting(format!("unknown network: {}", other))),
        }
    }
}

/// Everything the [`crate::StreamClient`] needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub network: Network,
    /// Access token, sent as the `token` query parameter.
    pub token: String,
    pub heartbeat_interval: Duration,
    pub backoff: BackoffPolicy,
    /// Replaces the network's endpoint (self-hosted gateways, tests).
    pub endpoint_override: Option<String>,
}

impl ClientConfig {
    pub fn new(network: Network, token: impl Into<String>) -> Self {
        Self {
            network,
            token: token.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            backoff: BackoffPolicy::default(),
            endpoint_override: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Silence longer than this after a heartbeat marks the connection dead.
    pub fn stale_after(&self) -> Duration {
        self.heartbeat_interval * 2
    }

    /// Checks the settings without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidSetting("heartbeat interval must be positive".into()));
        }
        if self.backoff.min.is_zero() || self.backoff.min > self.backoff.max {
            return Err(ConfigError::InvalidSetting(format!(
                "backoff bounds are inverted or zero: min {:?}, max {:?}",
                self.backoff.min, self.backoff.max
            )));
        }
        if !(self.backoff.factor >= 1.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "backoff factor must be at least 1, got {}",
                self.backoff.factor
            )));
        }
        Ok(())
    }

    /// The full socket URL including the token query parameter.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        self.validate()?;
        let base = self.endpoint_override.as_deref().unwrap_or(self.network.endpoint());
        let mut url = Url::parse(base)?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}
