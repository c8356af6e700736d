use clap::Parser;
use lib_stream::{BackoffPolicy, ClientConfig, Network};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Marketplace event stream listener", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long = "key", env = "STREAM_API_KEY", help = "API key used as the stream access token.")]
    pub api_key: Option<String>,

    #[clap(long = "net", env = "STREAM_NETWORK", help = "Network to connect to (mainnet, testnet).")]
    pub network: Option<Network>,

    #[clap(long, env = "STREAM_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "STREAM_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "STREAM_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "STREAM_URL", help = "Overrides the network's socket URL.")]
    pub stream_url: Option<String>,

    #[clap(long, env = "STREAM_HEARTBEAT_SECONDS", help = "Seconds between heartbeat frames.")]
    pub heartbeat_seconds: Option<u64>,

    #[clap(long, env = "STREAM_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "STREAM_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            api_key: other.api_key.or(self.api_key),
            network: other.network.or(self.network),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            stream_url: other.stream_url.or(self.stream_url),
            heartbeat_seconds: other.heartbeat_seconds.or(self.heartbeat_seconds),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
        }
    }

    fn defaults() -> Config {
        Config {
            network: Some(Network::Mainnet),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            heartbeat_seconds: Some(20),
            reconnect_base_delay_ms: Some(100),
            reconnect_max_delay_ms: Some(2000),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Builds the library configuration. A missing key surfaces here as
    /// the library's `MissingToken` error.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut client = ClientConfig::new(
            self.network.unwrap_or_default(),
            self.api_key.clone().unwrap_or_default(),
        );
        if let Some(seconds) = self.heartbeat_seconds {
            client = client.with_heartbeat_interval(Duration::from_secs(seconds));
        }
        let defaults = BackoffPolicy::default();
        client = client.with_backoff(BackoffPolicy {
            min: self.reconnect_base_delay_ms.map(Duration::from_millis).unwrap_or(defaults.min),
            max: self.reconnect_max_delay_ms.map(Duration::from_millis).unwrap_or(defaults.max),
            ..defaults
        });
        if let Some(url) = &self.stream_url {
            client = client.with_endpoint(url.clone());
        }
        client.validate()?;
        Ok(client)
    }
}

/// Reads a JSON config file, logging (not failing) when it is unusable.
fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                log::warn!("Failed to parse config file: {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file: {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers defaults, then the config file, then environment/CLI values.
pub fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_stream.conf"));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

pub fn load_config() -> Config {
    resolve(Config::parse())
}
