//! Configuration management for HashLedger

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
    /// Peers dialed at startup, as `ws://host:port` URLs.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// How often the node logs its chain height, e.g. "10s" or "1m".
    #[serde(default = "default_status_interval")]
    pub status_interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            p2p_port: default_p2p_port(),
            bootstrap_peers: Vec::new(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NodeConfig {
    pub fn status_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.status_interval).map_err(|e| {
            ChainError::ConfigError(format!(
                "node.status_interval `{}` is not a duration: {}",
                self.status_interval, e
            ))
        })
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| ChainError::ConfigError(format!("logging.level `{}` is not a log level", self.level)))
    }
}

impl Config {
    /// Applies command-line overrides on top of the file values. Extra peers
    /// are added after the configured bootstrap list.
    pub fn apply_overrides(&mut self, http_port: Option<u16>, p2p_port: Option<u16>, peers: Vec<String>) {
        if let Some(port) = http_port {
            self.network.http_port = port;
        }
        if let Some(port) = p2p_port {
            self.network.p2p_port = port;
        }
        self.network.bootstrap_peers.extend(peers);
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.http_port == 0 || self.network.p2p_port == 0 {
            return Err(ChainError::ConfigError("network ports must be non-zero".to_string()));
        }

        if self.network.http_port == self.network.p2p_port {
            return Err(ChainError::ConfigError(format!(
                "network.http_port and network.p2p_port must differ (both {})",
                self.network.http_port
            )));
        }

        for peer in &self.network.bootstrap_peers {
            if !peer.starts_with("ws://") {
                return Err(ChainError::ConfigError(format!(
                    "bootstrap peer `{}` must be a ws:// URL",
                    peer
                )));
            }
        }

        self.node.status_interval()?;
        self.logging.level()?;
        Ok(())
    }
}

/// Loads `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let config = read_config_from(path)?;
    config.validate()?;
    Ok(config)
}

/// Parses the file without validating it, for callers that still layer
/// overrides on top.
pub fn read_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    Ok(toml::from_str(&config_str)?)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_p2p_port() -> u16 {
    3001
}

fn default_status_interval() -> String {
    "10s".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
