//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the binaries)
//!
//! The configuration is built once at startup and handed to constructors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::protocol::EnvelopeCodec;

/// Public STUN servers used when none are configured
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Signaling client configuration
    #[serde(default)]
    pub signaling: SignalingConfig,

    /// Connectivity configuration for the transport engine
    #[serde(default)]
    pub ice: IceConfig,

    /// Relay server configuration
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SignalError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Signaling settings
        if let Some(url) = lookup("PEERLINK_SIGNALING_URL") {
            config.signaling.url = url;
        }
        if let Some(legacy) = lookup("PEERLINK_LEGACY_TYPE_NAMES") {
            config.signaling.legacy_type_names =
                matches!(legacy.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        // ICE settings
        if let Some(servers) = lookup("PEERLINK_ICE_SERVERS") {
            let servers: Vec<String> = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !servers.is_empty() {
                config.ice.servers = servers;
            }
        }

        // Relay settings
        if let Some(host) = lookup("PEERLINK_RELAY_HOST") {
            config.relay.host = host;
        }
        if let Some(port) = lookup("PEERLINK_RELAY_PORT") {
            if let Ok(port) = port.parse() {
                config.relay.port = port;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs from defaults)
    pub fn merge(self, other: Self) -> Self {
        let signaling_default = SignalingConfig::default();
        let ice_default = IceConfig::default();
        let relay_default = RelayConfig::default();

        Self {
            signaling: SignalingConfig {
                url: if other.signaling.url != signaling_default.url {
                    other.signaling.url
                } else {
                    self.signaling.url
                },
                legacy_type_names: other.signaling.legacy_type_names
                    || self.signaling.legacy_type_names,
            },
            ice: if other.ice != ice_default {
                other.ice
            } else {
                self.ice
            },
            relay: RelayConfig {
                host: if other.relay.host != relay_default.host {
                    other.relay.host
                } else {
                    self.relay.host
                },
                port: if other.relay.port != relay_default.port {
                    other.relay.port
                } else {
                    self.relay.port
                },
                max_message_size: if other.relay.max_message_size != relay_default.max_message_size
                {
                    other.relay.max_message_size
                } else {
                    self.relay.max_message_size
                },
            },
        }
    }

    /// Platform config file location (`<config dir>/peerlink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("peerlink").join("config.toml"))
    }

    /// File configuration (explicit path, or the default path if it exists) overlaid with the environment
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let file = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };

        Ok(file.merge(Self::from_env()))
    }
}

/// Signaling client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Relay WebSocket URL
    pub url: String,

    /// Also accept discriminators derived from type names when decoding
    pub legacy_type_names: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            legacy_type_names: false,
        }
    }
}

impl SignalingConfig {
    /// Codec matching this configuration
    pub fn codec(&self) -> EnvelopeCodec {
        EnvelopeCodec::new().with_legacy_type_names(self.legacy_type_names)
    }
}

/// Connectivity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    /// STUN/TURN server URLs
    pub servers: Vec<String>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum WebSocket message size in bytes
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}

impl RelayConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
