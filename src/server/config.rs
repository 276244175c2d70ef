//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::RelayConfig;
use crate::error::{Result, SignalError};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Maximum WebSocket message size (bytes)
    pub max_message_size: usize,
    /// Enable request logging
    pub logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            max_message_size: 1024 * 1024, // 1MB
            logging: true,
        }
    }
}

impl ServerConfig {
    /// Build from the `[relay]` section of the configuration file
    pub fn from_relay(relay: &RelayConfig) -> Result<Self> {
        let addr = relay
            .listen_addr()
            .parse()
            .map_err(|e| SignalError::Config(format!("Invalid relay address: {e}")))?;

        Ok(Self {
            addr,
            max_message_size: relay.max_message_size,
            ..Self::default()
        })
    }

    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        self.addr.set_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        self
    }

    /// Set address directly
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set max message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Disable logging
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }
}
