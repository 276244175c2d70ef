//! Signaling relay server.
//!
//! A WebSocket broadcast hub: every frame a peer sends on `/ws` is forwarded
//! unchanged to every other connected peer. The relay never parses frames.
//!
//! | Route     | Purpose                                  |
//! |-----------|------------------------------------------|
//! | `/ws`     | Relay socket                             |
//! | `/health` | Liveness                                 |
//! | `/status` | Peer count, relayed frames, uptime       |
//!
//! # Example
//!
//! ```rust,ignore
//! use peerlink::server::{serve, ServerConfig};
//!
//! let config = ServerConfig::default().with_port(8080);
//! serve(config).await?;
//! ```

mod config;
mod handlers;
mod state;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check, HealthResponse, StatusResponse};
pub use state::{AppState, PeerRegistry, PeerSender};

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::error::{Result, SignalError};

/// Bind the configured address and run the relay
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    serve_listener(listener, config).await
}

/// Run the relay on an already bound listener
pub async fn serve_listener(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let addr = listener.local_addr()?;
    let app = create_router(Arc::new(AppState::new(config)));

    info!("Relay listening on ws://{}/ws", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| SignalError::Server(e.to_string()))
}
