//! HTTP and WebSocket handlers.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::AppState;

/// Create the relay router
pub fn create_router(state: Arc<AppState>) -> Router {
    let logging = state.config.logging;

    let router = Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/status", get(status))
        // Signaling relay
        .route("/ws", get(relay_socket))
        .with_state(state);

    if logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Seconds since start
    pub uptime_secs: u64,
    /// Connected peers
    pub peers: usize,
    /// Frames relayed since start
    pub relayed_frames: u64,
}

/// Status endpoint
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
        peers: state.peers.count().await,
        relayed_frames: state.relayed_frames(),
    })
}

/// WebSocket upgrade for the relay
async fn relay_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_peer(socket, state))
}

/// Forward every frame from this peer to all other peers until it leaves
async fn handle_peer(socket: WebSocket, state: Arc<AppState>) {
    let id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.peers.register(id, tx).await;
    let peers = state.peers.count().await;
    info!(peer = %id, peers, "Peer joined");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(message @ (Message::Binary(_) | Message::Text(_))) => {
                let reached = state.relay(id, message).await;
                debug!(peer = %id, reached, "frame relayed");
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                warn!(peer = %id, error = %e, "peer socket error");
                break;
            },
        }
    }

    state.peers.remove(&id).await;
    writer.abort();
    info!(peer = %id, "Peer left");
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use super::*;

    fn assert_send_handler<F>(_: fn(WebSocket, Arc<AppState>) -> F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
    }

    #[test]
    fn test_peer_handler_future_is_send() {
        // on_upgrade spawns the handler, so its future must be Send
        assert_send_handler(handle_peer);
    }

    #[tokio::test]
    async fn test_health_check_reports_ok() {
        let response = health_check().await.into_response();
        assert!(response.status().is_success());
    }
}
