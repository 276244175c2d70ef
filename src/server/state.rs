//! Server state and peer registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::config::ServerConfig;

/// Outbound queue of one connected peer
pub type PeerSender = mpsc::UnboundedSender<Message>;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Connected peers
    pub peers: PeerRegistry,
    /// Frames relayed since start
    relayed: AtomicU64,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            peers: PeerRegistry::new(),
            relayed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Frames received from peers and relayed
    pub fn relayed_frames(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    /// Relay a frame from `from` to every other peer
    pub async fn relay(&self, from: Uuid, message: Message) -> usize {
        self.relayed.fetch_add(1, Ordering::Relaxed);
        self.peers.broadcast(from, message).await
    }
}

/// Connected peers by ID
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<Uuid, PeerSender>>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer
    pub async fn register(&self, id: Uuid, sender: PeerSender) {
        self.peers.write().await.insert(id, sender);
    }

    /// Remove a peer
    pub async fn remove(&self, id: &Uuid) {
        self.peers.write().await.remove(id);
    }

    /// Get peer count
    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Queue a message for every peer except `from`. Returns the number of peers reached.
    pub async fn broadcast(&self, from: Uuid, message: Message) -> usize {
        let peers = self.peers.read().await;
        peers
            .iter()
            .filter(|(id, _)| **id != from)
            .filter(|(_, sender)| sender.send(message.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = PeerRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        registry.register(id, tx).await;
        assert_eq!(registry.count().await, 1);

        registry.remove(&id).await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let state = AppState::new(ServerConfig::default());
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (c_tx, c_rx) = mpsc::unbounded_channel();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        state.peers.register(a, a_tx).await;
        state.peers.register(b, b_tx).await;
        state.peers.register(c, c_tx).await;
        drop(c_rx);

        let reached = state.relay(a, Message::Text("hello".into())).await;
        assert_eq!(reached, 1);
        assert!(a_rx.try_recv().is_err());
        assert!(matches!(b_rx.try_recv(), Ok(Message::Text(t)) if t == "hello"));
        assert_eq!(state.relayed_frames(), 1);
    }
}
