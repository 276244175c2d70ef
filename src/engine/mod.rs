//! Transport engine abstraction.
//!
//! The transport engine is the peer-to-peer stack that produces and consumes
//! session descriptions, gathers candidates and moves the actual data. The
//! session orchestrator drives it through [`TransportEngine`] and receives its
//! callbacks as [`EngineEvent`]s on the sender handed to the engine when it is
//! built.
//!
//! | Engine                 | Backend                                  |
//! |------------------------|------------------------------------------|
//! | `MockEngine`           | Scripted, in-memory (tests, simulations) |
//! | `PeerConnectionEngine` | `webrtc` crate (feature `webrtc`)        |

pub mod mock;
#[cfg(feature = "webrtc")]
mod peer_connection;

pub use mock::MockEngine;
#[cfg(feature = "webrtc")]
pub use peer_connection::PeerConnectionEngine;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{ConnectionState, IceCandidate, SessionDescription};

/// Callbacks from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine discovered a local candidate
    LocalCandidate(IceCandidate),
    /// The engine's connection state changed
    ConnectionStateChanged(ConnectionState),
    /// Data arrived on the peer data channel
    DataReceived(Bytes),
}

/// Sender half engines use to report [`EngineEvent`]s
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiver half consumed by the session orchestrator
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the event channel for an engine
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Peer-to-peer engine operations used during negotiation.
///
/// Every operation completes asynchronously. Engines own transition legality
/// and candidate queueing; callers forward remote candidates in receipt order.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Produce a local offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Produce a local answer to the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a description produced by this engine
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    /// Apply the peer's description. May be rejected.
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Add a candidate received from the peer
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Send application data to the peer over the data channel
    async fn send_data(&self, data: Bytes) -> Result<()>;

    /// Shut the engine down
    async fn close(&self) -> Result<()>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}
