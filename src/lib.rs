//! # PeerLink - Signaling for Peer-to-Peer Sessions
//!
//! Two peers establish a direct connection by exchanging session descriptions
//! and connectivity candidates through a relay, then track the connection's
//! lifecycle. PeerLink implements that signaling layer: the wire envelope, the
//! relay channel, the signaling client and the negotiation state machine.
//!
//! ## Architecture
//!
//! ```text
//!                    Session (state machine, watch<SessionSnapshot>)
//!                   /                                               \
//!   TransportEngine (offer/answer,                    SignalingClient (typed messages)
//!   candidates, data channel)                                        |
//!                                                              EnvelopeCodec (JSON)
//!                                                                    |
//!                                                              RelayChannel (bytes)
//!                                                                    |
//!                                                                  relay
//! ```
//!
//! Engine events flow up into the session, out through the signaling client,
//! the codec and the relay channel; relay traffic takes the mirror path.
//!
//! ## Quick Start
//!
//! ### Encode and decode negotiation messages
//!
//! ```rust
//! use peerlink::{EnvelopeCodec, NegotiationMessage, SessionDescription};
//!
//! let codec = EnvelopeCodec::new();
//! let message = NegotiationMessage::from(SessionDescription::offer("v=0\r\n"));
//!
//! let wire = codec.encode(&message).unwrap();
//! assert_eq!(codec.decode(&wire).unwrap(), message);
//! ```
//!
//! ### Negotiate a session
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peerlink::{EnvelopeCodec, Session, SignalingClient, WebSocketRelay};
//! use peerlink::engine::MockEngine;
//!
//! let (engine, engine_events) = MockEngine::new("alice");
//! let relay = Arc::new(WebSocketRelay::new("ws://127.0.0.1:8080/ws"));
//! let (signaling, signaling_events) = SignalingClient::new(relay, EnvelopeCodec::new());
//!
//! let session = Arc::new(Session::new(Arc::new(engine), signaling));
//! session.spawn(signaling_events, engine_events);
//! session.connect();
//!
//! // once connected to the relay
//! session.make_offer().await?;
//! ```
//!
//! ### Run a relay
//!
//! ```rust,ignore
//! use peerlink::server::{serve, ServerConfig};
//!
//! serve(ServerConfig::default().with_port(8080)).await?;
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Messages, envelope codec, session state machine
//! - [`relay`]: Relay channel trait with WebSocket and in-memory channels
//! - [`signaling`]: Signaling client
//! - [`engine`]: Transport engine trait and engines
//! - [`server`]: Relay server (Axum-based)
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod signaling;

// Re-exports for convenience
pub use config::Config;
pub use engine::{EngineEvent, TransportEngine};
pub use error::{DecodeError, Result, SignalError};
pub use protocol::{
    CandidateCounters, ConnectionState, EnvelopeCodec, IceCandidate, NegotiationMessage,
    SdpType, Session, SessionDescription, SessionSnapshot, SignalingState,
};
pub use relay::{ChannelState, MemoryHub, RelayChannel, RelayListener, WebSocketRelay};
pub use server::ServerConfig;
pub use signaling::{SignalingClient, SignalingEvent, SignalingStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Signaling protocol version
pub const PROTOCOL_VERSION: &str = protocol::PROTOCOL_VERSION;
