//! Signaling client.
//!
//! Sits between the session orchestrator and a relay channel: typed
//! negotiation messages go out through the [`EnvelopeCodec`], inbound frames
//! come back as [`SignalingEvent`]s on an unbounded channel.
//!
//! ```text
//! Session ──send(msg)──> SignalingClient ──encode──> RelayChannel ──> relay
//! Session <──events───── SignalingClient <──decode── RelayChannel <── relay
//! ```
//!
//! Delivery is best-effort. A message that cannot be encoded, or that is sent
//! while the relay is not open, is logged and counted in [`SignalingStats`],
//! then dropped. Undecodable inbound frames get the same treatment and never
//! affect the channel.
//!
//! [`EnvelopeCodec`]: crate::protocol::EnvelopeCodec

mod client;

pub use client::{SignalingClient, SignalingEvent, SignalingStats};
