//! Signaling protocol and session negotiation.
//!
//! Two peers negotiate a direct connection by exchanging session descriptions
//! and connectivity candidates through a relay. This module holds the message
//! types, the wire envelope, and the [`Session`] state machine that drives a
//! [`TransportEngine`](crate::engine::TransportEngine) from relay traffic.
//!
//! # Message Flow
//!
//! ```text
//! Peer A                          Relay                          Peer B
//!    |                              |                               |
//!    |-- sessionDescription ------->|---- sessionDescription ------>|  offer
//!    |                              |                               |
//!    |<----- sessionDescription ----|<--- sessionDescription -------|  answer
//!    |                              |                               |
//!    |-- candidate (xN) ----------->|---- candidate (xN) ---------->|
//!    |<----- candidate (xN) --------|<--- candidate (xN) -----------|
//!    |                              |                               |
//!    |<=================== direct peer connection =================>|
//! ```
//!
//! # Wire Envelope
//!
//! ```json
//! { "type": "sessionDescription", "payload": { "sdp": "v=0...", "type": "offer" } }
//! { "type": "candidate", "payload": { "sdp": "candidate:...", "sdpMLineIndex": 0, "sdpMid": "0" } }
//! ```
//!
//! | Discriminator        | Payload                                  |
//! |----------------------|------------------------------------------|
//! | `sessionDescription` | `sdp`, `type` (`offer`/`prAnswer`/`answer`) |
//! | `candidate`          | `sdp`, `sdpMLineIndex`, `sdpMid` (nullable) |
//!
//! # Connection States
//!
//! | State          | Meaning                                  | Terminal |
//! |----------------|------------------------------------------|----------|
//! | `new`          | Nothing negotiated yet                   |          |
//! | `checking`     | Engine is probing candidate pairs        |          |
//! | `connected`    | A usable pair was found                  |          |
//! | `completed`    | Candidate checks finished                |          |
//! | `disconnected` | Connectivity lost, may recover           |          |
//! | `failed`       | No usable pair                           | yes      |
//! | `closed`       | Engine shut down                         | yes      |
//!
//! Connection states come from the engine and are taken as reported. The
//! signaling state (relay reachability) is tracked separately.

mod codec;
mod message;
mod session;
mod state;

pub use codec::EnvelopeCodec;
pub use message::{IceCandidate, NegotiationMessage, SdpType, SessionDescription};
pub use session::Session;
pub use state::{CandidateCounters, ConnectionState, SessionSnapshot, SignalingState};

/// Protocol version
pub const PROTOCOL_VERSION: &str = "1.0";

/// Wire discriminator for session descriptions
pub const TYPE_SESSION_DESCRIPTION: &str = "sessionDescription";

/// Wire discriminator for candidates
pub const TYPE_CANDIDATE: &str = "candidate";

/// Session description discriminator used by peers that derive it from type names
pub const LEGACY_TYPE_SESSION_DESCRIPTION: &str = "SessionDescription";

/// Candidate discriminator used by peers that derive it from type names
pub const LEGACY_TYPE_CANDIDATE: &str = "IceCandidate";
