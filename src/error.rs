//! PeerLink error types.
//!
//! # Propagation Policy
//!
//! Signaling is best-effort:
//!
//! - **Codec and send failures** (`Encode`, `Decode`, `ChannelClosed`) are local.
//!   The signaling client logs them and drops the message; they never abort a session.
//! - **Engine failures** (`RemoteDescriptionRejected`, `EngineOperationFailed`) are
//!   returned through the async completion of the operation that triggered them and
//!   leave the session flags untouched, so the caller decides whether to retry.
//! - **Relay closure** is a signaling-state transition, not an error.
//!
//! Nothing here is fatal to the process.

use thiserror::Error;

/// Reasons an inbound envelope could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The `type` discriminator matched no known message kind.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The envelope or its payload is missing fields or has mistyped ones.
    #[error("Malformed envelope: {0}")]
    Malformed(String),
}

/// PeerLink errors.
#[derive(Error, Debug)]
pub enum SignalError {
    /// Inbound envelope could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The relay channel is not open.
    #[error("Relay channel closed")]
    ChannelClosed,

    /// The transport engine refused a remote session description.
    #[error("Remote description rejected: {0}")]
    RemoteDescriptionRejected(String),

    /// A transport engine operation failed.
    #[error("Engine operation failed: {0}")]
    EngineOperationFailed(String),

    /// An offer or answer is already being produced.
    #[error("Negotiation already in progress")]
    NegotiationInProgress,

    /// The session was torn down or the engine reached a terminal state.
    #[error("Session closed")]
    SessionClosed,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Relay server error.
    #[error("Server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PeerLink operations
pub type Result<T> = std::result::Result<T, SignalError>;

impl From<toml::de::Error> for SignalError {
    fn from(err: toml::de::Error) -> Self {
        SignalError::Config(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SignalError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SignalError::Network(err.to_string())
    }
}
