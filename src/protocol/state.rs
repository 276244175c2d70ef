//! Observable session state.

use serde::{Deserialize, Serialize};

/// Peer connection state as reported by the transport engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connectivity checks yet
    #[default]
    New,
    /// Connectivity checks running
    Checking,
    /// A usable path was found
    Connected,
    /// Checks finished with a usable path
    Completed,
    /// No usable path could be found
    Failed,
    /// Connectivity was lost
    Disconnected,
    /// Engine shut down
    Closed,
}

impl ConnectionState {
    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Checking => "checking",
            Self::Connected => "connected",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }

    /// `closed` and `failed` end the relationship with the engine
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// A direct path is usable
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Relay reachability, independent of [`ConnectionState`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalingState {
    /// Relay channel not open
    #[default]
    Disconnected,
    /// Relay channel open
    Connected,
}

impl std::fmt::Display for SignalingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

/// Candidate event counters. Only ever incremented, reset on teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCounters {
    local: u64,
    remote: u64,
}

impl CandidateCounters {
    /// Candidates discovered by the local engine
    pub fn local(&self) -> u64 {
        self.local
    }

    /// Candidates received from the peer
    pub fn remote(&self) -> u64 {
        self.remote
    }

    pub(crate) fn record_local(&mut self) {
        self.local += 1;
    }

    pub(crate) fn record_remote(&mut self) {
        self.remote += 1;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time view of a session, published to observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Relay reachability
    pub signaling_state: SignalingState,
    /// Engine connection state
    pub connection_state: ConnectionState,
    /// A local description was applied
    pub local_description_set: bool,
    /// A remote description was applied
    pub remote_description_set: bool,
    /// Candidate counters
    pub candidates: CandidateCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_names() {
        assert_eq!(ConnectionState::New.to_string(), "new");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::Completed.is_connected());
    }

    #[test]
    fn test_counters() {
        let mut counters = CandidateCounters::default();
        counters.record_local();
        counters.record_local();
        counters.record_remote();
        assert_eq!(counters.local(), 2);
        assert_eq!(counters.remote(), 1);

        counters.reset();
        assert_eq!(counters, CandidateCounters::default());
    }

    #[test]
    fn test_default_snapshot() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.signaling_state, SignalingState::Disconnected);
        assert_eq!(snapshot.connection_state, ConnectionState::New);
        assert!(!snapshot.local_description_set);
        assert!(!snapshot.remote_description_set);
    }
}
