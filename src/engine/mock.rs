//! Scripted transport engine for tests and simulations.
//!
//! Behaves like a well-mannered peer connection:
//!
//! 1. Once both a local and a remote description are applied, it reports its
//!    local candidates and moves to `checking`.
//! 2. Once it also holds at least one remote candidate, it moves to `connected`.
//! 3. `close()` moves it to `closed`.
//!
//! Remote candidates arriving before the remote description are queued, as a
//! real engine would.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, TransportEngine};
use crate::error::{Result, SignalError};
use crate::protocol::{ConnectionState, IceCandidate, SdpType, SessionDescription};
use crate::relay::lock;

/// Default number of local candidates reported per negotiation
pub const DEFAULT_MOCK_CANDIDATES: usize = 2;

#[derive(Default)]
struct MockState {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    gathered: bool,
    connection: ConnectionState,
    descriptions_created: u32,
    fail_create: bool,
    reject_remote: bool,
    sent: Vec<Bytes>,
}

/// In-memory engine with deterministic output
pub struct MockEngine {
    label: String,
    candidate_count: usize,
    events: EngineEventSender,
    state: Mutex<MockState>,
}

impl MockEngine {
    /// Create an engine and the receiver for its events
    pub fn new(label: impl Into<String>) -> (Self, EngineEventReceiver) {
        let (tx, rx) = event_channel();
        let engine = Self {
            label: label.into(),
            candidate_count: DEFAULT_MOCK_CANDIDATES,
            events: tx,
            state: Mutex::new(MockState::default()),
        };
        (engine, rx)
    }

    /// Number of local candidates to report
    pub fn with_candidates(mut self, count: usize) -> Self {
        self.candidate_count = count;
        self
    }

    /// Make `create_offer` / `create_answer` fail
    pub fn set_fail_create(&self, fail: bool) {
        lock(&self.state).fail_create = fail;
    }

    /// Make `set_remote_description` reject everything
    pub fn set_reject_remote(&self, reject: bool) {
        lock(&self.state).reject_remote = reject;
    }

    /// Applied local description
    pub fn local_description(&self) -> Option<SessionDescription> {
        lock(&self.state).local.clone()
    }

    /// Applied remote description
    pub fn remote_description(&self) -> Option<SessionDescription> {
        lock(&self.state).remote.clone()
    }

    /// Remote candidates received so far, in order
    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        lock(&self.state).remote_candidates.clone()
    }

    /// Data passed to `send_data`
    pub fn sent_data(&self) -> Vec<Bytes> {
        lock(&self.state).sent.clone()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.state).connection
    }

    /// Report data as if it arrived from the peer
    pub fn inject_data(&self, data: Bytes) {
        self.emit(EngineEvent::DataReceived(data));
    }

    /// Report an arbitrary connection state
    pub fn report_state(&self, connection: ConnectionState) {
        lock(&self.state).connection = connection;
        self.emit(EngineEvent::ConnectionStateChanged(connection));
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!(engine = %self.label, "engine event receiver dropped");
        }
    }

    fn ensure_open(state: &MockState) -> Result<()> {
        if state.connection == ConnectionState::Closed {
            return Err(SignalError::EngineOperationFailed("engine closed".to_string()));
        }
        Ok(())
    }

    fn describe(&self, state: &mut MockState, kind: SdpType) -> SessionDescription {
        state.descriptions_created += 1;
        SessionDescription::new(
            kind,
            format!(
                "v=0\r\no=- {} {} IN IP4 127.0.0.1\r\ns={}\r\nt=0 0\r\na={}\r\n",
                self.label, state.descriptions_created, self.label, kind
            ),
        )
    }

    /// Advance gathering / connectivity after a state change
    fn progress(&self, state: &mut MockState) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        if !state.gathered && state.local.is_some() && state.remote.is_some() {
            state.gathered = true;
            for i in 0..self.candidate_count {
                events.push(EngineEvent::LocalCandidate(IceCandidate::new(
                    format!(
                        "candidate:{} 1 udp {} 127.0.0.1 {} typ host",
                        i + 1,
                        2_122_260_223_u32 - i as u32,
                        50_000 + i
                    ),
                    0,
                    Some("0".to_string()),
                )));
            }
            state.connection = ConnectionState::Checking;
            events.push(EngineEvent::ConnectionStateChanged(ConnectionState::Checking));
        }

        if state.gathered
            && state.connection == ConnectionState::Checking
            && !state.remote_candidates.is_empty()
        {
            state.connection = ConnectionState::Connected;
            events.push(EngineEvent::ConnectionStateChanged(ConnectionState::Connected));
        }

        events
    }

    fn apply<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut MockState) -> Result<()>,
    {
        let events = {
            let mut state = lock(&self.state);
            Self::ensure_open(&state)?;
            update(&mut state)?;
            self.progress(&mut state)
        };

        for event in events {
            self.emit(event);
        }
        Ok(())
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        if state.fail_create {
            return Err(SignalError::EngineOperationFailed(
                "offer creation failed".to_string(),
            ));
        }
        Ok(self.describe(&mut state, SdpType::Offer))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let mut state = lock(&self.state);
        Self::ensure_open(&state)?;
        if state.fail_create {
            return Err(SignalError::EngineOperationFailed(
                "answer creation failed".to_string(),
            ));
        }
        match &state.remote {
            Some(remote) if remote.kind == SdpType::Offer => {},
            _ => {
                return Err(SignalError::EngineOperationFailed(
                    "no remote offer to answer".to_string(),
                ))
            },
        }
        Ok(self.describe(&mut state, SdpType::Answer))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.apply(|state| {
            state.local = Some(desc);
            Ok(())
        })
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.apply(|state| {
            if state.reject_remote || !desc.sdp.starts_with("v=0") {
                return Err(SignalError::RemoteDescriptionRejected(format!(
                    "invalid {} description",
                    desc.kind
                )));
            }
            state.remote = Some(desc);
            Ok(())
        })
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.apply(|state| {
            state.remote_candidates.push(candidate);
            Ok(())
        })
    }

    async fn send_data(&self, data: Bytes) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connection.is_connected() {
            return Err(SignalError::EngineOperationFailed(
                "data channel not open".to_string(),
            ));
        }
        state.sent.push(data);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if state.connection == ConnectionState::Closed {
                return Ok(());
            }
            state.connection = ConnectionState::Closed;
        }
        self.emit(EngineEvent::ConnectionStateChanged(ConnectionState::Closed));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
