//! Session orchestrator.
//!
//! Owns the negotiation state machine of one peer. Relay traffic arrives as
//! [`SignalingEvent`]s, engine callbacks as [`EngineEvent`]s; both streams are
//! pumped by [`Session::run`] and every state mutation goes through a single
//! `watch` channel, which serializes them and lets observers follow along.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::message::{IceCandidate, SdpType, SessionDescription};
use super::state::{ConnectionState, SessionSnapshot, SignalingState};
use crate::engine::{EngineEvent, EngineEventReceiver, TransportEngine};
use crate::error::{Result, SignalError};
use crate::signaling::{SignalingClient, SignalingEvent, SignalingStats};

/// Capacity of the incoming data broadcast
const INCOMING_DATA_CAPACITY: usize = 64;

/// Clears the in-flight flag when negotiation ends, successfully or not
struct NegotiationGuard<'a>(&'a AtomicBool);

impl<'a> NegotiationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SignalError::NegotiationInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for NegotiationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One negotiation between this peer and a remote peer.
///
/// A session is single-use: once closed, or once the engine reports `closed`
/// or `failed`, negotiation requires a new session and a new engine.
pub struct Session {
    /// Session ID
    id: Uuid,
    /// Transport engine
    engine: Arc<dyn TransportEngine>,
    /// Relay-side messaging
    signaling: SignalingClient,
    /// Current state, published to watchers
    state: watch::Sender<SessionSnapshot>,
    /// Offer or answer in flight
    negotiating: AtomicBool,
    /// Set once by `close`
    closed: AtomicBool,
    /// Answer remote offers without a caller
    auto_answer: bool,
    /// Data received over the data channel
    incoming: broadcast::Sender<Bytes>,
}

impl Session {
    /// Create a session over an engine and a signaling client
    pub fn new(engine: Arc<dyn TransportEngine>, signaling: SignalingClient) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let (incoming, _) = broadcast::channel(INCOMING_DATA_CAPACITY);

        Self {
            id: Uuid::new_v4(),
            engine,
            signaling,
            state,
            negotiating: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            auto_answer: false,
            incoming,
        }
    }

    /// Answer remote offers automatically
    pub fn with_auto_answer(mut self, enabled: bool) -> Self {
        self.auto_answer = enabled;
        self
    }

    /// Session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Subscribe to data received from the peer
    pub fn incoming_data(&self) -> broadcast::Receiver<Bytes> {
        self.incoming.subscribe()
    }

    /// Signaling message counters
    pub fn signaling_stats(&self) -> SignalingStats {
        self.signaling.stats()
    }

    /// Session was closed or the engine relationship ended
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.snapshot().connection_state.is_terminal()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SignalError::SessionClosed);
        }
        Ok(())
    }

    /// Connect to the relay. Readiness shows up as `SignalingState::Connected`.
    pub fn connect(&self) {
        info!(session = %self.id, "Connecting signaling");
        self.signaling.connect();
    }

    /// Create, apply and send a local offer
    pub async fn make_offer(&self) -> Result<SessionDescription> {
        self.negotiate(SdpType::Offer).await
    }

    /// Create, apply and send a local answer to the applied remote offer
    pub async fn make_answer(&self) -> Result<SessionDescription> {
        if !self.snapshot().remote_description_set {
            return Err(SignalError::EngineOperationFailed(
                "no remote offer applied".to_string(),
            ));
        }
        self.negotiate(SdpType::Answer).await
    }

    async fn negotiate(&self, kind: SdpType) -> Result<SessionDescription> {
        self.ensure_open()?;
        let _guard = NegotiationGuard::acquire(&self.negotiating)?;

        let created = match kind {
            SdpType::Offer => self.engine.create_offer().await,
            _ => self.engine.create_answer().await,
        };
        let desc = match created {
            Ok(desc) => desc,
            Err(e) => {
                warn!(session = %self.id, kind = %kind, error = %e, "could not create local description");
                return Err(e);
            },
        };

        if let Err(e) = self.engine.set_local_description(desc.clone()).await {
            warn!(session = %self.id, kind = %kind, error = %e, "could not apply local description");
            return Err(e);
        }

        self.state.send_modify(|s| s.local_description_set = true);
        info!(session = %self.id, kind = %desc.kind, "Local description applied");

        self.signaling.send_session_description(desc.clone());
        Ok(desc)
    }

    /// Apply a description received from the peer.
    ///
    /// A rejected description leaves the state untouched.
    pub async fn on_remote_session_description(&self, desc: SessionDescription) -> Result<()> {
        self.ensure_open()?;
        let kind = desc.kind;

        if let Err(e) = self.engine.set_remote_description(desc).await {
            warn!(session = %self.id, kind = %kind, error = %e, "remote description rejected");
            return Err(e);
        }

        self.state.send_modify(|s| s.remote_description_set = true);
        info!(session = %self.id, kind = %kind, "Remote description applied");

        if self.auto_answer && kind == SdpType::Offer {
            self.make_answer().await?;
        }
        Ok(())
    }

    /// Forward a candidate received from the peer to the engine
    pub async fn on_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.ensure_open()?;
        self.state.send_modify(|s| s.candidates.record_remote());
        debug!(session = %self.id, mline = candidate.sdp_mline_index, "remote candidate");

        self.engine.add_remote_candidate(candidate).await.map_err(|e| {
            warn!(session = %self.id, error = %e, "engine refused remote candidate");
            e
        })
    }

    /// Count a local candidate and send it to the peer
    pub fn on_local_candidate_discovered(&self, candidate: IceCandidate) {
        if self.closed.load(Ordering::Acquire) {
            debug!(session = %self.id, "session closed, local candidate ignored");
            return;
        }

        self.state.send_modify(|s| s.candidates.record_local());
        debug!(session = %self.id, mline = candidate.sdp_mline_index, "local candidate");
        self.signaling.send_candidate(candidate);
    }

    /// Record the engine's connection state as reported
    pub fn on_connection_state_changed(&self, connection: ConnectionState) {
        self.state.send_modify(|s| s.connection_state = connection);
        info!(session = %self.id, state = %connection, "Connection state changed");
    }

    /// Relay channel opened
    pub fn on_signaling_connected(&self) {
        self.state
            .send_modify(|s| s.signaling_state = SignalingState::Connected);
    }

    /// Relay channel closed
    pub fn on_signaling_disconnected(&self) {
        self.state
            .send_modify(|s| s.signaling_state = SignalingState::Disconnected);
    }

    /// Send application data to the peer
    pub async fn send_data(&self, data: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.engine.send_data(data).await
    }

    /// Dispatch one signaling event. Failures are logged, not returned.
    pub async fn handle_signaling_event(&self, event: SignalingEvent) {
        let result = match event {
            SignalingEvent::Connected => {
                self.on_signaling_connected();
                Ok(())
            },
            SignalingEvent::Disconnected => {
                self.on_signaling_disconnected();
                Ok(())
            },
            SignalingEvent::SessionDescription(desc) => self.on_remote_session_description(desc).await,
            SignalingEvent::Candidate(candidate) => self.on_remote_candidate(candidate).await,
        };

        if let Err(e) = result {
            debug!(session = %self.id, error = %e, "signaling event not applied");
        }
    }

    /// Dispatch one engine event
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::LocalCandidate(candidate) => self.on_local_candidate_discovered(candidate),
            EngineEvent::ConnectionStateChanged(connection) => self.on_connection_state_changed(connection),
            EngineEvent::DataReceived(data) => {
                debug!(session = %self.id, bytes = data.len(), "data received");
                // No subscribers is fine
                let _ = self.incoming.send(data);
            },
        }
    }

    /// Pump both event streams until the session is closed.
    ///
    /// The session owns the senders of both streams, so they never end on
    /// their own; the state watch wakes the loop when `close` runs.
    pub async fn run(
        self: Arc<Self>,
        mut signaling_events: mpsc::UnboundedReceiver<SignalingEvent>,
        mut engine_events: EngineEventReceiver,
    ) {
        let mut changes = self.state.subscribe();

        loop {
            if self.closed.load(Ordering::Acquire) {
                break;
            }

            tokio::select! {
                Some(event) = signaling_events.recv() => self.handle_signaling_event(event).await,
                Some(event) = engine_events.recv() => self.handle_engine_event(event).await,
                Ok(()) = changes.changed() => {},
                else => break,
            }
        }

        debug!(session = %self.id, "event pump stopped");
    }

    /// Run the event pump on the current runtime
    pub fn spawn(
        self: &Arc<Self>,
        signaling_events: mpsc::UnboundedReceiver<SignalingEvent>,
        engine_events: EngineEventReceiver,
    ) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(signaling_events, engine_events))
    }

    /// Release the relay channel and the engine, then reset the session state
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.signaling.disconnect();
        let result = self.engine.close().await;

        self.state.send_modify(|s| {
            s.signaling_state = SignalingState::Disconnected;
            s.connection_state = ConnectionState::Closed;
            s.local_description_set = false;
            s.remote_description_set = false;
            s.candidates.reset();
        });
        info!(session = %self.id, engine = self.engine.name(), "Session closed");

        result
    }
}
