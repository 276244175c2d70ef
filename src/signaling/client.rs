//! Signaling client over a relay channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, SignalError};
use crate::protocol::{EnvelopeCodec, IceCandidate, NegotiationMessage, SessionDescription};
use crate::relay::{ChannelState, RelayChannel, RelayListener};

/// Events surfaced to the session orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Relay channel opened
    Connected,
    /// Relay channel closed
    Disconnected,
    /// Peer sent a session description
    SessionDescription(SessionDescription),
    /// Peer sent a candidate
    Candidate(IceCandidate),
}

/// Message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalingStats {
    /// Messages handed to the relay channel
    pub sent: u64,
    /// Outbound messages dropped (encode failure or channel not open)
    pub dropped_outbound: u64,
    /// Inbound messages decoded and dispatched
    pub received: u64,
    /// Inbound frames that failed to decode
    pub dropped_inbound: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    dropped_outbound: AtomicU64,
    received: AtomicU64,
    dropped_inbound: AtomicU64,
}

/// Listener registered on the relay channel
struct RelayBridge {
    codec: EnvelopeCodec,
    connected: AtomicBool,
    events: mpsc::UnboundedSender<SignalingEvent>,
    counters: Counters,
}

impl RelayBridge {
    fn emit(&self, event: SignalingEvent) {
        if self.events.send(event).is_err() {
            debug!("signaling event receiver dropped");
        }
    }
}

impl RelayListener for RelayBridge {
    fn on_open(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("Signaling connected");
        self.emit(SignalingEvent::Connected);
    }

    fn on_close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("Signaling disconnected");
        self.emit(SignalingEvent::Disconnected);
    }

    fn on_message(&self, data: Bytes) {
        match self.codec.decode(&data) {
            Ok(NegotiationMessage::SessionDescription(desc)) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %desc.kind, "received session description");
                self.emit(SignalingEvent::SessionDescription(desc));
            },
            Ok(NegotiationMessage::Candidate(candidate)) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                debug!(mline = candidate.sdp_mline_index, "received candidate");
                self.emit(SignalingEvent::Candidate(candidate));
            },
            Err(e) => {
                self.counters.dropped_inbound.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, bytes = data.len(), "could not decode message, dropped");
            },
        }
    }
}

/// Sends and receives typed negotiation messages through a relay channel
pub struct SignalingClient {
    channel: Arc<dyn RelayChannel>,
    bridge: Arc<RelayBridge>,
}

impl SignalingClient {
    /// Create a client and the receiver for its events
    pub fn new(
        channel: Arc<dyn RelayChannel>,
        codec: EnvelopeCodec,
    ) -> (Self, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(RelayBridge {
            codec,
            connected: AtomicBool::new(false),
            events: tx,
            counters: Counters::default(),
        });

        (Self { channel, bridge }, rx)
    }

    /// Register on the relay channel and start connecting.
    ///
    /// Readiness is reported later as [`SignalingEvent::Connected`].
    pub fn connect(&self) {
        self.channel.set_listener(self.bridge.clone());
        self.channel.connect();
    }

    /// Release the relay channel
    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    /// Whether the relay channel has been observed open
    pub fn is_connected(&self) -> bool {
        self.bridge.connected.load(Ordering::SeqCst)
    }

    /// Underlying channel state
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Send a message, best-effort. Failures are logged and counted, never returned.
    pub fn send(&self, message: &NegotiationMessage) {
        if let Err(e) = self.try_send(message) {
            self.bridge
                .counters
                .dropped_outbound
                .fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, kind = message.wire_type(), "could not send message, dropped");
        }
    }

    /// Send a session description, best-effort
    pub fn send_session_description(&self, desc: SessionDescription) {
        self.send(&NegotiationMessage::SessionDescription(desc));
    }

    /// Send a candidate, best-effort
    pub fn send_candidate(&self, candidate: IceCandidate) {
        self.send(&NegotiationMessage::Candidate(candidate));
    }

    /// Send a message, reporting why it could not be handed to the channel
    pub fn try_send(&self, message: &NegotiationMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(SignalError::ChannelClosed);
        }

        let frame = self.bridge.codec.encode(message)?;
        self.channel.send(frame);
        self.bridge.counters.sent.fetch_add(1, Ordering::Relaxed);
        debug!(kind = message.wire_type(), "sent message");
        Ok(())
    }

    /// Snapshot of the message counters
    pub fn stats(&self) -> SignalingStats {
        let counters = &self.bridge.counters;
        SignalingStats {
            sent: counters.sent.load(Ordering::Relaxed),
            dropped_outbound: counters.dropped_outbound.load(Ordering::Relaxed),
            received: counters.received.load(Ordering::Relaxed),
            dropped_inbound: counters.dropped_inbound.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SdpType;
    use crate::relay::MemoryHub;

    fn client(hub: &MemoryHub) -> (SignalingClient, mpsc::UnboundedReceiver<SignalingEvent>) {
        SignalingClient::new(Arc::new(hub.channel()), EnvelopeCodec::new())
    }

    #[test]
    fn test_open_and_close_map_to_events() {
        let hub = MemoryHub::new();
        let (a, mut events) = client(&hub);

        a.connect();
        assert!(a.is_connected());
        assert_eq!(events.try_recv().unwrap(), SignalingEvent::Connected);

        a.disconnect();
        assert!(!a.is_connected());
        assert_eq!(events.try_recv().unwrap(), SignalingEvent::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_messages_dispatch_by_variant() {
        let hub = MemoryHub::new();
        let (a, _a_events) = client(&hub);
        let (b, mut b_events) = client(&hub);
        a.connect();
        b.connect();
        assert_eq!(b_events.try_recv().unwrap(), SignalingEvent::Connected);

        a.send_session_description(SessionDescription::offer("v=0\r\n"));
        a.send_candidate(IceCandidate::new("candidate:1", 0, Some("0".into())));

        match b_events.try_recv().unwrap() {
            SignalingEvent::SessionDescription(desc) => assert_eq!(desc.kind, SdpType::Offer),
            other => panic!("unexpected event: {other:?}"),
        }
        match b_events.try_recv().unwrap() {
            SignalingEvent::Candidate(candidate) => assert_eq!(candidate.sdp, "candidate:1"),
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(a.stats().sent, 2);
        assert_eq!(b.stats().received, 2);
    }

    #[test]
    fn test_undecodable_frames_are_dropped() {
        let hub = MemoryHub::new();
        let raw = hub.channel();
        let (b, mut b_events) = client(&hub);
        raw.connect();
        b.connect();
        assert_eq!(b_events.try_recv().unwrap(), SignalingEvent::Connected);

        raw.send(Bytes::from_static(br#"{"type":"bogus","payload":{}}"#));
        raw.send(Bytes::from_static(b"garbage"));
        raw.send(Bytes::from_static(br#"{"type":"candidate","payload":{}}"#));

        assert!(b_events.try_recv().is_err());
        assert_eq!(b.stats().dropped_inbound, 3);
        assert!(b.is_connected());
    }

    #[test]
    fn test_send_before_connect_is_dropped() {
        let hub = MemoryHub::new();
        let (a, _) = client(&hub);

        a.send_session_description(SessionDescription::offer("v=0"));
        assert!(matches!(
            a.try_send(&SessionDescription::offer("v=0").into()),
            Err(SignalError::ChannelClosed)
        ));

        let stats = a.stats();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.dropped_outbound, 1);
    }

    #[test]
    fn test_send_after_relay_loss_is_silent() {
        let hub = MemoryHub::new();
        let (a, mut events) = client(&hub);
        a.connect();
        let _ = events.try_recv();

        hub.shutdown();
        assert_eq!(events.try_recv().unwrap(), SignalingEvent::Disconnected);

        a.send_candidate(IceCandidate::new("candidate:1", 0, None));
        a.send_candidate(IceCandidate::new("candidate:2", 0, None));
        assert_eq!(a.stats().dropped_outbound, 2);
        assert_eq!(a.channel_state(), ChannelState::Closed);
    }
}
