//! End-to-end session negotiation tests.
//!
//! Two sessions negotiate through an in-process relay hub with scripted
//! engines, exercising the full offer/answer/candidate exchange.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use peerlink::engine::MockEngine;
use peerlink::relay::MemoryHub;
use peerlink::{
    ConnectionState, EnvelopeCodec, RelayChannel, SdpType, Session, SessionSnapshot,
    SignalingClient, SignalingState,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct Peer {
    session: Arc<Session>,
    engine: Arc<MockEngine>,
    pump: JoinHandle<()>,
}

fn spawn_peer(hub: &MemoryHub, label: &str, codec: EnvelopeCodec, auto_answer: bool) -> Peer {
    let (engine, engine_events) = MockEngine::new(label);
    let engine = Arc::new(engine);
    let (signaling, signaling_events) = SignalingClient::new(Arc::new(hub.channel()), codec);

    let session = Arc::new(Session::new(engine.clone(), signaling).with_auto_answer(auto_answer));
    let pump = session.spawn(signaling_events, engine_events);

    Peer {
        session,
        engine,
        pump,
    }
}

/// Wait until the session state satisfies `predicate`
async fn wait_for<F>(session: &Session, predicate: F) -> SessionSnapshot
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let mut changes = session.watch();
    timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = *changes.borrow_and_update();
            if predicate(&snapshot) {
                return snapshot;
            }
            changes.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("Timed out waiting for session state")
}

async fn connect_both(a: &Peer, b: &Peer) {
    a.session.connect();
    b.session.connect();
    wait_for(&a.session, |s| s.signaling_state == SignalingState::Connected).await;
    wait_for(&b.session, |s| s.signaling_state == SignalingState::Connected).await;
}

#[tokio::test]
async fn test_offer_answer_reaches_connected() {
    let hub = MemoryHub::new();
    let alice = spawn_peer(&hub, "alice", EnvelopeCodec::new(), false);
    let bob = spawn_peer(&hub, "bob", EnvelopeCodec::new(), false);
    connect_both(&alice, &bob).await;

    let offer = alice.session.make_offer().await.unwrap();
    assert_eq!(offer.kind, SdpType::Offer);
    assert!(offer.sdp.starts_with("v=0"));

    wait_for(&bob.session, |s| s.remote_description_set).await;
    assert_eq!(bob.engine.remote_description(), Some(offer));

    let answer = bob.session.make_answer().await.unwrap();
    assert_eq!(answer.kind, SdpType::Answer);

    let a = wait_for(&alice.session, |s| s.connection_state == ConnectionState::Connected).await;
    let b = wait_for(&bob.session, |s| s.connection_state == ConnectionState::Connected).await;
    assert!(a.local_description_set && a.remote_description_set);
    assert!(b.local_description_set && b.remote_description_set);

    // Each side gathers two candidates and receives the other's two
    let a = wait_for(&alice.session, |s| s.candidates.remote() == 2).await;
    let b = wait_for(&bob.session, |s| s.candidates.remote() == 2).await;
    assert_eq!(a.candidates.local(), 2);
    assert_eq!(b.candidates.local(), 2);
    assert_eq!(alice.engine.remote_description(), Some(answer));

    // Signaling state is untouched by the engine
    assert_eq!(a.signaling_state, SignalingState::Connected);

    let stats = alice.session.signaling_stats();
    assert_eq!(stats.sent, 3);
    assert_eq!(stats.dropped_outbound, 0);
    assert_eq!(stats.dropped_inbound, 0);
}

#[tokio::test]
async fn test_auto_answer_negotiation() {
    let hub = MemoryHub::new();
    let alice = spawn_peer(&hub, "alice", EnvelopeCodec::new(), false);
    let bob = spawn_peer(&hub, "bob", EnvelopeCodec::new(), true);
    connect_both(&alice, &bob).await;

    alice.session.make_offer().await.unwrap();

    wait_for(&alice.session, |s| s.connection_state == ConnectionState::Connected).await;
    wait_for(&bob.session, |s| s.connection_state == ConnectionState::Connected).await;
    assert_eq!(
        bob.engine.local_description().map(|d| d.kind),
        Some(SdpType::Answer)
    );
}

#[tokio::test]
async fn test_rejected_offer_leaves_answerer_unchanged() {
    let hub = MemoryHub::new();
    let alice = spawn_peer(&hub, "alice", EnvelopeCodec::new(), false);
    let bob = spawn_peer(&hub, "bob", EnvelopeCodec::new(), true);
    bob.engine.set_reject_remote(true);
    connect_both(&alice, &bob).await;

    alice.session.make_offer().await.unwrap();

    timeout(Duration::from_secs(5), async {
        while bob.session.signaling_stats().received == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("offer never arrived");

    let snapshot = bob.session.snapshot();
    assert!(!snapshot.remote_description_set);
    assert!(!snapshot.local_description_set);
    assert_eq!(snapshot.connection_state, ConnectionState::New);
}

#[tokio::test]
async fn test_relay_loss_is_not_fatal() {
    let hub = MemoryHub::new();
    let alice = spawn_peer(&hub, "alice", EnvelopeCodec::new(), false);
    let bob = spawn_peer(&hub, "bob", EnvelopeCodec::new(), false);
    connect_both(&alice, &bob).await;

    hub.shutdown();
    wait_for(&alice.session, |s| s.signaling_state == SignalingState::Disconnected).await;

    // Negotiation still runs locally, the message is simply lost
    let offer = alice.session.make_offer().await.unwrap();
    assert_eq!(alice.engine.local_description(), Some(offer));
    assert!(alice.session.snapshot().local_description_set);
    assert_eq!(alice.session.signaling_stats().dropped_outbound, 1);
    assert!(!bob.session.snapshot().remote_description_set);
}

#[tokio::test]
async fn test_legacy_discriminators() {
    let hub = MemoryHub::new();
    let bob = spawn_peer(
        &hub,
        "bob",
        EnvelopeCodec::new().with_legacy_type_names(true),
        false,
    );
    bob.session.connect();
    wait_for(&bob.session, |s| s.signaling_state == SignalingState::Connected).await;

    let legacy_peer = hub.channel();
    legacy_peer.connect();
    legacy_peer.send(Bytes::from_static(
        br#"{"type":"SessionDescription","payload":{"sdp":"v=0\r\n","type":"offer"}}"#,
    ));
    legacy_peer.send(Bytes::from_static(
        br#"{"type":"IceCandidate","payload":{"sdp":"candidate:1","sdpMLineIndex":0}}"#,
    ));

    let snapshot = wait_for(&bob.session, |s| s.candidates.remote() == 1).await;
    assert!(snapshot.remote_description_set);
    assert_eq!(bob.engine.remote_candidates()[0].sdp_mid, None);
}

#[tokio::test]
async fn test_close_tears_down_both_sides_of_the_session() {
    let hub = MemoryHub::new();
    let alice = spawn_peer(&hub, "alice", EnvelopeCodec::new(), false);
    let bob = spawn_peer(&hub, "bob", EnvelopeCodec::new(), true);
    connect_both(&alice, &bob).await;

    alice.session.make_offer().await.unwrap();
    wait_for(&alice.session, |s| s.connection_state == ConnectionState::Connected).await;

    alice.session.close().await.unwrap();
    let snapshot = alice.session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Closed);
    assert_eq!(snapshot.signaling_state, SignalingState::Disconnected);
    assert_eq!(snapshot.candidates.local(), 0);
    assert_eq!(alice.engine.connection_state(), ConnectionState::Closed);

    timeout(Duration::from_secs(2), alice.pump)
        .await
        .expect("pump did not stop")
        .unwrap();

    // The other peer is unaffected
    assert_eq!(
        bob.session.snapshot().connection_state,
        ConnectionState::Connected
    );
    bob.pump.abort();
}
