//! Property tests for the envelope codec.

use peerlink::{DecodeError, EnvelopeCodec, IceCandidate, NegotiationMessage, SdpType, SessionDescription};
use proptest::prelude::*;
use serde_json::{json, Value};

fn sdp_type() -> impl Strategy<Value = SdpType> {
    prop_oneof![
        Just(SdpType::Offer),
        Just(SdpType::PrAnswer),
        Just(SdpType::Answer),
    ]
}

fn message() -> impl Strategy<Value = NegotiationMessage> {
    prop_oneof![
        (sdp_type(), any::<String>())
            .prop_map(|(kind, sdp)| SessionDescription::new(kind, sdp).into()),
        (any::<String>(), any::<i32>(), proptest::option::of(any::<String>()))
            .prop_map(|(sdp, index, mid)| IceCandidate::new(sdp, index, mid).into()),
    ]
}

proptest! {
    #[test]
    fn prop_round_trip(msg in message()) {
        let codec = EnvelopeCodec::new();
        let wire = codec.encode(&msg).unwrap();
        prop_assert_eq!(codec.decode(&wire).unwrap(), msg);
    }

    #[test]
    fn prop_envelope_shape(msg in message()) {
        let wire = EnvelopeCodec::new().encode(&msg).unwrap();
        let value: Value = serde_json::from_slice(&wire).unwrap();

        prop_assert_eq!(value["type"].as_str(), Some(msg.wire_type()));
        prop_assert!(value["payload"].is_object());
        if let NegotiationMessage::Candidate(_) = msg {
            // sdpMid is always present, null when absent
            prop_assert!(value["payload"].get("sdpMid").is_some());
        }
    }

    #[test]
    fn prop_unknown_type_rejected(kind in "[a-zA-Z]{1,16}") {
        prop_assume!(kind != "sessionDescription" && kind != "candidate");

        let envelope = json!({"type": kind, "payload": {"sdp": "v=0", "type": "offer"}});
        let result = EnvelopeCodec::new().decode(envelope.to_string().as_bytes());
        prop_assert_eq!(result, Err(DecodeError::UnknownType(kind)));
    }

    #[test]
    fn prop_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = EnvelopeCodec::new().with_legacy_type_names(true).decode(&data);
    }

    #[test]
    fn prop_mistyped_mline_is_malformed(index in "[a-z]{1,8}") {
        let envelope = json!({
            "type": "candidate",
            "payload": {"sdp": "candidate:1", "sdpMLineIndex": index, "sdpMid": null}
        });
        let result = EnvelopeCodec::new().decode(envelope.to_string().as_bytes());
        prop_assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }
}

#[test]
fn test_missing_sdp_is_malformed() {
    let result = EnvelopeCodec::new().decode(br#"{"type":"candidate","payload":{}}"#);
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_bogus_type_is_unknown() {
    let result = EnvelopeCodec::new().decode(br#"{"type":"bogus","payload":{}}"#);
    assert_eq!(result, Err(DecodeError::UnknownType("bogus".to_string())));
}

#[test]
fn test_legacy_names_only_when_enabled() {
    let wire = br#"{"type":"IceCandidate","payload":{"sdp":"candidate:1","sdpMLineIndex":0,"sdpMid":"0"}}"#;

    assert!(matches!(
        EnvelopeCodec::new().decode(wire),
        Err(DecodeError::UnknownType(_))
    ));
    assert!(EnvelopeCodec::new()
        .with_legacy_type_names(true)
        .decode(wire)
        .is_ok());
}
