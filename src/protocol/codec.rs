//! Envelope codec for negotiation messages.
//!
//! Every message travels as a keyed JSON structure:
//!
//! ```text
//! { "type": "sessionDescription" | "candidate", "payload": { ... } }
//! ```
//!
//! The decoder reads `type` first and dispatches to the matching payload
//! decoder, so no external context is needed.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{IceCandidate, NegotiationMessage, SessionDescription};
use super::{LEGACY_TYPE_CANDIDATE, LEGACY_TYPE_SESSION_DESCRIPTION, TYPE_CANDIDATE, TYPE_SESSION_DESCRIPTION};
use crate::error::{DecodeError, Result, SignalError};

/// Outbound envelope, borrowing the payload
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a T,
}

/// Inbound envelope before payload dispatch
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// Encodes and decodes negotiation messages.
///
/// Built once from configuration and handed to every signaling client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeCodec {
    legacy_type_names: bool,
}

impl EnvelopeCodec {
    /// Create a codec that only accepts the fixed wire constants
    pub fn new() -> Self {
        Self::default()
    }

    /// Also accept `SessionDescription` / `IceCandidate` discriminators on decode
    pub fn with_legacy_type_names(mut self, enabled: bool) -> Self {
        self.legacy_type_names = enabled;
        self
    }

    /// Whether legacy discriminators are accepted
    pub fn accepts_legacy_type_names(&self) -> bool {
        self.legacy_type_names
    }

    /// Serialize a message into its wire envelope
    pub fn encode(&self, message: &NegotiationMessage) -> Result<Bytes> {
        let kind = message.wire_type();
        let encoded = match message {
            NegotiationMessage::SessionDescription(desc) => {
                serde_json::to_vec(&Envelope { kind, payload: desc })
            },
            NegotiationMessage::Candidate(candidate) => {
                serde_json::to_vec(&Envelope {
                    kind,
                    payload: candidate,
                })
            },
        };

        encoded
            .map(Bytes::from)
            .map_err(|e| SignalError::Encode(format!("{kind}: {e}")))
    }

    /// Parse a wire envelope into a message
    pub fn decode(&self, data: &[u8]) -> std::result::Result<NegotiationMessage, DecodeError> {
        let raw: RawEnvelope = serde_json::from_slice(data)
            .map_err(|e| DecodeError::Malformed(format!("invalid envelope: {e}")))?;

        match self.canonical_type(&raw.kind) {
            Some(TYPE_SESSION_DESCRIPTION) => {
                let desc: SessionDescription = Self::payload(raw.payload, TYPE_SESSION_DESCRIPTION)?;
                Ok(NegotiationMessage::SessionDescription(desc))
            },
            Some(TYPE_CANDIDATE) => {
                let candidate: IceCandidate = Self::payload(raw.payload, TYPE_CANDIDATE)?;
                Ok(NegotiationMessage::Candidate(candidate))
            },
            _ => Err(DecodeError::UnknownType(raw.kind)),
        }
    }

    /// Map a discriminator onto one of the fixed constants
    fn canonical_type(&self, kind: &str) -> Option<&'static str> {
        match kind {
            TYPE_SESSION_DESCRIPTION => Some(TYPE_SESSION_DESCRIPTION),
            TYPE_CANDIDATE => Some(TYPE_CANDIDATE),
            LEGACY_TYPE_SESSION_DESCRIPTION if self.legacy_type_names => {
                Some(TYPE_SESSION_DESCRIPTION)
            },
            LEGACY_TYPE_CANDIDATE if self.legacy_type_names => Some(TYPE_CANDIDATE),
            _ => None,
        }
    }

    fn payload<T: serde::de::DeserializeOwned>(
        payload: Option<Value>,
        kind: &str,
    ) -> std::result::Result<T, DecodeError> {
        let payload =
            payload.ok_or_else(|| DecodeError::Malformed(format!("{kind}: missing payload")))?;

        serde_json::from_value(payload)
            .map_err(|e| DecodeError::Malformed(format!("{kind}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SdpType;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new()
    }

    #[test]
    fn test_encode_session_description() {
        let msg = NegotiationMessage::SessionDescription(SessionDescription::offer("v=0\r\n"));
        let bytes = codec().encode(&msg).unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "sessionDescription");
        assert_eq!(value["payload"]["sdp"], "v=0\r\n");
        assert_eq!(value["payload"]["type"], "offer");
    }

    #[test]
    fn test_encode_candidate() {
        let msg = NegotiationMessage::Candidate(IceCandidate::new(
            "candidate:0 1 UDP 2122252543 192.168.1.2 54321 typ host",
            1,
            Some("audio".to_string()),
        ));
        let bytes = codec().encode(&msg).unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "candidate");
        assert_eq!(value["payload"]["sdpMLineIndex"], 1);
        assert_eq!(value["payload"]["sdpMid"], "audio");
    }

    #[test]
    fn test_roundtrip() {
        let messages = vec![
            NegotiationMessage::SessionDescription(SessionDescription::offer("v=0 offer")),
            NegotiationMessage::SessionDescription(SessionDescription::pr_answer("v=0 pr")),
            NegotiationMessage::SessionDescription(SessionDescription::answer("v=0 answer")),
            NegotiationMessage::Candidate(IceCandidate::new("candidate:1", 0, None)),
            NegotiationMessage::Candidate(IceCandidate::new("candidate:2", -1, Some("0".into()))),
        ];

        for msg in messages {
            let bytes = codec().encode(&msg).unwrap();
            assert_eq!(codec().decode(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = codec()
            .decode(br#"{"type":"bogus","payload":{}}"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("bogus".to_string()));
    }

    #[test]
    fn test_unknown_type_wins_over_missing_payload() {
        let err = codec().decode(br#"{"type":"bogus"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(_)));
    }

    #[test]
    fn test_candidate_missing_sdp_is_malformed() {
        let err = codec()
            .decode(br#"{"type":"candidate","payload":{}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_mistyped_payload_is_malformed() {
        let err = codec()
            .decode(br#"{"type":"candidate","payload":{"sdp":"c","sdpMLineIndex":"zero"}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = codec()
            .decode(br#"{"type":"sessionDescription","payload":{"sdp":"v=0","type":"rollback"}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_missing_envelope_fields_are_malformed() {
        assert!(matches!(
            codec().decode(br#"{"payload":{}}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(br#"{"type":"candidate"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(b"not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(br#"{"type":7,"payload":{}}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_legacy_type_names() {
        let legacy = br#"{"type":"SessionDescription","payload":{"sdp":"v=0","type":"answer"}}"#;

        assert!(matches!(
            codec().decode(legacy),
            Err(DecodeError::UnknownType(_))
        ));

        let lenient = codec().with_legacy_type_names(true);
        let msg = lenient.decode(legacy).unwrap();
        assert_eq!(msg.session_description().unwrap().kind, SdpType::Answer);

        let candidate = lenient
            .decode(br#"{"type":"IceCandidate","payload":{"sdp":"c","sdpMLineIndex":0,"sdpMid":null}}"#)
            .unwrap();
        assert!(candidate.candidate().is_some());

        // Encoding never emits legacy names
        let bytes = lenient.encode(&msg).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "sessionDescription");
    }
}
