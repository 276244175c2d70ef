//! Negotiation messages exchanged through the relay.
//!
//! Defines the two payload shapes (session description and candidate) and the
//! tagged union that carries exactly one of them.

use serde::{Deserialize, Serialize};

/// Session description kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdpType {
    /// Initial proposal from the offering peer
    Offer,
    /// Provisional answer
    PrAnswer,
    /// Final answer
    Answer,
}

impl SdpType {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::PrAnswer => "prAnswer",
            Self::Answer => "answer",
        }
    }
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SdpType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offer" => Ok(Self::Offer),
            "pranswer" | "pr-answer" | "provisional" => Ok(Self::PrAnswer),
            "answer" => Ok(Self::Answer),
            _ => Err(format!("Unknown sdp type: {}", s)),
        }
    }
}

/// Session description payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Raw SDP body
    pub sdp: String,
    /// Offer, provisional answer or answer
    #[serde(rename = "type")]
    pub kind: SdpType,
}

impl SessionDescription {
    /// Create a description of the given kind
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind,
        }
    }

    /// Create an offer
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Offer, sdp)
    }

    /// Create an answer
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Answer, sdp)
    }

    /// Create a provisional answer
    pub fn pr_answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::PrAnswer, sdp)
    }
}

/// Connectivity candidate payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate attribute line
    pub sdp: String,
    /// Index of the media line this candidate belongs to
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: i32,
    /// Media stream identification tag, serialized as `null` when absent
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
}

impl IceCandidate {
    /// Create a candidate
    pub fn new(sdp: impl Into<String>, sdp_mline_index: i32, sdp_mid: Option<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_mline_index,
            sdp_mid,
        }
    }
}

/// A single negotiation message. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationMessage {
    /// Local or remote session description
    SessionDescription(SessionDescription),
    /// Connectivity candidate
    Candidate(IceCandidate),
}

impl NegotiationMessage {
    /// Stable wire discriminator for this variant
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::SessionDescription(_) => super::TYPE_SESSION_DESCRIPTION,
            Self::Candidate(_) => super::TYPE_CANDIDATE,
        }
    }

    /// Get the session description, if this is one
    pub fn session_description(&self) -> Option<&SessionDescription> {
        match self {
            Self::SessionDescription(desc) => Some(desc),
            Self::Candidate(_) => None,
        }
    }

    /// Get the candidate, if this is one
    pub fn candidate(&self) -> Option<&IceCandidate> {
        match self {
            Self::Candidate(candidate) => Some(candidate),
            Self::SessionDescription(_) => None,
        }
    }
}

impl From<SessionDescription> for NegotiationMessage {
    fn from(desc: SessionDescription) -> Self {
        Self::SessionDescription(desc)
    }
}

impl From<IceCandidate> for NegotiationMessage {
    fn from(candidate: IceCandidate) -> Self {
        Self::Candidate(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sdp_type_wire_names() {
        assert_eq!(serde_json::to_string(&SdpType::Offer).unwrap(), "\"offer\"");
        assert_eq!(
            serde_json::to_string(&SdpType::PrAnswer).unwrap(),
            "\"prAnswer\""
        );
        assert_eq!(serde_json::to_string(&SdpType::Answer).unwrap(), "\"answer\"");
    }

    #[test]
    fn test_sdp_type_from_str() {
        assert_eq!(SdpType::from_str("offer").unwrap(), SdpType::Offer);
        assert_eq!(SdpType::from_str("prAnswer").unwrap(), SdpType::PrAnswer);
        assert_eq!(SdpType::from_str("pr-answer").unwrap(), SdpType::PrAnswer);
        assert_eq!(SdpType::from_str("ANSWER").unwrap(), SdpType::Answer);
        assert!(SdpType::from_str("rollback").is_err());
    }

    #[test]
    fn test_candidate_field_names() {
        let candidate = IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host", 0, None);
        let value = serde_json::to_value(&candidate).unwrap();

        assert_eq!(value["sdpMLineIndex"], 0);
        assert!(value["sdpMid"].is_null());
        assert!(value.as_object().unwrap().contains_key("sdpMid"));
    }

    #[test]
    fn test_candidate_mid_may_be_omitted() {
        let candidate: IceCandidate =
            serde_json::from_str(r#"{"sdp":"candidate:1","sdpMLineIndex":2}"#).unwrap();
        assert_eq!(candidate.sdp_mline_index, 2);
        assert!(candidate.sdp_mid.is_none());
    }

    #[test]
    fn test_message_accessors() {
        let msg: NegotiationMessage = SessionDescription::offer("v=0").into();
        assert_eq!(msg.wire_type(), "sessionDescription");
        assert!(msg.session_description().is_some());
        assert!(msg.candidate().is_none());

        let msg: NegotiationMessage = IceCandidate::new("candidate:1", 0, Some("0".into())).into();
        assert_eq!(msg.wire_type(), "candidate");
        assert!(msg.candidate().is_some());
    }
}
