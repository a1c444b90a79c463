use serde::{Deserialize, Serialize};

use crate::{error::SignalingError, types::PeerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A local or remote session description produced by the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One network path candidate gathered by the transport
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// Messages exchanged with the rendezvous service, and relayed between
/// peers once they can reach each other over the overlay.
///
/// On the wire these are JSON objects tagged by `"type"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// A new node asking the rendezvous for someone to connect to
    SignalingRequest { id: PeerId },
    /// The rendezvous naming a peer; `request` is what to send it
    SignalingResponse { target_id: PeerId, request: String },
    Offer {
        id: PeerId,
        target_id: PeerId,
        sdp: String,
    },
    Answer {
        id: PeerId,
        target_id: PeerId,
        sdp: String,
    },
    /// One batch of candidates gathered since the last batch
    CandidateAdd {
        id: PeerId,
        target_id: PeerId,
        candidates: Vec<IceCandidate>,
    },
}

impl SignalingMessage {
    pub const REQUEST_OFFER: &'static str = "offer";

    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalingError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The node that wrote the message, when it says
    pub fn sender_id(&self) -> Option<&PeerId> {
        match self {
            SignalingMessage::SignalingRequest { id }
            | SignalingMessage::Offer { id, .. }
            | SignalingMessage::Answer { id, .. }
            | SignalingMessage::CandidateAdd { id, .. } => Some(id),
            SignalingMessage::SignalingResponse { .. } => None,
        }
    }

    pub fn target_id(&self) -> Option<&PeerId> {
        match self {
            SignalingMessage::SignalingRequest { .. } => None,
            SignalingMessage::SignalingResponse { target_id, .. }
            | SignalingMessage::Offer { target_id, .. }
            | SignalingMessage::Answer { target_id, .. }
            | SignalingMessage::CandidateAdd { target_id, .. } => Some(target_id),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SignalingMessage::SignalingRequest { .. } => "signaling_request",
            SignalingMessage::SignalingResponse { .. } => "signaling_response",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::CandidateAdd { .. } => "candidate_add",
        }
    }
}
