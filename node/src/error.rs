use thiserror::Error;

use haze_shared::{RpcError, SerdeErr, SignalingError};

/// Errors reported by a `PeerTransport`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport could not be created for this remote peer
    #[error("Failed to create transport: {reason}")]
    CreateFailed { reason: String },

    /// Generating a local offer failed
    #[error("Failed to create offer: {reason}")]
    OfferFailed { reason: String },

    /// Generating a local answer failed
    #[error("Failed to create answer: {reason}")]
    AnswerFailed { reason: String },

    /// The remote description was rejected
    #[error("Failed to apply remote description: {reason}")]
    RemoteDescriptionFailed { reason: String },

    /// A remote candidate was rejected
    #[error("Failed to add ICE candidate: {reason}")]
    CandidateRejected { reason: String },

    /// The data channel refused the payload
    #[error("Failed to send {payload_size} bytes on data channel")]
    SendFailed { payload_size: usize },

    /// An offer was requested while another negotiation is under way
    #[error("Cannot create an offer while signaling state is {state}")]
    NegotiationInProgress { state: &'static str },
}

/// Everything a `Node` can surface through `ErrorEvent`
#[derive(Debug, Error)]
pub enum NodeError {
    /// An envelope or payload could not be decoded (possible malformed or malicious data)
    #[error("Failed to decode message: {0}")]
    Decode(#[from] SerdeErr),

    /// An RPC could not be dispatched
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// A signaling message could not be read or written
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// The transport reported a failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
