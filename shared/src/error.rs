use thiserror::Error;

use crate::rpc::RpcType;

/// Errors raised while resolving or invoking a remote procedure call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No handler is registered under this key
    #[error("No RPC handler registered for key `{key}`")]
    UnknownMethod { key: String },

    /// Fewer arguments arrived than the handler declares
    #[error("RPC `{key}` expects {expected} arguments but received {received}")]
    MissingArguments {
        key: String,
        expected: usize,
        received: usize,
    },

    /// More arguments arrived than the handler declares
    #[error("RPC `{key}` expects {expected} arguments but received {received}")]
    UnexpectedArguments {
        key: String,
        expected: usize,
        received: usize,
    },

    /// An argument's type does not match the declared parameter
    #[error("RPC `{key}` argument {index} should be {expected:?} but is {found:?}")]
    ArgumentMismatch {
        key: String,
        index: usize,
        expected: RpcType,
        found: RpcType,
    },

    /// A caller sent the `MessageInfo` slot, which only the receiving node fills
    #[error("RPC `{key}` argument {index} carries a sender-supplied MessageInfo")]
    ForgedInfo { key: String, index: usize },

    /// The call payload could not be decoded (possible malformed or malicious data)
    #[error("RPC payload could not be decoded")]
    MalformedPayload,
}

/// Errors raised while encoding or decoding rendezvous messages
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The JSON text could not be read as a signaling message
    #[error("Invalid signaling message: {0}")]
    Json(#[from] serde_json::Error),
}
