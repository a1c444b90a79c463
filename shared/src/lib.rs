//! # Haze Shared
//! Common functionality shared between haze overlay nodes & the rendezvous
//! matchmaker.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use haze_serde::{
    BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, UnsignedInteger,
    UnsignedVariableInteger,
};

mod config;
mod descriptor;
mod envelope;
mod error;
mod message_type;
mod routing_table;
mod rpc;
mod signaling;
mod timer;
mod types;

pub use config::{LeaderConfig, NodeConfig, SendTier};
pub use descriptor::PeerDescriptor;
pub use envelope::Envelope;
pub use error::{RpcError, SignalingError};
pub use message_type::MessageType;
pub use routing_table::{RouteExpiry, RoutingTable};
pub use rpc::{MessageInfo, RpcMessage, RpcSignature, RpcType, RpcValue};
pub use signaling::{IceCandidate, SdpKind, SessionDescription, SignalingMessage};
pub use timer::Timer;
pub use types::{PeerId, Position};
