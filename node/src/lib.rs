//! # Haze Node
//! A member of a self-organizing peer-to-peer overlay. Negotiates direct
//! links over a pluggable transport, forwards envelopes along learned
//! reverse paths, keeps its degree bounded around its nearest peers, and
//! dispatches typed RPCs.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod rendezvous;
pub mod transport;
pub mod shared {
    pub use haze_shared::{
        Envelope, IceCandidate, LeaderConfig, MessageInfo, MessageType, NodeConfig,
        PeerDescriptor, PeerId, Position, RouteExpiry, RoutingTable, RpcError, RpcMessage,
        RpcSignature, RpcType, RpcValue, SendTier, SessionDescription, SignalingError,
        SignalingMessage,
    };
}

mod connection;
mod dispatcher;
mod error;
mod events;
mod node;
mod optimizer;
mod rpc_registry;
mod signaling_exchange;

pub use connection::{
    peer_connection::{PeerConnection, SignalingState},
    peer_registry::{PeerRecord, PeerRegistry, PeerState},
};
pub use dispatcher::{Delivery, Dispatcher};
pub use error::{NodeError, TransportError};
pub use events::{ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events, MessageEvent};
pub use node::Node;
pub use optimizer::{ConnectionOptimizer, LeaderTimer, OptimizerAction, SendingOptimizer};
pub use rpc_registry::{RpcHandler, RpcOutbox, RpcRegistry, RpcTarget};
pub use signaling_exchange::SignalingExchange;
