//! The boundary to the negotiated peer transport (a WebRTC-like stack).
//!
//! A node never touches sockets. It asks a `TransportFactory` for one
//! `PeerTransport` per remote peer, drives offer/answer/candidate exchange on
//! it, and polls it for events once per tick.

use haze_shared::{IceCandidate, PeerId, SessionDescription};

use crate::error::TransportError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    /// Whether ICE found a working path
    pub fn is_established(&self) -> bool {
        matches!(self, IceConnectionState::Connected | IceConnectionState::Completed)
    }

    /// Whether the link is gone
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Disconnected
                | IceConnectionState::Failed
                | IceConnectionState::Closed
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// A local candidate was gathered and should be sent to the remote peer
    IceCandidate(IceCandidate),
    IceStateChanged(IceConnectionState),
    ChannelOpened,
    ChannelClosed,
    Message(Vec<u8>),
}

/// One negotiated connection to one remote peer
pub trait PeerTransport: Send {
    /// Generates the local offer and applies it as the local description
    fn create_offer(&mut self) -> Result<SessionDescription, TransportError>;

    /// Generates the local answer; the remote offer must already be set
    fn create_answer(&mut self) -> Result<SessionDescription, TransportError>;

    fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError>;

    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), TransportError>;

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    fn channel_state(&self) -> ChannelState;

    fn close(&mut self);

    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// Creates transports on demand, one per connection attempt
pub trait TransportFactory: Send {
    fn create(
        &mut self,
        remote: &PeerId,
        stun_urls: &[String],
    ) -> Result<Box<dyn PeerTransport>, TransportError>;
}
