use haze_shared::{SignalingError, SignalingMessage};

/// The connection to the rendezvous service, used for first contact and for
/// signaling with peers not yet reachable over the overlay.
pub trait RendezvousChannel: Send {
    fn send(&mut self, message: &SignalingMessage) -> Result<(), SignalingError>;

    /// The next message from the rendezvous, if one is waiting
    fn receive(&mut self) -> Result<Option<SignalingMessage>, SignalingError>;
}
