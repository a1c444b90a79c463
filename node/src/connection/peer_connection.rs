use std::collections::VecDeque;

use log::{debug, warn};

use haze_shared::{IceCandidate, PeerId, SessionDescription};

use crate::{
    error::TransportError,
    transport::{ChannelState, PeerTransport, TransportEvent},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    Offering,
    Answering,
    NegotiationComplete,
}

impl SignalingState {
    pub fn name(&self) -> &'static str {
        match self {
            SignalingState::Stable => "Stable",
            SignalingState::Offering => "Offering",
            SignalingState::Answering => "Answering",
            SignalingState::NegotiationComplete => "NegotiationComplete",
        }
    }
}

/// The transport to one remote peer plus where its offer/answer exchange
/// stands. Outbound payloads sent before the data channel opens wait here.
pub struct PeerConnection {
    remote_id: PeerId,
    transport: Box<dyn PeerTransport>,
    signaling_state: SignalingState,
    has_remote_description: bool,
    pending_candidates: Vec<IceCandidate>,
    outgoing: VecDeque<Vec<u8>>,
}

impl PeerConnection {
    pub fn new(remote_id: PeerId, transport: Box<dyn PeerTransport>) -> Self {
        Self {
            remote_id,
            transport,
            signaling_state: SignalingState::Stable,
            has_remote_description: false,
            pending_candidates: Vec::new(),
            outgoing: VecDeque::new(),
        }
    }

    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.signaling_state
    }

    pub fn channel_state(&self) -> ChannelState {
        self.transport.channel_state()
    }

    pub fn create_offer(&mut self) -> Result<SessionDescription, TransportError> {
        if self.signaling_state != SignalingState::Stable {
            return Err(TransportError::NegotiationInProgress {
                state: self.signaling_state.name(),
            });
        }

        self.signaling_state = SignalingState::Offering;
        match self.transport.create_offer() {
            Ok(offer) => Ok(offer),
            Err(error) => {
                self.signaling_state = SignalingState::Stable;
                Err(error)
            }
        }
    }

    /// Answers a remote offer. Returns `Ok(None)` when the offer is ignored
    /// because a negotiation is already under way or finished.
    pub fn create_answer(
        &mut self,
        remote: &SessionDescription,
    ) -> Result<Option<SessionDescription>, TransportError> {
        if self.signaling_state != SignalingState::Stable {
            debug!(
                "ignoring offer from {}: signaling state is {}",
                self.remote_id,
                self.signaling_state.name()
            );
            return Ok(None);
        }

        self.signaling_state = SignalingState::Answering;
        if let Err(error) = self.apply_remote_description(remote) {
            self.signaling_state = SignalingState::Stable;
            return Err(error);
        }
        match self.transport.create_answer() {
            Ok(answer) => {
                self.signaling_state = SignalingState::NegotiationComplete;
                Ok(Some(answer))
            }
            Err(error) => {
                self.signaling_state = SignalingState::Stable;
                Err(error)
            }
        }
    }

    /// Completes our own offer with the remote answer. Returns `Ok(false)`
    /// when we are not offering, so the answer is stale.
    pub fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<bool, TransportError> {
        if self.signaling_state != SignalingState::Offering {
            debug!(
                "ignoring answer from {}: signaling state is {}",
                self.remote_id,
                self.signaling_state.name()
            );
            return Ok(false);
        }

        match self.apply_remote_description(description) {
            Ok(()) => {
                self.signaling_state = SignalingState::NegotiationComplete;
                Ok(true)
            }
            Err(error) => {
                self.signaling_state = SignalingState::Stable;
                Err(error)
            }
        }
    }

    fn apply_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError> {
        self.transport.set_remote_description(description)?;
        self.has_remote_description = true;

        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(error) = self.transport.add_ice_candidate(&candidate) {
                warn!("candidate from {} rejected: {}", self.remote_id, error);
            }
        }
        Ok(())
    }

    /// Applies a remote candidate, or holds it until the remote description
    /// is known
    pub fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), TransportError> {
        if !self.has_remote_description {
            self.pending_candidates.push(candidate);
            return Ok(());
        }
        self.transport.add_ice_candidate(&candidate)
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Sends right away on an open channel, waits for the channel while
    /// negotiating, drops otherwise
    pub fn send(&mut self, payload: Vec<u8>) {
        match self.transport.channel_state() {
            ChannelState::Open => {
                if let Err(error) = self.transport.send(&payload) {
                    warn!("send to {} failed: {}", self.remote_id, error);
                }
            }
            ChannelState::Connecting => {
                self.outgoing.push_back(payload);
            }
            ChannelState::Closing | ChannelState::Closed => {
                warn!(
                    "dropping {} bytes for {}: data channel is not open",
                    payload.len(),
                    self.remote_id
                );
            }
        }
    }

    pub fn queued_sends(&self) -> usize {
        self.outgoing.len()
    }

    /// Sends everything that waited for the channel to open
    pub fn flush_outgoing(&mut self) {
        while let Some(payload) = self.outgoing.pop_front() {
            if let Err(error) = self.transport.send(&payload) {
                warn!("send to {} failed: {}", self.remote_id, error);
            }
        }
    }

    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        self.transport.poll_event()
    }

    pub fn close(&mut self) {
        self.outgoing.clear();
        self.transport.close();
    }

    /// Closes and forgets all negotiation progress immediately
    pub fn force_close(&mut self) {
        self.close();
        self.pending_candidates.clear();
        self.has_remote_description = false;
        self.signaling_state = SignalingState::Stable;
    }
}
