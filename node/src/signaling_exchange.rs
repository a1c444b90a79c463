use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use haze_shared::{
    IceCandidate, NodeConfig, PeerId, SessionDescription, SignalingMessage,
};

use crate::{
    connection::{
        peer_connection::{PeerConnection, SignalingState},
        peer_registry::{PeerRecord, PeerRegistry, PeerState},
    },
    error::{NodeError, TransportError},
    transport::{IceConnectionState, TransportFactory},
};

/// Moves offers, answers and candidates between this node and its peers.
///
/// Outgoing messages are queued; the owner decides whether each one travels
/// over the overlay or through the rendezvous channel.
pub struct SignalingExchange {
    self_id: PeerId,
    stun_urls: Vec<String>,
    connect_timeout: Duration,
    reconnect_backoff: Duration,
    max_reconnect_attempts: u32,
    hard_cap: u32,
    sent_candidates: HashMap<PeerId, HashSet<IceCandidate>>,
    received_candidates: HashMap<PeerId, HashSet<IceCandidate>>,
    candidate_batches: HashMap<PeerId, Vec<IceCandidate>>,
    outgoing: Vec<SignalingMessage>,
}

impl SignalingExchange {
    pub fn new(self_id: PeerId, config: &NodeConfig) -> Self {
        Self {
            self_id,
            stun_urls: config.stun_urls.clone(),
            connect_timeout: config.connect_timeout,
            reconnect_backoff: config.reconnect_backoff,
            max_reconnect_attempts: config.max_reconnect_attempts,
            hard_cap: config.hard_cap,
            sent_candidates: HashMap::new(),
            received_candidates: HashMap::new(),
            candidate_batches: HashMap::new(),
            outgoing: Vec::new(),
        }
    }

    /// Asks the rendezvous for a first peer to connect to
    pub fn request_bootstrap(&mut self) {
        self.outgoing.push(SignalingMessage::SignalingRequest {
            id: self.self_id.clone(),
        });
    }

    /// Opens a connection to `peer` by sending it an offer. Does nothing when
    /// the peer is not `Disconnected`.
    pub fn connect(
        &mut self,
        registry: &mut PeerRegistry,
        factory: &mut dyn TransportFactory,
        peer: &PeerId,
        now: Instant,
    ) -> Result<(), NodeError> {
        if *peer == self.self_id {
            return Ok(());
        }
        let record = registry.get_or_insert(peer);
        if record.state() != PeerState::Disconnected {
            debug!("connect to {} skipped: already {:?}", peer, record.state());
            return Ok(());
        }

        let result = factory
            .create(peer, &self.stun_urls)
            .and_then(|transport| {
                let mut connection = PeerConnection::new(peer.clone(), transport);
                let offer = connection.create_offer()?;
                Ok((connection, offer))
            });

        match result {
            Ok((connection, offer)) => {
                info!("offering to {}", peer);
                self.forget_peer(peer);
                record.begin_connecting(connection, now + self.connect_timeout);
                self.outgoing.push(SignalingMessage::Offer {
                    id: self.self_id.clone(),
                    target_id: peer.clone(),
                    sdp: offer.sdp,
                });
                Ok(())
            }
            Err(error) => {
                self.fail_negotiation(record, now);
                Err(error.into())
            }
        }
    }

    /// Marks a failed negotiation and schedules a bounded retry
    pub fn fail_negotiation(&mut self, record: &mut PeerRecord, now: Instant) {
        record.set_state(PeerState::Disconnected);
        self.forget_candidates(record.id());

        if record.reconnect_attempts < self.max_reconnect_attempts {
            record.reconnect_attempts += 1;
            record.reconnect_at = Some(now + self.reconnect_backoff);
            warn!(
                "negotiation with {} failed, retry {} of {} in {:?}",
                record.id(),
                record.reconnect_attempts,
                self.max_reconnect_attempts,
                self.reconnect_backoff
            );
        } else {
            record.reconnect_at = None;
            warn!(
                "negotiation with {} failed, giving up after {} retries",
                record.id(),
                record.reconnect_attempts
            );
        }
    }

    /// Handles one signaling message addressed to this node
    pub fn handle(
        &mut self,
        registry: &mut PeerRegistry,
        factory: &mut dyn TransportFactory,
        message: SignalingMessage,
        now: Instant,
    ) -> Result<(), NodeError> {
        match message {
            SignalingMessage::SignalingResponse { target_id, request } => {
                if request != SignalingMessage::REQUEST_OFFER {
                    warn!("unknown rendezvous request `{}`", request);
                    return Ok(());
                }
                self.connect(registry, factory, &target_id, now)
            }
            SignalingMessage::Offer { id, sdp, .. } => {
                self.handle_offer(registry, factory, &id, SessionDescription::offer(sdp), now)
            }
            SignalingMessage::Answer { id, sdp, .. } => {
                self.handle_answer(registry, &id, SessionDescription::answer(sdp), now)
            }
            SignalingMessage::CandidateAdd { id, candidates, .. } => {
                self.handle_candidates(registry, &id, candidates)
            }
            SignalingMessage::SignalingRequest { id } => {
                debug!("ignoring signaling request from {}", id);
                Ok(())
            }
        }
    }

    fn handle_offer(
        &mut self,
        registry: &mut PeerRegistry,
        factory: &mut dyn TransportFactory,
        peer: &PeerId,
        offer: SessionDescription,
        now: Instant,
    ) -> Result<(), NodeError> {
        if *peer == self.self_id {
            return Ok(());
        }
        let degree = registry.committed_degree();
        let record = registry.get_or_insert(peer);

        if let Some(connection) = record.connection_mut() {
            match connection.signaling_state() {
                SignalingState::NegotiationComplete | SignalingState::Answering => {
                    debug!("ignoring offer from {}: already negotiated", peer);
                    return Ok(());
                }
                SignalingState::Offering => {
                    if self.self_id < *peer {
                        debug!("offer glare with {}: keeping our own offer", peer);
                        return Ok(());
                    }
                    debug!("offer glare with {}: answering theirs", peer);
                    connection.force_close();
                }
                SignalingState::Stable => {
                    connection.force_close();
                }
            }
        } else if !record.state().is_linked() && degree >= self.hard_cap {
            debug!("ignoring offer from {}: at hard cap {}", peer, self.hard_cap);
            return Ok(());
        }

        let result = factory
            .create(peer, &self.stun_urls)
            .and_then(|transport| {
                let mut connection = PeerConnection::new(peer.clone(), transport);
                let answer = connection.create_answer(&offer)?;
                Ok((connection, answer))
            });

        match result {
            Ok((connection, Some(answer))) => {
                info!("answering {}", peer);
                self.forget_peer(peer);
                record.begin_connecting(connection, now + self.connect_timeout);
                self.outgoing.push(SignalingMessage::Answer {
                    id: self.self_id.clone(),
                    target_id: peer.clone(),
                    sdp: answer.sdp,
                });
                Ok(())
            }
            Ok((_, None)) => Ok(()),
            Err(error) => {
                self.fail_negotiation(record, now);
                Err(error.into())
            }
        }
    }

    fn handle_answer(
        &mut self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        answer: SessionDescription,
        now: Instant,
    ) -> Result<(), NodeError> {
        let Some(record) = registry.get_mut(peer) else {
            debug!("ignoring answer from unknown peer {}", peer);
            return Ok(());
        };
        let Some(connection) = record.connection_mut() else {
            debug!("ignoring answer from {}: no connection", peer);
            return Ok(());
        };

        match connection.set_remote_description(&answer) {
            Ok(_) => Ok(()),
            Err(error) => {
                self.fail_negotiation(record, now);
                Err(error.into())
            }
        }
    }

    fn handle_candidates(
        &mut self,
        registry: &mut PeerRegistry,
        peer: &PeerId,
        candidates: Vec<IceCandidate>,
    ) -> Result<(), NodeError> {
        let Some(connection) = registry.get_mut(peer).and_then(|r| r.connection_mut()) else {
            debug!("dropping {} candidates from {}: no connection", candidates.len(), peer);
            return Ok(());
        };

        let seen = self.received_candidates.entry(peer.clone()).or_default();
        let mut first_error: Option<TransportError> = None;
        for candidate in candidates {
            if !seen.insert(candidate.clone()) {
                continue;
            }
            if let Err(error) = connection.add_ice_candidate(candidate) {
                warn!("candidate from {} rejected: {}", peer, error);
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Queues a locally gathered candidate for the next batch to `peer`
    pub fn on_local_candidate(&mut self, peer: &PeerId, candidate: IceCandidate) {
        let sent = self.sent_candidates.entry(peer.clone()).or_default();
        if !sent.insert(candidate.clone()) {
            return;
        }
        self.candidate_batches
            .entry(peer.clone())
            .or_default()
            .push(candidate);
    }

    pub fn on_ice_state(&mut self, peer: &PeerId, state: IceConnectionState) {
        if state.is_established() {
            self.forget_candidates(peer);
        }
    }

    /// Drops every candidate exchanged with `peer`, queued ones included.
    /// Each new connection to a peer starts from a clean slate.
    pub fn forget_peer(&mut self, peer: &PeerId) {
        self.forget_candidates(peer);
        self.candidate_batches.remove(peer);
    }

    fn forget_candidates(&mut self, peer: &PeerId) {
        self.sent_candidates.remove(peer);
        self.received_candidates.remove(peer);
    }

    /// Turns the candidates gathered since the last call into one
    /// `candidate_add` per peer
    pub fn flush_candidates(&mut self) {
        let mut batches: Vec<(PeerId, Vec<IceCandidate>)> =
            self.candidate_batches.drain().collect();
        batches.sort_by(|a, b| a.0.cmp(&b.0));

        for (peer, candidates) in batches {
            if candidates.is_empty() {
                continue;
            }
            self.outgoing.push(SignalingMessage::CandidateAdd {
                id: self.self_id.clone(),
                target_id: peer,
                candidates,
            });
        }
    }

    pub fn take_outgoing(&mut self) -> Vec<SignalingMessage> {
        std::mem::take(&mut self.outgoing)
    }
}
