/// In-memory transport for E2E testing
/// Routes data channel payloads between nodes of one process without any
/// network I/O. Negotiation is simulated: a link opens on both sides as soon
/// as the offering side applies the answer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use haze_node::transport::{
    ChannelState, IceConnectionState, PeerTransport, TransportEvent, TransportFactory,
};
use haze_node::TransportError;
use haze_shared::{IceCandidate, PeerId, SdpKind, SessionDescription};

type LinkKey = (PeerId, PeerId);

fn unordered(a: &PeerId, b: &PeerId) -> LinkKey {
    if a < b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// One side of a link, keyed by (owner, remote)
struct Endpoint {
    generation: u64,
    channel: ChannelState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    candidates_received: usize,
    events: VecDeque<TransportEvent>,
}

impl Endpoint {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            channel: ChannelState::Connecting,
            local: None,
            remote: None,
            candidates_received: 0,
            events: VecDeque::new(),
        }
    }

    fn open(&mut self) {
        self.channel = ChannelState::Open;
        self.events
            .push_back(TransportEvent::IceStateChanged(IceConnectionState::Checking));
        self.events
            .push_back(TransportEvent::IceStateChanged(IceConnectionState::Connected));
        self.events.push_back(TransportEvent::ChannelOpened);
    }
}

#[derive(Default)]
struct NetworkState {
    endpoints: HashMap<LinkKey, Endpoint>,
    next_generation: u64,
    offer_attempts: HashMap<LinkKey, usize>,
    closes: HashMap<LinkKey, usize>,
    failing_offers: HashSet<PeerId>,
    blocked: HashSet<LinkKey>,
}

/// Every endpoint of an in-memory overlay. Cloning shares the network.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap()
    }

    /// A transport factory for the node `owner`
    pub fn factory(&self, owner: &PeerId) -> LocalTransportFactory {
        LocalTransportFactory {
            owner: owner.clone(),
            network: self.clone(),
        }
    }

    /// Makes every `create_offer` by `owner` fail until healed
    pub fn fail_offers_from(&self, owner: &PeerId) {
        self.lock().failing_offers.insert(owner.clone());
    }

    pub fn heal_offers_from(&self, owner: &PeerId) {
        self.lock().failing_offers.remove(owner);
    }

    /// Negotiation between `a` and `b` still completes, but their channel
    /// never opens
    pub fn block_link(&self, a: &PeerId, b: &PeerId) {
        self.lock().blocked.insert(unordered(a, b));
    }

    pub fn unblock_link(&self, a: &PeerId, b: &PeerId) {
        self.lock().blocked.remove(&unordered(a, b));
    }

    /// How many offers `owner` tried to create towards `remote`, failed ones
    /// included
    pub fn offer_attempts(&self, owner: &PeerId, remote: &PeerId) -> usize {
        self.lock()
            .offer_attempts
            .get(&(owner.clone(), remote.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// How many open links `owner` closed towards `remote`
    pub fn closes(&self, owner: &PeerId, remote: &PeerId) -> usize {
        self.lock()
            .closes
            .get(&(owner.clone(), remote.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Whether both sides of `a`–`b` have an open channel
    pub fn is_open(&self, a: &PeerId, b: &PeerId) -> bool {
        let state = self.lock();
        let open = |key: LinkKey| {
            state
                .endpoints
                .get(&key)
                .is_some_and(|endpoint| endpoint.channel == ChannelState::Open)
        };
        open((a.clone(), b.clone())) && open((b.clone(), a.clone()))
    }

    /// Remote candidates applied on `owner`'s side of the link to `remote`
    pub fn candidates_received(&self, owner: &PeerId, remote: &PeerId) -> usize {
        self.lock()
            .endpoints
            .get(&(owner.clone(), remote.clone()))
            .map(|endpoint| endpoint.candidates_received)
            .unwrap_or(0)
    }
}

pub struct LocalTransportFactory {
    owner: PeerId,
    network: LocalNetwork,
}

impl TransportFactory for LocalTransportFactory {
    fn create(
        &mut self,
        remote: &PeerId,
        _stun_urls: &[String],
    ) -> Result<Box<dyn PeerTransport>, TransportError> {
        let mut state = self.network.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.endpoints.insert(
            (self.owner.clone(), remote.clone()),
            Endpoint::new(generation),
        );

        Ok(Box::new(LocalTransport {
            owner: self.owner.clone(),
            remote: remote.clone(),
            generation,
            network: self.network.clone(),
        }))
    }
}

/// One node's end of one in-memory link
pub struct LocalTransport {
    owner: PeerId,
    remote: PeerId,
    generation: u64,
    network: LocalNetwork,
}

impl LocalTransport {
    fn key(&self) -> LinkKey {
        (self.owner.clone(), self.remote.clone())
    }

    fn peer_key(&self) -> LinkKey {
        (self.remote.clone(), self.owner.clone())
    }

    /// Runs `f` on our endpoint, unless a newer transport replaced it
    fn with_endpoint<T>(
        &self,
        state: &mut NetworkState,
        f: impl FnOnce(&mut Endpoint) -> T,
    ) -> Option<T> {
        state
            .endpoints
            .get_mut(&self.key())
            .filter(|endpoint| endpoint.generation == self.generation)
            .map(f)
    }

    fn candidate(&self) -> IceCandidate {
        let mut candidate = IceCandidate::new(format!(
            "candidate:{} 1 udp 2122260223 local {} typ host",
            self.generation, self.owner
        ));
        candidate.sdp_mid = Some("0".to_string());
        candidate.sdp_mline_index = Some(0);
        candidate
    }

    fn stale() -> TransportError {
        TransportError::CreateFailed {
            reason: "transport was replaced".to_string(),
        }
    }
}

impl PeerTransport for LocalTransport {
    fn create_offer(&mut self) -> Result<SessionDescription, TransportError> {
        let mut state = self.network.lock();
        *state.offer_attempts.entry(self.key()).or_default() += 1;
        if state.failing_offers.contains(&self.owner) {
            return Err(TransportError::OfferFailed {
                reason: "offer generation disabled".to_string(),
            });
        }

        let offer = SessionDescription::offer(format!(
            "v=0 offer {} -> {} #{}",
            self.owner, self.remote, self.generation
        ));
        let candidate = self.candidate();
        self.with_endpoint(&mut state, |endpoint| {
            endpoint.local = Some(offer.clone());
            endpoint
                .events
                .push_back(TransportEvent::IceCandidate(candidate));
        })
        .ok_or_else(Self::stale)?;
        Ok(offer)
    }

    fn create_answer(&mut self) -> Result<SessionDescription, TransportError> {
        let mut state = self.network.lock();
        let answer = SessionDescription::answer(format!(
            "v=0 answer {} -> {} #{}",
            self.owner, self.remote, self.generation
        ));
        let candidate = self.candidate();
        self.with_endpoint(&mut state, |endpoint| {
            if endpoint.remote.is_none() {
                return Err(TransportError::AnswerFailed {
                    reason: "no remote offer".to_string(),
                });
            }
            endpoint.local = Some(answer.clone());
            endpoint
                .events
                .push_back(TransportEvent::IceCandidate(candidate));
            Ok(())
        })
        .ok_or_else(Self::stale)??;
        Ok(answer)
    }

    fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        self.with_endpoint(&mut state, |endpoint| {
            endpoint.remote = Some(description.clone());
        })
        .ok_or_else(Self::stale)?;

        if description.kind != SdpKind::Answer {
            return Ok(());
        }

        // The offerer now holds the answer: open both ends, unless the link
        // is blocked or the answering side has moved on.
        if state.blocked.contains(&unordered(&self.owner, &self.remote)) {
            return Ok(());
        }
        let peer_answered = state.endpoints.get(&self.peer_key()).is_some_and(|peer| {
            peer.channel == ChannelState::Connecting
                && peer
                    .local
                    .as_ref()
                    .is_some_and(|local| local.kind == SdpKind::Answer)
        });
        if !peer_answered {
            return Ok(());
        }

        if let Some(peer) = state.endpoints.get_mut(&self.peer_key()) {
            peer.open();
        }
        self.with_endpoint(&mut state, Endpoint::open);
        Ok(())
    }

    fn add_ice_candidate(&mut self, _candidate: &IceCandidate) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        self.with_endpoint(&mut state, |endpoint| endpoint.candidates_received += 1)
            .ok_or_else(Self::stale)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let open = self
            .with_endpoint(&mut state, |endpoint| endpoint.channel == ChannelState::Open)
            .unwrap_or(false);
        let failed = TransportError::SendFailed {
            payload_size: payload.len(),
        };
        if !open {
            return Err(failed);
        }

        match state.endpoints.get_mut(&self.peer_key()) {
            Some(peer) if peer.channel == ChannelState::Open => {
                peer.events
                    .push_back(TransportEvent::Message(payload.to_vec()));
                Ok(())
            }
            _ => Err(failed),
        }
    }

    fn channel_state(&self) -> ChannelState {
        let mut state = self.network.lock();
        self.with_endpoint(&mut state, |endpoint| endpoint.channel)
            .unwrap_or(ChannelState::Closed)
    }

    fn close(&mut self) {
        let mut state = self.network.lock();
        let was_open = self
            .with_endpoint(&mut state, |endpoint| {
                let was_open = endpoint.channel == ChannelState::Open;
                endpoint.channel = ChannelState::Closed;
                endpoint.events.clear();
                was_open
            })
            .unwrap_or(false);
        if !was_open {
            return;
        }
        *state.closes.entry(self.key()).or_default() += 1;

        if let Some(peer) = state.endpoints.get_mut(&self.peer_key()) {
            if peer.channel == ChannelState::Open {
                peer.channel = ChannelState::Closed;
                peer.events.push_back(TransportEvent::ChannelClosed);
            }
        }
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let mut state = self.network.lock();
        self.with_endpoint(&mut state, |endpoint| endpoint.events.pop_front())
            .flatten()
    }
}
