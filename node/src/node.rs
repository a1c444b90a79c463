use std::{
    collections::VecDeque,
    mem,
    time::{Duration, Instant},
};

use log::{debug, info, trace, warn};

use haze_shared::{
    Envelope, MessageInfo, MessageType, NodeConfig, PeerDescriptor, PeerId, Position,
    RoutingTable, RpcMessage, RpcSignature, RpcValue, SignalingMessage, Timer,
};

use crate::{
    connection::peer_registry::{PeerRegistry, PeerState},
    dispatcher::{Delivery, Dispatcher},
    error::NodeError,
    events::Events,
    optimizer::{ConnectionOptimizer, LeaderTimer, OptimizerAction, SendingOptimizer},
    rendezvous::RendezvousChannel,
    rpc_registry::{RpcOutbox, RpcRegistry, RpcTarget},
    signaling_exchange::SignalingExchange,
    transport::{TransportEvent, TransportFactory},
};

/// One member of the overlay. Owns every piece of per-node state; the host
/// drives it by calling `receive` once per scheduler tick.
pub struct Node {
    // Identity
    id: PeerId,
    config: NodeConfig,
    position: Position,
    // Peers
    registry: PeerRegistry,
    routing: RoutingTable,
    dispatcher: Dispatcher,
    rpc: RpcRegistry,
    signaling: SignalingExchange,
    // Topology
    optimizer: ConnectionOptimizer,
    leader: LeaderTimer,
    sending: SendingOptimizer,
    // IO
    factory: Box<dyn TransportFactory>,
    rendezvous: Box<dyn RendezvousChannel>,
    // Timers
    descriptor_timer: Timer,
    optimize_timer: Timer,
    cooldown_timer: Timer,
    descriptor_seq: u64,
    last_tick: Instant,
    // Events
    incoming_events: Events,
    is_shut_down: bool,
}

impl Node {
    /// Create a Node with a freshly generated id
    pub fn new(
        config: NodeConfig,
        factory: Box<dyn TransportFactory>,
        rendezvous: Box<dyn RendezvousChannel>,
        now: Instant,
    ) -> Self {
        Self::with_id(PeerId::generate(), config, factory, rendezvous, now)
    }

    /// Create a Node with a caller-chosen id
    pub fn with_id(
        id: PeerId,
        config: NodeConfig,
        factory: Box<dyn TransportFactory>,
        rendezvous: Box<dyn RendezvousChannel>,
        now: Instant,
    ) -> Self {
        info!("node {} starting", id);

        let leader = LeaderTimer::new(config.leader.clone(), fastrand::Rng::new());

        Self {
            registry: PeerRegistry::new(),
            routing: RoutingTable::new(id.clone(), config.route_expiry),
            dispatcher: Dispatcher::new(id.clone()),
            rpc: RpcRegistry::new(),
            signaling: SignalingExchange::new(id.clone(), &config),
            optimizer: ConnectionOptimizer::new(id.clone()),
            leader,
            sending: SendingOptimizer::new(&config.send_tiers, now),
            factory,
            rendezvous,
            descriptor_timer: Timer::new(config.descriptor_interval, now),
            optimize_timer: Timer::new(config.optimize_interval, now),
            cooldown_timer: Timer::new(Duration::from_secs(1), now),
            descriptor_seq: 0,
            last_tick: now,
            incoming_events: Events::new(),
            is_shut_down: false,
            position: Position::ORIGIN,
            config,
            id,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Moves this node. Takes effect on the next descriptor broadcast and
    /// optimization pass.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Asks the rendezvous for a first peer to connect to
    pub fn bootstrap(&mut self) {
        info!("node {} requesting bootstrap", self.id);
        self.signaling.request_bootstrap();
    }

    /// Opens a connection to `peer` right away, bypassing the optimizer
    pub fn connect(&mut self, peer: &PeerId) {
        let now = self.last_tick;
        self.connect_peer(peer, now);
    }

    /// Closes the link to `peer` right away, bypassing the optimizer
    pub fn disconnect(&mut self, peer: &PeerId) {
        self.close_link(peer);
    }

    /// Must be called regularly. Drains the rendezvous channel and every
    /// transport, runs due timers, and returns what happened since the last
    /// call.
    pub fn receive(&mut self, now: Instant) -> Events {
        if self.is_shut_down {
            return mem::take(&mut self.incoming_events);
        }

        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.leader.tick(elapsed);

        self.receive_rendezvous(now);
        self.receive_transports(now);
        self.check_deadlines(now);

        if self.cooldown_timer.tick(now) {
            self.tick_cooldowns();
        }
        if self.descriptor_timer.tick(now) {
            self.broadcast_descriptors(now);
        }
        if self.optimize_timer.tick(now) {
            self.routing.prune(now);
            self.optimize(now);
            self.sending.categorize(&self.position, &self.registry);
        }
        self.send_tiered_state(now);

        self.signaling.flush_candidates();
        self.send_signaling(now);

        mem::take(&mut self.incoming_events)
    }

    /// Tears down every connection. The node does nothing further afterwards.
    pub fn shutdown(&mut self) {
        info!("node {} shutting down", self.id);
        for record in self.registry.iter_mut() {
            if let Some(connection) = record.connection_mut() {
                connection.force_close();
            }
            record.set_state(PeerState::Disconnected);
        }
        self.sending.clear();
        self.is_shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.is_shut_down
    }

    // Messages

    /// Sends an envelope of `kind` to `target`, over the overlay if possible.
    /// When no live path exists but a connection to `target` is still
    /// negotiating, the envelope waits in that connection. Otherwise it is
    /// dropped.
    pub fn send(&mut self, target: &PeerId, kind: MessageType, payload: Vec<u8>) {
        let envelope = Envelope::new(self.id.clone(), target.clone(), kind, payload);
        let now = self.last_tick;
        self.send_envelope(envelope, true, now);
    }

    /// Sends an envelope of `kind` to every direct neighbor
    pub fn send_all(&mut self, kind: MessageType, payload: Vec<u8>) {
        let now = self.last_tick;
        for neighbor in self.registry.linked_ids() {
            let envelope = Envelope::new(self.id.clone(), neighbor, kind, payload.clone());
            self.send_envelope(envelope, false, now);
        }
    }

    /// Replaces the state payload the sending tiers repeat to neighbors
    pub fn publish_state(&mut self, kind: MessageType, payload: Vec<u8>) {
        self.sending.publish(kind, payload);
    }

    // RPC

    pub fn register_rpc<F>(&mut self, key: impl Into<String>, signature: RpcSignature, handler: F)
    where
        F: FnMut(&[RpcValue], &mut RpcOutbox) + Send + 'static,
    {
        self.rpc.register(key, signature, handler);
    }

    pub fn unregister_rpc(&mut self, key: &str) {
        self.rpc.unregister(key);
    }

    pub fn rpc(&mut self, target: &PeerId, key: impl Into<String>, args: Vec<RpcValue>) {
        let mut outbox = RpcOutbox::new();
        outbox.rpc(target, key, args);
        self.run_outbox(outbox);
    }

    pub fn rpc_all(&mut self, key: impl Into<String>, args: Vec<RpcValue>) {
        let mut outbox = RpcOutbox::new();
        outbox.rpc_all(key, args);
        self.run_outbox(outbox);
    }

    pub fn rpc_all_with_self(&mut self, key: impl Into<String>, args: Vec<RpcValue>) {
        let mut outbox = RpcOutbox::new();
        outbox.rpc_all_with_self(key, args);
        self.run_outbox(outbox);
    }

    // Inspection

    pub fn peer_state(&self, peer: &PeerId) -> PeerState {
        self.registry.state(peer)
    }

    /// Number of live links
    pub fn degree(&self) -> u32 {
        self.registry.degree()
    }

    /// Ids of every live link, sorted
    pub fn linked_peers(&self) -> Vec<PeerId> {
        self.registry.linked_ids()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn leader(&self) -> &LeaderTimer {
        &self.leader
    }

    // Private methods

    fn push_error(&mut self, error: impl Into<NodeError>) {
        self.incoming_events.push_error(error.into());
    }

    fn receive_rendezvous(&mut self, now: Instant) {
        loop {
            match self.rendezvous.receive() {
                Ok(Some(message)) => {
                    // no overlay path from the sender; ours towards it is stale
                    if let Some(sender) = message.sender_id() {
                        self.routing.remove(sender);
                    }
                    self.handle_signaling(message, now)
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("node {}: unreadable rendezvous message: {}", self.id, error);
                    self.push_error(error);
                }
            }
        }
    }

    fn handle_signaling(&mut self, message: SignalingMessage, now: Instant) {
        let result = self.signaling.handle(
            &mut self.registry,
            self.factory.as_mut(),
            message,
            now,
        );
        if let Err(error) = result {
            warn!("node {}: signaling failed: {}", self.id, error);
            self.push_error(error);
        }
    }

    fn receive_transports(&mut self, now: Instant) {
        for peer in self.registry.ids_with_connection() {
            loop {
                let event = self
                    .registry
                    .get_mut(&peer)
                    .and_then(|record| record.connection_mut())
                    .and_then(|connection| connection.poll_event());
                let Some(event) = event else {
                    break;
                };
                self.handle_transport_event(&peer, event, now);
            }
        }
    }

    fn handle_transport_event(&mut self, peer: &PeerId, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::IceCandidate(candidate) => {
                self.signaling.on_local_candidate(peer, candidate);
            }
            TransportEvent::IceStateChanged(state) => {
                self.signaling.on_ice_state(peer, state);
                if state.is_lost() {
                    self.on_disconnected(peer);
                }
            }
            TransportEvent::ChannelOpened => self.on_connected(peer, now),
            TransportEvent::ChannelClosed => self.on_disconnected(peer),
            TransportEvent::Message(bytes) => self.receive_envelope(peer, bytes, now),
        }
    }

    fn on_connected(&mut self, peer: &PeerId, now: Instant) {
        let Some(record) = self.registry.get_mut(peer) else {
            return;
        };
        if record.state().is_linked() {
            return;
        }
        record.set_state(PeerState::Connected);
        record.connect_deadline = None;
        record.reconnect_at = None;
        record.reconnect_attempts = 0;
        if let Some(connection) = record.connection_mut() {
            connection.flush_outgoing();
        }

        info!("node {}: connected to {}", self.id, peer);
        self.incoming_events.push_connection(peer);

        let descriptor = self.next_descriptor();
        let envelope = Envelope::new(
            self.id.clone(),
            peer.clone(),
            MessageType::PeerData,
            descriptor.to_bytes(),
        );
        self.send_envelope(envelope, false, now);

        if let Some((kind, payload)) = self.sending.latest().cloned() {
            let envelope = Envelope::new(self.id.clone(), peer.clone(), kind, payload);
            self.send_envelope(envelope, false, now);
        }
    }

    fn on_disconnected(&mut self, peer: &PeerId) {
        let Some(record) = self.registry.get_mut(peer) else {
            return;
        };
        let previous = record.state();
        if previous == PeerState::Disconnected {
            return;
        }
        record.set_state(PeerState::Disconnected);
        record.block_cooldown_remaining = self.config.block_cooldown_secs;
        self.sending.remove_peer(peer);
        self.signaling.forget_peer(peer);

        if previous.is_linked() {
            info!("node {}: disconnected from {}", self.id, peer);
            self.incoming_events.push_disconnection(peer);
        } else {
            debug!("node {}: negotiation with {} ended", self.id, peer);
        }
    }

    fn check_deadlines(&mut self, now: Instant) {
        let mut timed_out = Vec::new();
        let mut reconnects = Vec::new();

        for record in self.registry.iter_mut() {
            match record.state() {
                PeerState::Connecting => {
                    if record.connect_deadline.is_some_and(|deadline| deadline <= now) {
                        timed_out.push(record.id().clone());
                    }
                }
                PeerState::Disconnecting => {
                    if record.disconnecting_until.is_some_and(|until| until <= now) {
                        debug!("disconnect request to {} went unanswered", record.id());
                        record.disconnecting_until = None;
                        record.set_state(PeerState::Connected);
                    }
                }
                PeerState::Disconnected => {
                    if record.reconnect_at.is_some_and(|at| at <= now) {
                        record.reconnect_at = None;
                        reconnects.push(record.id().clone());
                    }
                }
                PeerState::Connected => {}
            }
        }

        timed_out.sort();
        for peer in timed_out {
            warn!("node {}: connecting to {} timed out", self.id, peer);
            self.on_disconnected(&peer);
        }

        reconnects.sort();
        for peer in reconnects {
            info!("node {}: reconnecting to {}", self.id, peer);
            self.connect_peer(&peer, now);
        }
    }

    fn tick_cooldowns(&mut self) {
        for record in self.registry.iter_mut() {
            record.block_cooldown_remaining = record.block_cooldown_remaining.saturating_sub(1);
        }
    }

    fn next_descriptor(&mut self) -> PeerDescriptor {
        self.descriptor_seq += 1;
        PeerDescriptor {
            id: self.id.clone(),
            position: self.position,
            current_degree: self.registry.degree(),
            min_degree: self.config.min_degree,
            soft_limit: self.config.soft_limit,
            hard_cap: self.config.hard_cap,
            seq: self.descriptor_seq,
        }
    }

    /// Our own descriptor to every neighbor, plus every fresh descriptor of a
    /// peer we can still reach, except towards the neighbor we learned it
    /// through
    fn broadcast_descriptors(&mut self, now: Instant) {
        let neighbors = self.registry.linked_ids();
        if neighbors.is_empty() {
            return;
        }

        let own = self.next_descriptor().to_bytes();
        let gossip: Vec<(PeerId, Option<PeerId>, Vec<u8>)> = self
            .registry
            .iter()
            .filter(|record| record.is_fresh(now))
            .filter_map(|record| record.descriptor())
            .filter_map(|descriptor| {
                let via = self.routing.get(&descriptor.id, now).cloned();
                let reachable = self.registry.is_linked(&descriptor.id)
                    || via.as_ref().is_some_and(|hop| self.registry.is_linked(hop));
                reachable.then(|| (descriptor.id.clone(), via, descriptor.to_bytes()))
            })
            .collect();

        for neighbor in neighbors {
            let envelope = Envelope::new(
                self.id.clone(),
                neighbor.clone(),
                MessageType::PeerData,
                own.clone(),
            );
            self.send_envelope(envelope, false, now);

            for (origin, via, bytes) in gossip.iter() {
                if *origin == neighbor || via.as_ref() == Some(&neighbor) {
                    continue;
                }
                let envelope = Envelope::new(
                    self.id.clone(),
                    neighbor.clone(),
                    MessageType::PeerData,
                    bytes.clone(),
                );
                self.send_envelope(envelope, false, now);
            }
        }
    }

    fn send_tiered_state(&mut self, now: Instant) {
        let due = self.sending.due(now);
        let Some((kind, payload)) = self.sending.latest().cloned() else {
            return;
        };
        for peer in due {
            let envelope = Envelope::new(self.id.clone(), peer, kind, payload.clone());
            self.send_envelope(envelope, false, now);
        }
    }

    fn send_signaling(&mut self, now: Instant) {
        for message in self.signaling.take_outgoing() {
            let overlay_target = message
                .target_id()
                .filter(|target| self.has_live_route(target, now))
                .cloned();

            match overlay_target {
                Some(target) => match message.to_bytes() {
                    Ok(payload) => {
                        trace!("{} to {} over the overlay", message.type_name(), target);
                        let envelope =
                            Envelope::new(self.id.clone(), target, MessageType::Signaling, payload);
                        self.send_envelope(envelope, false, now);
                    }
                    Err(error) => {
                        warn!("node {}: cannot encode {}: {}", self.id, message.type_name(), error);
                        self.push_error(error);
                    }
                },
                None => {
                    if let Err(error) = self.rendezvous.send(&message) {
                        warn!(
                            "node {}: rendezvous rejected {}: {}",
                            self.id,
                            message.type_name(),
                            error
                        );
                        self.push_error(error);
                    }
                }
            }
        }
    }

    fn has_live_route(&self, target: &PeerId, now: Instant) -> bool {
        matches!(
            self.dispatcher
                .route(target, None, &self.registry, &self.routing, now),
            Delivery::Forward(_)
        )
    }

    fn send_envelope(&mut self, envelope: Envelope, wait_for_channel: bool, now: Instant) {
        match self
            .dispatcher
            .route(&envelope.target_id, None, &self.registry, &self.routing, now)
        {
            Delivery::Local => {
                let self_id = self.id.clone();
                self.deliver(envelope, &self_id, now);
            }
            Delivery::Forward(hop) => self.send_bytes(&hop, envelope.to_bytes()),
            Delivery::Drop => {
                let target = envelope.target_id.clone();
                let pending = self
                    .registry
                    .get_mut(&target)
                    .filter(|record| record.state() == PeerState::Connecting)
                    .and_then(|record| record.connection_mut());
                match pending {
                    Some(connection) if wait_for_channel => connection.send(envelope.to_bytes()),
                    _ => debug!("node {}: no route to {}, dropping", self.id, target),
                }
            }
        }
    }

    fn send_bytes(&mut self, neighbor: &PeerId, bytes: Vec<u8>) {
        match self
            .registry
            .get_mut(neighbor)
            .and_then(|record| record.connection_mut())
        {
            Some(connection) => connection.send(bytes),
            None => warn!("node {}: {} has no connection, dropping", self.id, neighbor),
        }
    }

    fn receive_envelope(&mut self, neighbor: &PeerId, bytes: Vec<u8>, now: Instant) {
        let envelope = match Envelope::from_bytes(&bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!("node {}: malformed envelope from {}", self.id, neighbor);
                self.push_error(error);
                return;
            }
        };

        match self.dispatcher.route(
            &envelope.target_id,
            Some(neighbor),
            &self.registry,
            &self.routing,
            now,
        ) {
            Delivery::Local => {
                self.routing.add(&envelope.sender_id, neighbor, now);
                self.deliver(envelope, neighbor, now);
            }
            Delivery::Forward(hop) => {
                trace!("forwarding {} -> {} via {}", envelope.sender_id, envelope.target_id, hop);
                self.send_bytes(&hop, bytes);
            }
            Delivery::Drop => {}
        }
    }

    fn deliver(&mut self, envelope: Envelope, neighbor: &PeerId, now: Instant) {
        let Envelope {
            sender_id,
            kind,
            payload,
            ..
        } = envelope;

        match kind {
            MessageType::Rpc => match RpcMessage::from_bytes(&payload) {
                Ok(message) => {
                    let info = MessageInfo {
                        source_id: sender_id,
                        sender_id: neighbor.clone(),
                    };
                    let mut outbox = RpcOutbox::new();
                    self.invoke_rpc(message, info, &mut outbox);
                    self.run_outbox(outbox);
                }
                Err(error) => {
                    warn!("node {}: malformed RPC from {}", self.id, sender_id);
                    self.push_error(error);
                }
            },
            MessageType::PeerData => self.receive_descriptor(neighbor, &payload, now),
            MessageType::Signaling => match SignalingMessage::from_bytes(&payload) {
                Ok(message) => self.handle_signaling(message, now),
                Err(error) => {
                    warn!("node {}: malformed signaling from {}", self.id, sender_id);
                    self.push_error(error);
                }
            },
            MessageType::LeaderNotify => {
                debug!("node {}: {} led this round", self.id, sender_id);
                self.leader.on_notify();
            }
            MessageType::ConnectRequest => self.receive_connect_request(&sender_id, now),
            MessageType::DisconnectRequest => self.receive_disconnect_request(&sender_id),
            MessageType::Application(application_kind) => {
                let info = MessageInfo {
                    source_id: sender_id,
                    sender_id: neighbor.clone(),
                };
                self.incoming_events
                    .push_message(info, application_kind, payload);
            }
        }
    }

    fn invoke_rpc(&mut self, message: RpcMessage, info: MessageInfo, outbox: &mut RpcOutbox) {
        let RpcMessage { method_key, args } = message;
        if let Err(error) = self.rpc.invoke(&method_key, args, info, outbox) {
            warn!("node {}: RPC `{}` failed: {}", self.id, method_key, error);
            self.push_error(error);
        }
    }

    /// Sends every queued call, including calls queued by handlers that run
    /// locally along the way
    fn run_outbox(&mut self, mut outbox: RpcOutbox) {
        let now = self.last_tick;
        let mut pending: VecDeque<(RpcTarget, RpcMessage)> = outbox.take().into();

        while let Some((target, message)) = pending.pop_front() {
            let run_locally = match &target {
                RpcTarget::Peer(peer) if *peer == self.id => true,
                RpcTarget::Peer(peer) => {
                    let envelope = Envelope::new(
                        self.id.clone(),
                        peer.clone(),
                        MessageType::Rpc,
                        message.to_bytes(),
                    );
                    self.send_envelope(envelope, true, now);
                    false
                }
                RpcTarget::All | RpcTarget::AllWithSelf => {
                    self.send_all(MessageType::Rpc, message.to_bytes());
                    target == RpcTarget::AllWithSelf
                }
            };

            if run_locally {
                let info = MessageInfo {
                    source_id: self.id.clone(),
                    sender_id: self.id.clone(),
                };
                let mut local = RpcOutbox::new();
                self.invoke_rpc(message, info, &mut local);
                pending.extend(local.take());
            }
        }
    }

    fn receive_descriptor(&mut self, neighbor: &PeerId, payload: &[u8], now: Instant) {
        let descriptor = match PeerDescriptor::from_bytes(payload) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!("node {}: malformed descriptor from {}", self.id, neighbor);
                self.push_error(error);
                return;
            }
        };

        if descriptor.id.is_empty() || descriptor.id == self.id {
            return;
        }
        self.routing.add(&descriptor.id, neighbor, now);

        let fresh_until = now + self.config.descriptor_ttl;
        let record = self.registry.get_or_insert(&descriptor.id);
        if !record.apply_descriptor(&descriptor, fresh_until) {
            trace!("stale descriptor {} for {}", descriptor.seq, descriptor.id);
            return;
        }

        self.optimize(now);
    }

    /// Runs one optimization pass and, if this node may lead, acts on it
    fn optimize(&mut self, now: Instant) {
        let actions = self
            .optimizer
            .run(&self.config, &self.position, &mut self.registry);
        if actions.is_empty() {
            return;
        }
        if !self.leader.try_lead() {
            trace!("node {}: holding {} actions for leadership", self.id, actions.len());
            return;
        }

        if self.leader.is_enabled() {
            debug!("node {}: leading with {} actions", self.id, actions.len());
            self.send_all(MessageType::LeaderNotify, Vec::new());
        }

        for action in actions {
            match action {
                OptimizerAction::Connect(peer) => self.request_connect(&peer, now),
                OptimizerAction::Disconnect(peer) => self.request_disconnect(&peer, now),
            }
        }
    }

    /// The smaller id of a pair opens the link; the larger one asks it to
    fn request_connect(&mut self, peer: &PeerId, now: Instant) {
        if self.id < *peer {
            self.connect_peer(peer, now);
        } else {
            debug!("node {}: asking {} to connect", self.id, peer);
            let envelope = Envelope::new(
                self.id.clone(),
                peer.clone(),
                MessageType::ConnectRequest,
                Vec::new(),
            );
            self.send_envelope(envelope, false, now);
        }
    }

    /// The smaller id of a pair closes the link; the larger one asks it to
    fn request_disconnect(&mut self, peer: &PeerId, now: Instant) {
        if self.id < *peer {
            self.close_link(peer);
            return;
        }

        debug!("node {}: asking {} to disconnect", self.id, peer);
        let envelope = Envelope::new(
            self.id.clone(),
            peer.clone(),
            MessageType::DisconnectRequest,
            Vec::new(),
        );
        self.send_envelope(envelope, false, now);

        if let Some(record) = self.registry.get_mut(peer) {
            if record.state() == PeerState::Connected {
                record.set_state(PeerState::Disconnecting);
                record.disconnecting_until = Some(now + self.config.disconnect_request_timeout);
            }
        }
    }

    fn receive_connect_request(&mut self, requester: &PeerId, now: Instant) {
        let degree = self.registry.committed_degree();
        let hard_cap = self.config.hard_cap;
        let record = self.registry.get_or_insert(requester);

        let declined = self.id > *requester
            || record.state() != PeerState::Disconnected
            || record.block_cooldown_remaining > 0
            || degree >= hard_cap
            || (record.has_descriptor() && record.current_degree >= record.hard_cap);
        if declined {
            debug!(
                "node {}: declining connect request from {} ({:?})",
                self.id,
                requester,
                record.state()
            );
            return;
        }

        self.connect_peer(requester, now);
    }

    fn receive_disconnect_request(&mut self, requester: &PeerId) {
        if !self.registry.is_linked(requester) {
            return;
        }
        if self.optimizer.wants(requester) {
            debug!("node {}: keeping {}, still among its nearest", self.id, requester);
            return;
        }
        self.close_link(requester);
    }

    fn connect_peer(&mut self, peer: &PeerId, now: Instant) {
        let result = self
            .signaling
            .connect(&mut self.registry, self.factory.as_mut(), peer, now);
        if let Err(error) = result {
            warn!("node {}: cannot connect to {}: {}", self.id, peer, error);
            self.push_error(error);
        }
    }

    fn close_link(&mut self, peer: &PeerId) {
        if let Some(connection) = self
            .registry
            .get_mut(peer)
            .and_then(|record| record.connection_mut())
        {
            connection.close();
        }
        self.on_disconnected(peer);
    }
}
