use std::{
    collections::HashMap,
    time::Instant,
};

use log::{debug, warn};

use haze_shared::{PeerDescriptor, PeerId, Position};

use super::peer_connection::PeerConnection;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PeerState {
    Disconnected,
    Connecting,
    Connected,
    /// We asked the peer to close the link and are waiting for it
    Disconnecting,
}

impl PeerState {
    /// Whether the state counts towards a node's degree
    pub fn is_linked(&self) -> bool {
        matches!(self, PeerState::Connected | PeerState::Disconnecting)
    }
}

/// Everything a node knows about one other peer
pub struct PeerRecord {
    id: PeerId,
    state: PeerState,
    connection: Option<PeerConnection>,
    pub position: Position,
    pub current_degree: u32,
    pub min_degree: u32,
    pub soft_limit: u32,
    pub hard_cap: u32,
    pub descriptor_seq: Option<u64>,
    pub fresh_until: Option<Instant>,
    pub distance_to_self: f32,
    pub block_cooldown_remaining: u32,
    pub connect_deadline: Option<Instant>,
    pub reconnect_at: Option<Instant>,
    pub reconnect_attempts: u32,
    pub disconnecting_until: Option<Instant>,
}

impl PeerRecord {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            state: PeerState::Disconnected,
            connection: None,
            position: Position::ORIGIN,
            current_degree: 0,
            min_degree: 0,
            soft_limit: 0,
            hard_cap: 0,
            descriptor_seq: None,
            fresh_until: None,
            distance_to_self: f32::MAX,
            block_cooldown_remaining: 0,
            connect_deadline: None,
            reconnect_at: None,
            reconnect_attempts: 0,
            disconnecting_until: None,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Moves to `state`. Going `Disconnected` closes and drops the connection,
    /// so no connection ever outlives a disconnect.
    pub fn set_state(&mut self, state: PeerState) {
        if self.state != state {
            debug!("peer {}: {:?} -> {:?}", self.id, self.state, state);
        }
        self.state = state;
        if state == PeerState::Disconnected {
            if let Some(mut connection) = self.connection.take() {
                connection.close();
            }
            self.connect_deadline = None;
            self.disconnecting_until = None;
        }
    }

    /// Installs a freshly negotiated connection and enters `Connecting`
    pub fn begin_connecting(&mut self, connection: PeerConnection, deadline: Instant) {
        if let Some(mut previous) = self.connection.take() {
            previous.force_close();
        }
        self.connection = Some(connection);
        self.connect_deadline = Some(deadline);
        self.set_state(PeerState::Connecting);
    }

    pub fn connection(&self) -> Option<&PeerConnection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut PeerConnection> {
        self.connection.as_mut()
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor_seq.is_some()
    }

    /// Takes in a descriptor unless an equal or newer one was already seen.
    /// Returns whether the record changed.
    pub fn apply_descriptor(&mut self, descriptor: &PeerDescriptor, fresh_until: Instant) -> bool {
        if let Some(seq) = self.descriptor_seq {
            if descriptor.seq <= seq {
                return false;
            }
        }

        self.position = descriptor.position;
        self.current_degree = descriptor.current_degree;
        self.min_degree = descriptor.min_degree;
        self.soft_limit = descriptor.soft_limit;
        self.hard_cap = descriptor.hard_cap;
        self.descriptor_seq = Some(descriptor.seq);
        self.fresh_until = Some(fresh_until);
        true
    }

    /// The descriptor as we last heard it, for re-gossip
    pub fn descriptor(&self) -> Option<PeerDescriptor> {
        let seq = self.descriptor_seq?;
        Some(PeerDescriptor {
            id: self.id.clone(),
            position: self.position,
            current_degree: self.current_degree,
            min_degree: self.min_degree,
            soft_limit: self.soft_limit,
            hard_cap: self.hard_cap,
            seq,
        })
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.fresh_until.is_some_and(|until| until > now)
    }
}

/// All peer records, keyed by id. Records are created on first mention and
/// removed only by `unregister`.
#[derive(Default)]
pub struct PeerRegistry {
    records: HashMap<PeerId, PeerRecord>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &PeerId) -> Option<&mut PeerRecord> {
        self.records.get_mut(id)
    }

    pub fn get_or_insert(&mut self, id: &PeerId) -> &mut PeerRecord {
        self.records
            .entry(id.clone())
            .or_insert_with(|| PeerRecord::new(id.clone()))
    }

    pub fn unregister(&mut self, id: &PeerId) {
        match self.records.remove(id) {
            Some(mut record) => record.set_state(PeerState::Disconnected),
            None => warn!("unregister: peer {} is not registered", id),
        }
    }

    pub fn state(&self, id: &PeerId) -> PeerState {
        self.records
            .get(id)
            .map(|record| record.state())
            .unwrap_or(PeerState::Disconnected)
    }

    /// Number of live links
    pub fn degree(&self) -> u32 {
        self.records
            .values()
            .filter(|record| record.state().is_linked())
            .count() as u32
    }

    /// Live links plus connections still negotiating
    pub fn committed_degree(&self) -> u32 {
        self.records
            .values()
            .filter(|record| record.state() != PeerState::Disconnected)
            .count() as u32
    }

    /// Ids of every live link
    pub fn linked_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self
            .records
            .values()
            .filter(|record| record.state().is_linked())
            .map(|record| record.id().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of every record holding a connection
    pub fn ids_with_connection(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self
            .records
            .values()
            .filter(|record| record.connection().is_some())
            .map(|record| record.id().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_linked(&self, id: &PeerId) -> bool {
        self.state(id).is_linked()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerRecord> {
        self.records.values_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
