use std::{cmp::Ordering, collections::HashSet};

use log::trace;

use haze_shared::{NodeConfig, PeerId, Position};

use crate::connection::peer_registry::{PeerRegistry, PeerState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptimizerAction {
    Connect(PeerId),
    Disconnect(PeerId),
}

/// Chooses which known peers this node should be linked with: the nearest
/// `soft_limit` of them, within the degree bounds every peer advertises.
pub struct ConnectionOptimizer {
    self_id: PeerId,
    wanted: HashSet<PeerId>,
}

fn by_distance(a: &(f32, &PeerId), b: &(f32, &PeerId)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

impl ConnectionOptimizer {
    pub fn new(self_id: PeerId) -> Self {
        Self {
            self_id,
            wanted: HashSet::new(),
        }
    }

    /// The peers the last pass chose to be linked with
    pub fn wants(&self, peer: &PeerId) -> bool {
        self.wanted.contains(peer)
    }

    /// One optimization pass. Refreshes every known peer's distance and
    /// returns the actions this node would take, before tie-break and leader
    /// gating.
    pub fn run(
        &mut self,
        config: &NodeConfig,
        position: &Position,
        registry: &mut PeerRegistry,
    ) -> Vec<OptimizerAction> {
        for record in registry.iter_mut() {
            if record.has_descriptor() {
                record.distance_to_self = position.distance(&record.position);
            }
        }

        let mut known: Vec<(f32, &PeerId)> = registry
            .iter()
            .filter(|record| record.has_descriptor() && *record.id() != self.self_id)
            .map(|record| (record.distance_to_self, record.id()))
            .collect();
        known.sort_by(by_distance);

        let soft_limit = config.soft_limit as usize;
        self.wanted = known
            .iter()
            .take(soft_limit)
            .map(|(_, id)| (*id).clone())
            .collect();

        let mut actions = Vec::new();
        let mut planned_degree = registry.committed_degree();

        for (index, (_, id)) in known.iter().enumerate() {
            let Some(record) = registry.get(id) else {
                continue;
            };

            if index < soft_limit {
                if record.state() == PeerState::Disconnected
                    && record.current_degree < record.hard_cap
                    && record.block_cooldown_remaining == 0
                    && planned_degree < config.hard_cap
                {
                    planned_degree += 1;
                    actions.push(OptimizerAction::Connect((*id).clone()));
                }
            } else if record.state() == PeerState::Connected
                && record.current_degree > record.min_degree
                && !self.peer_wants_us(registry, id, position)
            {
                actions.push(OptimizerAction::Disconnect((*id).clone()));
            }
        }

        trace!(
            "optimizer: {} known, {} wanted, {} actions",
            known.len(),
            self.wanted.len(),
            actions.len()
        );
        actions
    }

    /// Estimates, from the descriptors we hold, whether `peer` would count
    /// us among its own nearest `soft_limit`.
    fn peer_wants_us(&self, registry: &PeerRegistry, peer: &PeerId, position: &Position) -> bool {
        let Some(record) = registry.get(peer) else {
            return false;
        };
        let our_distance = record.position.distance(position);
        let us = (our_distance, &self.self_id);

        let closer = registry
            .iter()
            .filter(|other| other.has_descriptor() && other.id() != peer)
            .filter(|other| {
                let candidate = (record.position.distance(&other.position), other.id());
                by_distance(&candidate, &us) == Ordering::Less
            })
            .count();

        closer < record.soft_limit as usize
    }
}
