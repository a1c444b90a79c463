use std::{collections::HashSet, time::Instant};

use haze_shared::{MessageType, PeerId, Position, SendTier, Timer};

use crate::connection::peer_registry::PeerRegistry;

struct TierState {
    radius: f32,
    timer: Timer,
    peers: HashSet<PeerId>,
}

/// Re-sends the latest published state to near peers often and to far peers
/// rarely. Each linked peer sits in the first tier whose radius covers it.
pub struct SendingOptimizer {
    tiers: Vec<TierState>,
    latest: Option<(MessageType, Vec<u8>)>,
}

impl SendingOptimizer {
    pub fn new(tiers: &[SendTier], now: Instant) -> Self {
        let mut tiers: Vec<TierState> = tiers
            .iter()
            .map(|tier| TierState {
                radius: tier.radius,
                timer: Timer::new(tier.interval, now),
                peers: HashSet::new(),
            })
            .collect();
        tiers.sort_by(|a, b| a.radius.total_cmp(&b.radius));
        Self {
            tiers,
            latest: None,
        }
    }

    pub fn publish(&mut self, kind: MessageType, payload: Vec<u8>) {
        self.latest = Some((kind, payload));
    }

    pub fn latest(&self) -> Option<&(MessageType, Vec<u8>)> {
        self.latest.as_ref()
    }

    fn tier_for(&self, distance: f32) -> Option<usize> {
        if self.tiers.is_empty() {
            return None;
        }
        let index = self
            .tiers
            .iter()
            .position(|tier| distance <= tier.radius)
            .unwrap_or(self.tiers.len() - 1);
        Some(index)
    }

    /// Re-buckets every linked peer with a known position
    pub fn categorize(&mut self, position: &Position, registry: &PeerRegistry) {
        for tier in self.tiers.iter_mut() {
            tier.peers.clear();
        }
        for record in registry.iter() {
            if !record.state().is_linked() || !record.has_descriptor() {
                continue;
            }
            let distance = position.distance(&record.position);
            if let Some(index) = self.tier_for(distance) {
                self.tiers[index].peers.insert(record.id().clone());
            }
        }
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        for tier in self.tiers.iter_mut() {
            tier.peers.remove(peer);
        }
    }

    /// Which tier `peer` is in, nearest first
    pub fn tier_of(&self, peer: &PeerId) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.peers.contains(peer))
    }

    /// The peers whose tier interval has elapsed, when there is anything to
    /// send them
    pub fn due(&mut self, now: Instant) -> Vec<PeerId> {
        let mut output = Vec::new();
        for tier in self.tiers.iter_mut() {
            if tier.timer.tick(now) && self.latest.is_some() {
                output.extend(tier.peers.iter().cloned());
            }
        }
        output.sort();
        output
    }

    pub fn clear(&mut self) {
        for tier in self.tiers.iter_mut() {
            tier.peers.clear();
        }
        self.latest = None;
    }
}
