use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::types::PeerId;

/// How long a learned route stays usable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteExpiry {
    /// Routes live until overwritten
    #[default]
    Never,
    /// Routes are dropped once this long has passed since they were learned
    After(Duration),
}

#[derive(Clone, Debug)]
struct RouteEntry {
    next_hop: PeerId,
    learned_at: Instant,
}

/// Reverse-path routing: the way to reach an origin is through whichever
/// neighbor most recently relayed something from it.
pub struct RoutingTable {
    self_id: PeerId,
    expiry: RouteExpiry,
    routes: HashMap<PeerId, RouteEntry>,
}

impl RoutingTable {
    pub fn new(self_id: PeerId, expiry: RouteExpiry) -> Self {
        Self {
            self_id,
            expiry,
            routes: HashMap::new(),
        }
    }

    /// Records that traffic from `origin` arrived through `via`.
    /// Routes to ourselves and routes through the origin itself are skipped.
    pub fn add(&mut self, origin: &PeerId, via: &PeerId, now: Instant) {
        if origin.is_empty() || *origin == self.self_id || origin == via {
            return;
        }

        trace!("route {} via {}", origin, via);
        self.routes.insert(
            origin.clone(),
            RouteEntry {
                next_hop: via.clone(),
                learned_at: now,
            },
        );
    }

    /// The neighbor to hand traffic for `target` to, if one is known
    pub fn get(&self, target: &PeerId, now: Instant) -> Option<&PeerId> {
        let entry = self.routes.get(target)?;
        if self.is_expired(entry, now) {
            return None;
        }
        Some(&entry.next_hop)
    }

    pub fn remove(&mut self, origin: &PeerId) {
        self.routes.remove(origin);
    }

    /// Drops every route the expiry policy no longer allows
    pub fn prune(&mut self, now: Instant) {
        let RouteExpiry::After(lifetime) = self.expiry else {
            return;
        };
        self.routes
            .retain(|_, entry| now.saturating_duration_since(entry.learned_at) < lifetime);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// `(origin, next_hop)` pairs, including any not yet pruned
    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerId)> {
        self.routes
            .iter()
            .map(|(origin, entry)| (origin, &entry.next_hop))
    }

    fn is_expired(&self, entry: &RouteEntry, now: Instant) -> bool {
        match self.expiry {
            RouteExpiry::Never => false,
            RouteExpiry::After(lifetime) => {
                now.saturating_duration_since(entry.learned_at) >= lifetime
            }
        }
    }
}
