use std::time::Instant;

use log::trace;

use haze_shared::{PeerId, RoutingTable};

use crate::connection::peer_registry::PeerRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope is for us
    Local,
    /// Hand the envelope to this direct neighbor
    Forward(PeerId),
    /// No usable path
    Drop,
}

/// Decides where an envelope goes next
pub struct Dispatcher {
    self_id: PeerId,
}

impl Dispatcher {
    pub fn new(self_id: PeerId) -> Self {
        Self { self_id }
    }

    /// Direct link first, then the learned next hop. An envelope never goes
    /// back to the neighbor it arrived from.
    pub fn route(
        &self,
        target: &PeerId,
        arrived_from: Option<&PeerId>,
        registry: &PeerRegistry,
        routing: &RoutingTable,
        now: Instant,
    ) -> Delivery {
        if *target == self.self_id {
            return Delivery::Local;
        }

        let usable = |hop: &PeerId| registry.is_linked(hop) && Some(hop) != arrived_from;

        if usable(target) {
            return Delivery::Forward(target.clone());
        }

        match routing.get(target, now) {
            Some(hop) if usable(hop) => Delivery::Forward(hop.clone()),
            _ => {
                trace!("no route to {}", target);
                Delivery::Drop
            }
        }
    }
}
