//! # Haze Rendezvous
//! The matchmaker new nodes talk to before they can reach anyone over the
//! overlay. It pairs each bootstrapping node with a random earlier one and
//! relays offers, answers and candidates by `target_id`.
//!
//! The server does no IO of its own: the host feeds it messages from its
//! clients and delivers what it returns.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

use std::collections::HashSet;

use log::{debug, info, warn};
use thiserror::Error;

use haze_shared::{PeerId, SignalingError, SignalingMessage};

#[derive(Debug, Error)]
pub enum RendezvousError {
    /// The client sent text that is not a signaling message
    #[error("Unreadable message: {0}")]
    Signaling(#[from] SignalingError),

    /// A message that does not say who sent it cannot register a client
    #[error("`{kind}` messages do not identify their sender")]
    AnonymousSender { kind: &'static str },
}

/// Matchmaking and relay state
pub struct RendezvousServer {
    clients: HashSet<PeerId>,
    // in order of first request
    requesters: Vec<PeerId>,
    rng: fastrand::Rng,
}

impl Default for RendezvousServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RendezvousServer {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// A server whose matchmaking picks are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            clients: HashSet::new(),
            requesters: Vec::new(),
            rng,
        }
    }

    pub fn add_client(&mut self, client: &PeerId) {
        if self.clients.insert(client.clone()) {
            info!("rendezvous: client {} joined", client);
        }
    }

    /// Forgets `client`, which will no longer be offered to newcomers
    pub fn remove_client(&mut self, client: &PeerId) {
        if !self.clients.remove(client) {
            warn!("rendezvous: remove_client: {} is not connected", client);
            return;
        }
        self.requesters.retain(|id| id != client);
        info!("rendezvous: client {} left", client);
    }

    pub fn has_client(&self, client: &PeerId) -> bool {
        self.clients.contains(client)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Ids that have asked to bootstrap, oldest first
    pub fn requesters(&self) -> &[PeerId] {
        &self.requesters
    }

    /// Handles one message from `client` and returns what to deliver to whom
    pub fn handle(
        &mut self,
        client: &PeerId,
        message: SignalingMessage,
    ) -> Vec<(PeerId, SignalingMessage)> {
        self.add_client(client);

        if let SignalingMessage::SignalingRequest { .. } = message {
            return self.signaling_request(client);
        }

        let Some(target) = message.target_id().cloned() else {
            warn!(
                "rendezvous: {} from {} has no target",
                message.type_name(),
                client
            );
            return Vec::new();
        };
        if !self.clients.contains(&target) {
            warn!(
                "rendezvous: dropping {} from {} for unknown client {}",
                message.type_name(),
                client,
                target
            );
            return Vec::new();
        }

        debug!(
            "rendezvous: relaying {} {} -> {}",
            message.type_name(),
            client,
            target
        );
        vec![(target, message)]
    }

    /// Like `handle`, for JSON text straight off the wire. The sender is
    /// taken from the message's own `id`.
    pub fn handle_json(&mut self, text: &str) -> Result<Vec<(PeerId, String)>, RendezvousError> {
        let message = SignalingMessage::from_json(text)?;
        let client = message
            .sender_id()
            .cloned()
            .ok_or(RendezvousError::AnonymousSender {
                kind: message.type_name(),
            })?;

        self.handle(&client, message)
            .into_iter()
            .map(|(recipient, message)| -> Result<(PeerId, String), RendezvousError> {
                Ok((recipient, message.to_json()?))
            })
            .collect()
    }

    fn signaling_request(&mut self, client: &PeerId) -> Vec<(PeerId, SignalingMessage)> {
        let mut output = Vec::new();

        let candidates: Vec<&PeerId> = self.requesters.iter().filter(|id| *id != client).collect();
        if !candidates.is_empty() {
            let target = candidates[self.rng.usize(..candidates.len())].clone();
            info!("rendezvous: pairing {} with {}", client, target);
            output.push((
                client.clone(),
                SignalingMessage::SignalingResponse {
                    target_id: target,
                    request: SignalingMessage::REQUEST_OFFER.to_string(),
                },
            ));
        }

        if !self.requesters.contains(client) {
            self.requesters.push(client.clone());
        }
        output
    }
}
