/// In-memory rendezvous for E2E testing
/// Wraps a `RendezvousServer` and hands each node a channel to it. Every
/// message crosses the channel as JSON text, the way it would over a socket.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use haze_node::rendezvous::RendezvousChannel;
use haze_rendezvous::RendezvousServer;
use haze_shared::{PeerId, SignalingError, SignalingMessage};

struct RendezvousState {
    server: RendezvousServer,
    inboxes: HashMap<PeerId, VecDeque<String>>,
    relayed: usize,
}

/// A rendezvous shared by every node of a test. Cloning shares the server.
#[derive(Clone)]
pub struct LocalRendezvous {
    state: Arc<Mutex<RendezvousState>>,
}

impl LocalRendezvous {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RendezvousState {
                server: RendezvousServer::with_seed(seed),
                inboxes: HashMap::new(),
                relayed: 0,
            })),
        }
    }

    /// Connects `client` to the rendezvous
    pub fn channel(&self, client: &PeerId) -> LocalRendezvousChannel {
        let mut state = self.state.lock().unwrap();
        state.server.add_client(client);
        state.inboxes.entry(client.clone()).or_default();
        LocalRendezvousChannel {
            client: client.clone(),
            state: self.state.clone(),
        }
    }

    pub fn disconnect(&self, client: &PeerId) {
        let mut state = self.state.lock().unwrap();
        state.server.remove_client(client);
        state.inboxes.remove(client);
    }

    /// Messages the server has delivered so far
    pub fn relayed(&self) -> usize {
        self.state.lock().unwrap().relayed
    }
}

pub struct LocalRendezvousChannel {
    client: PeerId,
    state: Arc<Mutex<RendezvousState>>,
}

impl RendezvousChannel for LocalRendezvousChannel {
    fn send(&mut self, message: &SignalingMessage) -> Result<(), SignalingError> {
        let text = message.to_json()?;
        let message = SignalingMessage::from_json(&text)?;

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let output = state.server.handle(&self.client, message);
        for (recipient, message) in output {
            let text = message.to_json()?;
            if let Some(inbox) = state.inboxes.get_mut(&recipient) {
                inbox.push_back(text);
                state.relayed += 1;
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<SignalingMessage>, SignalingError> {
        let text = {
            let mut state = self.state.lock().unwrap();
            state
                .inboxes
                .get_mut(&self.client)
                .and_then(|inbox| inbox.pop_front())
        };
        match text {
            Some(text) => Ok(Some(SignalingMessage::from_json(&text)?)),
            None => Ok(None),
        }
    }
}
