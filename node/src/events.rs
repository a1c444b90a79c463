use std::{mem, vec::IntoIter};

use haze_shared::{MessageInfo, PeerId};

use crate::error::NodeError;

/// Everything that happened during one `Node::receive` call
pub struct Events {
    connections: Vec<PeerId>,
    disconnections: Vec<PeerId>,
    messages: Vec<(MessageInfo, u16, Vec<u8>)>,
    errors: Vec<NodeError>,
    empty: bool,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: Event>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: Event>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_connection(&mut self, peer: &PeerId) {
        self.connections.push(peer.clone());
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, peer: &PeerId) {
        self.disconnections.push(peer.clone());
        self.empty = false;
    }

    pub(crate) fn push_message(&mut self, info: MessageInfo, kind: u16, payload: Vec<u8>) {
        self.messages.push((info, kind, payload));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: NodeError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait Event {
    type Iter;

    fn iter(events: &mut Events) -> Self::Iter;

    fn has(events: &Events) -> bool;
}

// ConnectEvent
pub struct ConnectEvent;
impl Event for ConnectEvent {
    type Iter = IntoIter<PeerId>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = mem::take(&mut events.connections);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.connections.is_empty()
    }
}

// DisconnectEvent
pub struct DisconnectEvent;
impl Event for DisconnectEvent {
    type Iter = IntoIter<PeerId>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = mem::take(&mut events.disconnections);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.disconnections.is_empty()
    }
}

// MessageEvent, for application-defined envelope kinds
pub struct MessageEvent;
impl Event for MessageEvent {
    type Iter = IntoIter<(MessageInfo, u16, Vec<u8>)>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = mem::take(&mut events.messages);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.messages.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl Event for ErrorEvent {
    type Iter = IntoIter<NodeError>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &Events) -> bool {
        !events.errors.is_empty()
    }
}
