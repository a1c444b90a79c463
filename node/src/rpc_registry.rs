use std::collections::HashMap;

use log::warn;

use haze_shared::{MessageInfo, PeerId, RpcError, RpcMessage, RpcSignature, RpcValue};

/// A registered RPC handler. It receives the checked arguments and may
/// queue further calls through the outbox.
pub type RpcHandler = Box<dyn FnMut(&[RpcValue], &mut RpcOutbox) + Send>;

#[derive(Clone, Debug, PartialEq)]
pub enum RpcTarget {
    Peer(PeerId),
    All,
    AllWithSelf,
}

/// Calls queued by a handler, sent by the node once the handler returns
#[derive(Default)]
pub struct RpcOutbox {
    calls: Vec<(RpcTarget, RpcMessage)>,
}

impl RpcOutbox {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub fn rpc(&mut self, target: &PeerId, key: impl Into<String>, args: Vec<RpcValue>) {
        self.calls
            .push((RpcTarget::Peer(target.clone()), RpcMessage::new(key, args)));
    }

    pub fn rpc_all(&mut self, key: impl Into<String>, args: Vec<RpcValue>) {
        self.calls.push((RpcTarget::All, RpcMessage::new(key, args)));
    }

    pub fn rpc_all_with_self(&mut self, key: impl Into<String>, args: Vec<RpcValue>) {
        self.calls
            .push((RpcTarget::AllWithSelf, RpcMessage::new(key, args)));
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<(RpcTarget, RpcMessage)> {
        std::mem::take(&mut self.calls)
    }
}

struct RpcEntry {
    signature: RpcSignature,
    handler: RpcHandler,
}

/// Maps RPC keys, typically `"{object_id}_{method}"`, to handlers
#[derive(Default)]
pub struct RpcRegistry {
    entries: HashMap<String, RpcEntry>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, key: impl Into<String>, signature: RpcSignature, handler: F)
    where
        F: FnMut(&[RpcValue], &mut RpcOutbox) + Send + 'static,
    {
        let key = key.into();
        let handler: RpcHandler = Box::new(handler);
        if self.entries.contains_key(&key) {
            warn!("RPC `{}` registered twice, replacing the earlier handler", key);
        }
        self.entries.insert(key, RpcEntry { signature, handler });
    }

    pub fn unregister(&mut self, key: &str) {
        if self.entries.remove(key).is_none() {
            warn!("unregister: RPC `{}` is not registered", key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn signature(&self, key: &str) -> Option<&RpcSignature> {
        self.entries.get(key).map(|entry| &entry.signature)
    }

    /// Checks `args` against the handler's signature, pads a missing
    /// trailing `MessageInfo`, and runs the handler
    pub fn invoke(
        &mut self,
        key: &str,
        args: Vec<RpcValue>,
        info: MessageInfo,
        outbox: &mut RpcOutbox,
    ) -> Result<(), RpcError> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(RpcError::UnknownMethod {
                key: key.to_string(),
            });
        };
        let args = entry.signature.prepare(key, args, info)?;
        (entry.handler)(&args, outbox);
        Ok(())
    }
}
