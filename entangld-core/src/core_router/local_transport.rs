/*
    LocalNetwork - in-process transport between stores

    Stores join the network by id; `transmit` looks the target up and awaits its
    `receive` directly, so by the time a `set` returns every store it reached has
    already run its callbacks.

    The network holds stores weakly: dropping the last `Store` handle removes it
    from the network, and a store holding the network does not keep itself alive.

    With recording enabled every delivered envelope is kept for inspection.
*/

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use super::message::MessageKind;
use super::transport::{Envelope, PeerId, Transport, TransportError};
use super::Message;
use crate::store::{Store, StoreResult, WeakStore};

#[derive(Default)]
pub struct LocalNetwork {
    stores: RwLock<HashMap<PeerId, WeakStore>>,
    log: Option<Mutex<Vec<Envelope>>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(LocalNetwork::default())
    }

    /// A network that keeps a copy of every delivered envelope
    pub fn recording() -> Arc<Self> {
        Arc::new(LocalNetwork {
            stores: RwLock::new(HashMap::new()),
            log: Some(Mutex::new(Vec::new())),
        })
    }

    /// Register `store` and install this network as its transport
    pub fn join(self: &Arc<Self>, store: &Store) -> StoreResult<()> {
        {
            let mut stores = self
                .stores
                .write()
                .map_err(|_| TransportError::Closed("network registry poisoned".to_string()))?;
            stores.insert(store.id().clone(), store.downgrade());
        }
        store.set_transport(self.clone())?;
        debug!(peer = %store.id(), "joined local network");
        Ok(())
    }

    pub fn leave(&self, id: &PeerId) -> bool {
        match self.stores.write() {
            Ok(mut stores) => stores.remove(id).is_some(),
            Err(_) => false,
        }
    }

    fn lookup(&self, id: &PeerId) -> Result<Store, TransportError> {
        let stores = self
            .stores
            .read()
            .map_err(|_| TransportError::Closed("network registry poisoned".to_string()))?;
        stores
            .get(id)
            .and_then(WeakStore::upgrade)
            .ok_or_else(|| TransportError::UnknownPeer(id.clone()))
    }

    fn record(&self, envelope: Envelope) {
        if let Some(log) = &self.log {
            if let Ok(mut log) = log.lock() {
                log.push(envelope);
            }
        }
    }

    /// Envelopes delivered so far (empty unless recording)
    pub fn sent(&self) -> Vec<Envelope> {
        self.log
            .as_ref()
            .and_then(|log| log.lock().ok().map(|log| log.clone()))
            .unwrap_or_default()
    }

    /// Count delivered envelopes of `kind` sent by `from`
    pub fn count(&self, from: &PeerId, kind: MessageKind) -> usize {
        self.sent()
            .iter()
            .filter(|e| &e.from == from && e.message.kind == kind)
            .count()
    }

    pub fn clear_log(&self) {
        if let Some(log) = &self.log {
            if let Ok(mut log) = log.lock() {
                log.clear();
            }
        }
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn transmit(&self, message: Message, from: &PeerId, to: &PeerId) -> Result<(), TransportError> {
        let target = self.lookup(to)?;

        if self.log.is_some() {
            self.record(Envelope {
                from: from.clone(),
                to: to.clone(),
                message: message.clone(),
            });
        }

        // errors are the receiver's to report; the sender only learns about delivery
        if let Err(e) = target.receive(message, from).await {
            warn!(%from, %to, error = %e, "peer rejected message");
        }
        Ok(())
    }
}
