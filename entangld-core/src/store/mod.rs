/*
    Store - a reactive dotted-path namespace that can delegate subtrees to peers

    Each store owns four tables:
    - data: the local prefix tree of leaves
    - subscriptions: local callbacks and pass-throughs kept for peers
    - attachments: prefixes delegated to peers
    - pending: forwarded gets waiting for their `value`

    Operations on a path first consult the attachment table. Paths strictly under an
    attached prefix are rewritten relative to the peer and handed to the transport;
    everything else is served from the local tables.

    Locking:
    The tables live behind one std Mutex. It is only held for table reads and writes,
    never across an await, a callback or a transport call. Fan-out snapshots the
    deliveries first, releases the lock, then delivers, so a peer calling back into
    this store mid-delivery sees consistent tables.

    Layout:
    - ops.rs: public operations (set, get, subscribe, attach, ...)
    - dispatch.rs: `receive` and the per-message handlers
    - errors.rs: StoreError
*/

pub mod errors;

mod dispatch;
mod ops;

pub use errors::{StoreError, StoreResult};
pub use ops::Unsubscribe;

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::{trace, warn};

use crate::config::StoreConfig;
use crate::core_path::{Path, PathStore};
use crate::core_router::{AttachmentTable, Message, PeerId, PendingRequests, Route, Transport};
use crate::core_subscriptions::{Delivery, Subscription, SubscriptionInfo, SubscriptionRegistry};
use crate::metrics;

/// Helper to convert poison errors into StoreError
fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned
}

struct State {
    data: PathStore,
    subscriptions: SubscriptionRegistry,
    attachments: AttachmentTable,
    pending: PendingRequests,
}

struct Inner {
    id: PeerId,
    config: StoreConfig,
    state: Mutex<State>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

/// Outcome of routing a path under the state lock
enum Routed<L, R = Route> {
    Remote(R),
    Local(L),
}

/// Handle to a store. Clones share the same tables.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

/// Non-owning handle, upgraded when a message is delivered
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<Inner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    /// Create a store with a random id
    pub fn new(config: StoreConfig) -> Self {
        Self::with_id(PeerId::random(), config)
    }

    pub fn with_id(id: impl Into<PeerId>, config: StoreConfig) -> Self {
        let pending = PendingRequests::new(config.max_pending_requests);
        Store {
            inner: Arc::new(Inner {
                id: id.into(),
                config,
                state: Mutex::new(State {
                    data: PathStore::new(),
                    subscriptions: SubscriptionRegistry::new(),
                    attachments: AttachmentTable::new(),
                    pending,
                }),
                transport: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.inner.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Install the collaborator used for every outbound message
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> StoreResult<()> {
        let mut slot = self.inner.transport.write().map_err(handle_poison)?;
        *slot = Some(transport);
        Ok(())
    }

    /// Name used in log output
    pub(crate) fn label(&self) -> &str {
        self.inner
            .config
            .name
            .as_deref()
            .unwrap_or_else(|| self.inner.id.as_str())
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.inner.state.lock().map_err(handle_poison)
    }

    fn transport(&self) -> StoreResult<Arc<dyn Transport>> {
        self.inner
            .transport
            .read()
            .map_err(handle_poison)?
            .clone()
            .ok_or(StoreError::NoTransport)
    }

    pub(crate) async fn send(&self, to: &PeerId, message: Message) -> StoreResult<()> {
        let transport = self.transport()?;
        trace!(
            store = %self.label(),
            peer = %to,
            kind = %message.kind,
            id = %message.id,
            path = %message.path,
            "sending message"
        );
        metrics::message_sent(message.kind);
        transport.transmit(message, &self.inner.id, to).await?;
        Ok(())
    }

    /// Send and log on failure; used where no caller can act on the error
    pub(crate) async fn send_or_warn(&self, to: &PeerId, message: Message) {
        let kind = message.kind;
        if let Err(e) = self.send(to, message).await {
            warn!(store = %self.label(), peer = %to, %kind, error = %e, "failed to deliver message");
        }
    }

    /// Deliver a change to every subscription in `deliveries`, in order.
    ///
    /// Local callbacks see their own registered path; pass-throughs relay an `event`
    /// to their origin with their own path as the origin sees it.
    pub(crate) async fn fan_out(&self, deliveries: Vec<Subscription>, value: &Value) {
        for subscription in deliveries {
            match &subscription.delivery {
                Delivery::Local(callback) => {
                    callback.invoke(&subscription.path.to_dotted(), value).await;
                }
                Delivery::PassThrough { peer } => {
                    let event = Message::event(
                        subscription.id.as_str(),
                        subscription.path.to_dotted(),
                        value.clone(),
                    );
                    self.send_or_warn(peer, event).await;
                }
            }
        }
    }

    fn record_subscriptions(state: &State) {
        metrics::active_subscriptions(state.subscriptions.len());
    }

    // Introspection

    /// Current attachments as (prefix, peer)
    pub fn attachments(&self) -> StoreResult<Vec<(Path, PeerId)>> {
        let state = self.state()?;
        Ok(state
            .attachments
            .iter()
            .map(|(prefix, peer)| (prefix.clone(), peer.clone()))
            .collect())
    }

    /// Every subscription held, local and pass-through, in registration order
    pub fn subscriptions(&self) -> StoreResult<Vec<SubscriptionInfo>> {
        let state = self.state()?;
        Ok(state.subscriptions.iter().map(Subscription::info).collect())
    }

    pub fn pending_requests(&self) -> StoreResult<usize> {
        Ok(self.state()?.pending.len())
    }

    /// Every local leaf path
    pub fn paths(&self) -> StoreResult<Vec<Path>> {
        Ok(self.state()?.data.paths())
    }

    /// Forget every subscription without telling any peer.
    ///
    /// Peers still holding pass-throughs for this store are cleaned up the next
    /// time they deliver an event.
    pub fn reset_subscriptions(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        state.subscriptions.clear();
        Self::record_subscriptions(&state);
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("name", &self.inner.config.name)
            .finish()
    }
}
