/*
    ops.rs - public store operations

    set / push / define   write a leaf, locally or by forwarding to the owning peer
    get / get_sync        resolve a path, locally or through a correlated round trip
    subscribe             register a callback; attached paths also subscribe on the peer
    unsubscribe           by id or by exact path; attached entries notify the peer
    attach / detach       maintain the attachment table and re-route subscriptions
*/

use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{Routed, State, Store, StoreError, StoreResult};
use crate::core_path::{tree, Leaf, Lookup, Path};
use crate::core_router::{Message, PeerId, RemoteResult, Route};
use crate::core_subscriptions::{Callback, Forward, Subscription, SubscriptionId};
use crate::metrics;

/// What to remove in `Store::unsubscribe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsubscribe {
    /// Exactly the subscription with this id
    Id(SubscriptionId),
    /// Every local subscription registered at exactly this path
    Path(String),
}

impl From<SubscriptionId> for Unsubscribe {
    fn from(id: SubscriptionId) -> Self {
        Unsubscribe::Id(id)
    }
}

impl From<&SubscriptionId> for Unsubscribe {
    fn from(id: &SubscriptionId) -> Self {
        Unsubscribe::Id(id.clone())
    }
}

impl From<&str> for Unsubscribe {
    fn from(path: &str) -> Self {
        Unsubscribe::Path(path.to_string())
    }
}

impl From<String> for Unsubscribe {
    fn from(path: String) -> Self {
        Unsubscribe::Path(path)
    }
}

/// A subscription whose upstream leg changed after an attachment change
struct Rebind {
    id: SubscriptionId,
    old: Option<Forward>,
    new: Option<Forward>,
}

/// Append `value` to the list at a leaf, keeping the last `limit` items
fn appended(current: Option<&Value>, value: Value, limit: Option<usize>) -> Value {
    let mut items = match current {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    items.push(value);

    if let Some(limit) = limit {
        if items.len() > limit {
            items.drain(..items.len() - limit);
        }
    }
    Value::Array(items)
}

impl Store {
    /// Store a literal at `path` and notify its subscribers.
    ///
    /// Under an attachment the write is forwarded to the peer without acknowledgement.
    pub async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let path = Path::parse_leaf(path)?;
        self.apply_set(&path, value).await
    }

    pub(crate) async fn apply_set(&self, path: &Path, value: Value) -> StoreResult<()> {
        let routed = {
            let mut state = self.state()?;
            match state.attachments.resolve(path) {
                Some(route) => Routed::Remote(route),
                None => {
                    state.data.insert(path, Leaf::Literal(value.clone()))?;
                    Routed::Local(state.subscriptions.matching(path))
                }
            }
        };

        match routed {
            Routed::Remote(route) => {
                debug!(store = %self.label(), %path, peer = %route.peer, "forwarding set");
                self.send(&route.peer, Message::set(route.relative.to_dotted(), value))
                    .await
            }
            Routed::Local(deliveries) => {
                self.fan_out(deliveries, &value).await;
                Ok(())
            }
        }
    }

    /// Append to the list at `path`, keeping at most `limit` items.
    ///
    /// A missing leaf starts a new list; any other literal becomes the first item.
    pub async fn push(&self, path: &str, value: Value, limit: Option<usize>) -> StoreResult<()> {
        let path = Path::parse_leaf(path)?;
        self.apply_push(&path, value, limit).await
    }

    pub(crate) async fn apply_push(
        &self,
        path: &Path,
        value: Value,
        limit: Option<usize>,
    ) -> StoreResult<()> {
        let routed = {
            let mut state = self.state()?;
            match state.attachments.resolve(path) {
                Some(route) => Routed::Remote(route),
                None => {
                    let list = appended(state.data.literal(path), value.clone(), limit);
                    state.data.insert(path, Leaf::Literal(list.clone()))?;
                    Routed::Local((state.subscriptions.matching(path), list))
                }
            }
        };

        match routed {
            Routed::Remote(route) => {
                debug!(store = %self.label(), %path, peer = %route.peer, "forwarding push");
                self.send(
                    &route.peer,
                    Message::push(route.relative.to_dotted(), value, limit),
                )
                .await
            }
            Routed::Local((deliveries, list)) => {
                self.fan_out(deliveries, &list).await;
                Ok(())
            }
        }
    }

    /// Install a leaf (literal or getter) without notifying subscribers
    pub fn define(&self, path: &str, leaf: Leaf) -> StoreResult<()> {
        let path = Path::parse_leaf(path)?;
        let mut state = self.state()?;
        if state.attachments.resolve(&path).is_some() {
            return Err(StoreError::Unforwardable(path.to_dotted()));
        }
        state.data.insert(&path, leaf)?;
        Ok(())
    }

    /// Resolve `path`. The empty path returns the whole local tree.
    pub async fn get(&self, path: &str) -> StoreResult<Value> {
        let path = Path::parse(path)?;
        self.resolve(&path).await
    }

    pub(crate) async fn resolve(&self, path: &Path) -> StoreResult<Value> {
        let routed = {
            let mut state = self.state()?;
            match state.attachments.resolve(path) {
                Some(route) => {
                    let (id, rx) = state
                        .pending
                        .register(path.to_dotted())
                        .ok_or(StoreError::TooManyPending(self.inner.config.max_pending_requests))?;
                    metrics::pending_requests(state.pending.len());
                    Routed::Remote((route, id, rx))
                }
                None => Routed::Local(state.data.lookup(path)),
            }
        };

        match routed {
            Routed::Local(lookup) => self.resolve_lookup(path, lookup).await,
            Routed::Remote((route, id, rx)) => self.request(path, route, id, rx).await,
        }
    }

    async fn resolve_lookup(&self, path: &Path, lookup: Lookup) -> StoreResult<Value> {
        match lookup {
            Lookup::Leaf(leaf) => leaf
                .resolve()
                .await
                .map_err(|e| StoreError::getter(path, e)),
            Lookup::Nested { leaf, rest } => {
                let value = leaf
                    .resolve()
                    .await
                    .map_err(|e| StoreError::getter(path, e))?;
                tree::descend(&value, &rest).ok_or_else(|| StoreError::NotFound(path.to_dotted()))
            }
            Lookup::Branch(leaves) => {
                let mut entries = Vec::with_capacity(leaves.len());
                for (relative, leaf) in leaves {
                    let value = leaf
                        .resolve()
                        .await
                        .map_err(|e| StoreError::getter(path.join(&relative), e))?;
                    entries.push((relative, value));
                }
                Ok(tree::assemble(entries))
            }
            Lookup::Missing => Err(StoreError::NotFound(path.to_dotted())),
        }
    }

    async fn request(
        &self,
        path: &Path,
        route: Route,
        id: String,
        rx: oneshot::Receiver<RemoteResult>,
    ) -> StoreResult<Value> {
        debug!(store = %self.label(), %path, peer = %route.peer, %id, "forwarding get");
        let timer = metrics::Timer::new(metrics::REMOTE_GET_DURATION);

        let message = Message::get(id.clone(), route.relative.to_dotted());
        if let Err(e) = self.send(&route.peer, message).await {
            self.forget_request(&id);
            return Err(e);
        }

        let answer = self.await_answer(path, &route.peer, rx).await;
        timer.stop();

        match answer {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(StoreError::Remote {
                path: path.to_dotted(),
                message,
            }),
            Err(_) => Err(StoreError::RequestDropped(path.to_dotted())),
        }
    }

    async fn await_answer(
        &self,
        path: &Path,
        peer: &PeerId,
        mut rx: oneshot::Receiver<RemoteResult>,
    ) -> Result<RemoteResult, oneshot::error::RecvError> {
        let limit = self.inner.config.slow_request_warning;
        // the warning timer needs a tokio time driver
        if limit.is_zero() || Handle::try_current().is_err() {
            return rx.await;
        }

        match tokio::time::timeout(limit, &mut rx).await {
            Ok(answer) => answer,
            Err(_) => {
                warn!(
                    store = %self.label(),
                    %path,
                    %peer,
                    waited = ?limit,
                    "remote get still waiting for an answer"
                );
                rx.await
            }
        }
    }

    fn forget_request(&self, id: &str) {
        if let Ok(mut state) = self.state() {
            state.pending.cancel(id);
            metrics::pending_requests(state.pending.len());
        }
    }

    /// Blocking `get` for callers outside the store's async context.
    ///
    /// Outside any runtime a temporary current-thread runtime drives the request.
    /// Inside a multi-thread runtime the calling worker blocks in place.
    /// Inside a current-thread runtime blocking would starve the very tasks the
    /// answer depends on, so this fails with `BlockingInRuntime`.
    ///
    /// Must not be called from a getter or callback of the same store.
    pub fn get_sync(&self, path: &str) -> StoreResult<Value> {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(StoreError::BlockingInRuntime),
                _ => tokio::task::block_in_place(|| handle.block_on(self.get(path))),
            },
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| StoreError::Runtime(e.to_string()))?;
                runtime.block_on(self.get(path))
            }
        }
    }

    /// Register `callback` for changes at exactly `path`.
    ///
    /// Under an attachment a `subscribe` carrying the same id goes to the peer,
    /// and the callback is driven by the peer's events.
    pub async fn subscribe(&self, path: &str, callback: Callback) -> StoreResult<SubscriptionId> {
        let path = Path::parse_leaf(path)?;
        let id = SubscriptionId::new();

        let forward = {
            let mut state = self.state()?;
            let forward = state.attachments.resolve(&path).map(Forward::from);
            state.subscriptions.insert(
                Subscription::local(id.clone(), path.clone(), callback).with_forward(forward.clone()),
            );
            Self::record_subscriptions(&state);
            forward
        };

        if let Some(forward) = forward {
            debug!(store = %self.label(), %path, peer = %forward.peer, %id, "forwarding subscribe");
            let message = Message::subscribe(id.as_str(), forward.path.to_dotted());
            if let Err(e) = self.send(&forward.peer, message).await {
                if let Ok(mut state) = self.state() {
                    state.subscriptions.remove(&id);
                    Self::record_subscriptions(&state);
                }
                return Err(e);
            }
        }

        Ok(id)
    }

    /// Remove local subscriptions by id or exact path.
    ///
    /// Each removed subscription that was forwarded sends its own `unsubscribe`
    /// to the peer. Returns how many were removed.
    pub async fn unsubscribe(&self, target: impl Into<Unsubscribe>) -> StoreResult<usize> {
        let target = target.into();

        let removed = {
            let mut state = self.state()?;
            let removed: Vec<Subscription> = match &target {
                Unsubscribe::Id(id) => state.subscriptions.remove(id).into_iter().collect(),
                Unsubscribe::Path(raw) => state.subscriptions.remove_at(&Path::parse_leaf(raw)?),
            };
            Self::record_subscriptions(&state);
            removed
        };

        let count = removed.len();
        debug!(store = %self.label(), ?target, removed = count, "unsubscribed");
        self.release_upstream(removed).await;
        Ok(count)
    }

    /// Tell the peers behind forwarded subscriptions to drop them
    pub(crate) async fn release_upstream(&self, removed: Vec<Subscription>) {
        for subscription in removed {
            if let Some(forward) = &subscription.forward {
                self.release_leg(&subscription.id, forward).await;
            }
        }
    }

    /// Unsubscribe `id` at the peer behind `forward`.
    ///
    /// The peer keys its entry by (this store, id), so the leg stays up while any
    /// remaining subscription with the same id is still forwarded to that peer.
    pub(crate) async fn release_leg(&self, id: &SubscriptionId, forward: &Forward) {
        let shared = self
            .state()
            .map(|state| state.subscriptions.forwards_to(id, &forward.peer))
            .unwrap_or(false);
        if shared {
            debug!(store = %self.label(), %id, peer = %forward.peer, "upstream leg still in use");
            return;
        }

        let message = Message::unsubscribe(id.as_str(), forward.path.to_dotted());
        self.send_or_warn(&forward.peer, message).await;
    }

    /// Delegate everything under `prefix` to `peer`, replacing any previous peer.
    ///
    /// Subscriptions whose route changes are moved: `unsubscribe` to the old peer,
    /// `subscribe` with the same id to the new one. Returns the replaced peer.
    pub async fn attach(&self, prefix: &str, peer: impl Into<PeerId>) -> StoreResult<Option<PeerId>> {
        let prefix = Path::parse_leaf(prefix)?;
        let peer = peer.into();

        let (previous, rebinds) = {
            let mut guard = self.state()?;
            let state: &mut State = &mut guard;
            let previous = state.attachments.attach(prefix.clone(), peer.clone());
            (previous, Self::rebind(state))
        };

        info!(store = %self.label(), %prefix, %peer, replaced = ?previous, "attached");
        self.apply_rebinds(rebinds).await;
        Ok(previous)
    }

    /// Remove the attachment at `prefix`.
    ///
    /// Every subscription forwarded through it is dropped and the peer is sent one
    /// `unsubscribe` per subscription. Returns the detached peer.
    pub async fn detach(&self, prefix: &str) -> StoreResult<Option<PeerId>> {
        let prefix = Path::parse_leaf(prefix)?;

        let (peer, removed) = {
            let mut state = self.state()?;
            let Some(peer) = state.attachments.detach(&prefix) else {
                return Ok(None);
            };
            let removed = state.subscriptions.remove_forwarded_through(&prefix);
            Self::record_subscriptions(&state);
            (peer, removed)
        };

        info!(store = %self.label(), %prefix, %peer, dropped = removed.len(), "detached");
        self.release_upstream(removed).await;
        Ok(Some(peer))
    }

    /// Recompute every subscription's upstream leg against the attachment table
    fn rebind(state: &mut State) -> Vec<Rebind> {
        let mut rebinds = Vec::new();
        for subscription in state.subscriptions.iter_mut() {
            let new = state.attachments.resolve(&subscription.path).map(Forward::from);
            if new != subscription.forward {
                let old = std::mem::replace(&mut subscription.forward, new.clone());
                rebinds.push(Rebind {
                    id: subscription.id.clone(),
                    old,
                    new,
                });
            }
        }
        rebinds
    }

    async fn apply_rebinds(&self, rebinds: Vec<Rebind>) {
        for rebind in rebinds {
            if let Some(old) = &rebind.old {
                self.release_leg(&rebind.id, old).await;
            }
            if let Some(new) = rebind.new {
                debug!(store = %self.label(), id = %rebind.id, peer = %new.peer, "re-routing subscription");
                let message = Message::subscribe(rebind.id.as_str(), new.path.to_dotted());
                self.send_or_warn(&new.peer, message).await;
            }
        }
    }
}
