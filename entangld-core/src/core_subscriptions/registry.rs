/*
    SubscriptionRegistry - every subscription a store is keeping

    Two kinds of entry share one list, kept in registration order:
    - local: registered by application code, delivered to a Callback
    - pass-through: registered by a peer's `subscribe` message, delivered by sending
      an `event` back to that peer

    Local entries are unique by id. Pass-through entries are unique by (peer, id), so two
    peers using the same id never collide.

    Any entry may additionally be forwarded: its path lies under an attachment, so a
    `subscribe` with the same id went to that peer and events come back from it.
    Forwarded entries are fed by incoming `event` messages, never by local sets.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::callback::Callback;
use crate::core_path::Path;
use crate::core_router::{PeerId, Route};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new() -> Self {
        SubscriptionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        SubscriptionId(id)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        SubscriptionId(id.to_string())
    }
}

/// How a matching change reaches its subscriber
#[derive(Debug, Clone)]
pub enum Delivery {
    Local(Callback),
    /// Relay as an `event` to the peer that asked for it
    PassThrough { peer: PeerId },
}

/// The upstream leg of a subscription whose path is attached elsewhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub peer: PeerId,
    pub prefix: Path,
    /// Path as registered on the peer
    pub path: Path,
}

impl From<Route> for Forward {
    fn from(route: Route) -> Self {
        Forward {
            peer: route.peer,
            prefix: route.prefix,
            path: route.relative,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub path: Path,
    pub delivery: Delivery,
    pub forward: Option<Forward>,
}

impl Subscription {
    pub fn local(id: SubscriptionId, path: Path, callback: Callback) -> Self {
        Subscription {
            id,
            path,
            delivery: Delivery::Local(callback),
            forward: None,
        }
    }

    pub fn pass_through(id: SubscriptionId, path: Path, peer: PeerId) -> Self {
        Subscription {
            id,
            path,
            delivery: Delivery::PassThrough { peer },
            forward: None,
        }
    }

    pub fn with_forward(mut self, forward: Option<Forward>) -> Self {
        self.forward = forward;
        self
    }

    /// Peer this entry was created for, if it is a pass-through
    pub fn origin(&self) -> Option<&PeerId> {
        match &self.delivery {
            Delivery::Local(_) => None,
            Delivery::PassThrough { peer } => Some(peer),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.delivery, Delivery::Local(_))
    }

    fn same_key(&self, id: &SubscriptionId, origin: Option<&PeerId>) -> bool {
        &self.id == id && self.origin() == origin
    }

    fn is_forwarded_as(&self, id: &SubscriptionId, peer: &PeerId) -> bool {
        &self.id == id && self.forward.as_ref().is_some_and(|f| &f.peer == peer)
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id.clone(),
            path: self.path.clone(),
            origin: self.origin().cloned(),
            forwarded_to: self.forward.as_ref().map(|f| f.peer.clone()),
        }
    }
}

/// Read-only view of a subscription for introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub path: Path,
    /// Set for pass-through entries
    pub origin: Option<PeerId>,
    pub forwarded_to: Option<PeerId>,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry::default()
    }

    /// Add `subscription`, replacing any entry with the same key in place.
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        let origin = subscription.origin().cloned();
        match self
            .entries
            .iter_mut()
            .find(|s| s.same_key(&subscription.id, origin.as_ref()))
        {
            Some(existing) => Some(std::mem::replace(existing, subscription)),
            None => {
                self.entries.push(subscription);
                None
            }
        }
    }

    /// Remove the local subscription with `id`
    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| s.same_key(id, None))?;
        Some(self.entries.remove(index))
    }

    /// Remove the pass-through entry `peer` registered under `id`
    pub fn remove_pass_through(&mut self, peer: &PeerId, id: &SubscriptionId) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| s.same_key(id, Some(peer)))?;
        Some(self.entries.remove(index))
    }

    /// Remove every local subscription registered at exactly `path`
    pub fn remove_at(&mut self, path: &Path) -> Vec<Subscription> {
        self.drain_where(|s| s.is_local() && &s.path == path)
    }

    /// Remove every entry forwarded through the attachment at `prefix`
    pub fn remove_forwarded_through(&mut self, prefix: &Path) -> Vec<Subscription> {
        self.drain_where(|s| s.forward.as_ref().is_some_and(|f| &f.prefix == prefix))
    }

    fn drain_where<F>(&mut self, mut predicate: F) -> Vec<Subscription>
    where
        F: FnMut(&Subscription) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for subscription in self.entries.drain(..) {
            if predicate(&subscription) {
                removed.push(subscription);
            } else {
                kept.push(subscription);
            }
        }
        self.entries = kept;
        removed
    }

    /// Entries fed by a local change at `path`, in registration order
    pub fn matching(&self, path: &Path) -> Vec<Subscription> {
        self.entries
            .iter()
            .filter(|s| s.forward.is_none() && &s.path == path)
            .cloned()
            .collect()
    }

    /// Entries fed by an `event` with `id` arriving from `from`
    pub fn forwarded(&self, id: &SubscriptionId, from: &PeerId) -> Vec<Subscription> {
        self.entries
            .iter()
            .filter(|s| s.is_forwarded_as(id, from))
            .cloned()
            .collect()
    }

    /// True if any entry with `id` is forwarded to `peer`
    pub fn forwards_to(&self, id: &SubscriptionId, peer: &PeerId) -> bool {
        self.entries.iter().any(|s| s.is_forwarded_as(id, peer))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Subscription> {
        self.entries.iter_mut()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn noop() -> Callback {
        Callback::new(|_, _| {})
    }

    fn forward_to(peer: &str, prefix: &str, path: &str) -> Option<Forward> {
        Some(Forward {
            peer: PeerId::new(peer),
            prefix: p(prefix),
            path: p(path),
        })
    }

    #[test]
    fn test_matching_in_registration_order() {
        let mut registry = SubscriptionRegistry::new();
        let first = SubscriptionId::new();
        let second = SubscriptionId::new();
        registry.insert(Subscription::local(first.clone(), p("a"), noop()));
        registry.insert(Subscription::pass_through(second.clone(), p("a"), PeerId::new("peer")));
        registry.insert(Subscription::local(SubscriptionId::new(), p("b"), noop()));

        let ids: Vec<_> = registry.matching(&p("a")).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_pass_through_keyed_by_peer() {
        let mut registry = SubscriptionRegistry::new();
        let id = SubscriptionId::from("same");
        registry.insert(Subscription::pass_through(id.clone(), p("a"), PeerId::new("p1")));
        registry.insert(Subscription::pass_through(id.clone(), p("a"), PeerId::new("p2")));
        assert_eq!(registry.len(), 2);

        // re-subscribing from the same peer replaces
        registry.insert(Subscription::pass_through(id.clone(), p("b"), PeerId::new("p1")));
        assert_eq!(registry.len(), 2);

        let removed = registry.remove_pass_through(&PeerId::new("p1"), &id).unwrap();
        assert_eq!(removed.path, p("b"));
        assert!(registry.remove_pass_through(&PeerId::new("p1"), &id).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_by_id_leaves_siblings() {
        let mut registry = SubscriptionRegistry::new();
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        registry.insert(Subscription::local(a.clone(), p("x"), noop()));
        registry.insert(Subscription::local(b.clone(), p("x"), noop()));

        assert!(registry.remove(&a).is_some());
        let left: Vec<_> = registry.matching(&p("x")).into_iter().map(|s| s.id).collect();
        assert_eq!(left, vec![b]);
    }

    #[test]
    fn test_remove_at_only_local_exact_path() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert(Subscription::local(SubscriptionId::new(), p("x"), noop()));
        registry.insert(Subscription::local(SubscriptionId::new(), p("x"), noop()));
        registry.insert(Subscription::local(SubscriptionId::new(), p("x.y"), noop()));
        registry.insert(Subscription::pass_through(SubscriptionId::new(), p("x"), PeerId::new("peer")));

        assert_eq!(registry.remove_at(&p("x")).len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_forwarded_entries_skip_local_matching() {
        let mut registry = SubscriptionRegistry::new();
        let id = SubscriptionId::new();
        registry.insert(
            Subscription::local(id.clone(), p("other.x"), noop()).with_forward(forward_to("r", "other", "x")),
        );

        assert!(registry.matching(&p("other.x")).is_empty());
        assert_eq!(registry.forwarded(&id, &PeerId::new("r")).len(), 1);
        assert!(registry.forwarded(&id, &PeerId::new("elsewhere")).is_empty());
        assert!(registry.forwards_to(&id, &PeerId::new("r")));
        assert!(!registry.forwards_to(&SubscriptionId::new(), &PeerId::new("r")));
    }

    #[test]
    fn test_remove_forwarded_through_prefix() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert(
            Subscription::local(SubscriptionId::new(), p("a.x"), noop()).with_forward(forward_to("r", "a", "x")),
        );
        registry.insert(
            Subscription::local(SubscriptionId::new(), p("b.x"), noop()).with_forward(forward_to("r", "b", "x")),
        );

        let removed = registry.remove_forwarded_through(&p("a"));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].path, p("a.x"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_info_reports_origin_and_forward() {
        let id = SubscriptionId::from("s1");
        let sub = Subscription::pass_through(id.clone(), p("x.y"), PeerId::new("down"))
            .with_forward(forward_to("up", "x", "y"));
        let info = sub.info();
        assert_eq!(info.origin, Some(PeerId::new("down")));
        assert_eq!(info.forwarded_to, Some(PeerId::new("up")));
    }
}
