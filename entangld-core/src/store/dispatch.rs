/*
    dispatch.rs - inbound messages

    `receive(message, from)` is what a transport calls when a message arrives.

    | type        | handling                                                          |
    |-------------|-------------------------------------------------------------------|
    | get         | resolve (on a spawned task under tokio), answer with `value`      |
    | value       | fulfill the pending request, or drop if unknown                   |
    | set, push   | apply as a local call would, forwarding if attached here too      |
    | subscribe   | pass-through keyed (from, id); subscribe onward if attached here  |
    | unsubscribe | remove (from, id); cascade onward if it was forwarded             |
    | event       | deliver to subscriptions forwarded to `from` under that id;       |
    |             | unknown ids are answered with `unsubscribe` (orphan cleanup)      |

    Messages that fail to decode or miss a required field are rejected with
    MalformedMessage and leave the tables untouched.
*/

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use super::{Store, StoreError, StoreResult};
use crate::core_path::Path;
use crate::core_router::{Message, MessageKind, PeerId};
use crate::core_subscriptions::{Forward, Subscription, SubscriptionId};
use crate::metrics;

impl Store {
    /// Decode a JSON-encoded message and handle it
    pub async fn receive_bytes(&self, bytes: &[u8], from: &PeerId) -> StoreResult<()> {
        let message = Message::from_bytes(bytes).map_err(|e| {
            warn!(store = %self.label(), peer = %from, error = %e, "undecodable message");
            StoreError::MalformedMessage(e.to_string())
        })?;
        self.receive(message, from).await
    }

    /// Handle a message `from` a peer.
    ///
    /// Inside a tokio runtime a `get` is answered from a spawned task and this
    /// returns once the task is started. Under any other executor the `get` is
    /// resolved and answered before this returns.
    pub async fn receive(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        if let Err(reason) = message.validate() {
            warn!(store = %self.label(), peer = %from, %reason, "rejecting message");
            return Err(StoreError::MalformedMessage(reason));
        }

        trace!(
            store = %self.label(),
            peer = %from,
            kind = %message.kind,
            id = %message.id,
            path = %message.path,
            "received message"
        );
        metrics::message_received(message.kind);

        match message.kind {
            MessageKind::Get => self.on_get(message, from).await,
            MessageKind::Value => self.on_value(message, from),
            MessageKind::Set => self.on_set(message, from).await,
            MessageKind::Push => self.on_push(message, from).await,
            MessageKind::Subscribe => self.on_subscribe(message, from).await,
            MessageKind::Unsubscribe => self.on_unsubscribe(message, from).await,
            MessageKind::Event => self.on_event(message, from).await,
        }
    }

    fn message_path(&self, message: &Message, from: &PeerId, leaf: bool) -> StoreResult<Path> {
        let parsed = if leaf {
            Path::parse_leaf(&message.path)
        } else {
            Path::parse(&message.path)
        };
        parsed.map_err(|e| {
            warn!(store = %self.label(), peer = %from, kind = %message.kind, error = %e, "bad path in message");
            StoreError::MalformedMessage(format!("{}: {}", message.kind, e))
        })
    }

    async fn on_get(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let path = self.message_path(&message, from, false)?;

        match Handle::try_current() {
            // resolution may itself wait on another peer
            Ok(handle) => {
                let store = self.clone();
                let from = from.clone();
                handle.spawn(async move { store.answer_get(message, path, &from).await });
            }
            Err(_) => self.answer_get(message, path, from).await,
        }
        Ok(())
    }

    async fn answer_get(&self, message: Message, path: Path, from: &PeerId) {
        let result = self.resolve(&path).await.map_err(|e| e.to_string());
        if let Err(error) = &result {
            debug!(store = %self.label(), %path, peer = %from, %error, "answering get with error");
        }
        let reply = Message::value(message.id, message.path, result);
        self.send_or_warn(from, reply).await;
    }

    fn on_value(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let result = match message.error {
            Some(error) => Err(error),
            None => Ok(message.value.unwrap_or(Value::Null)),
        };

        let fulfilled = {
            let mut state = self.state()?;
            let fulfilled = state.pending.fulfill(&message.id, result);
            metrics::pending_requests(state.pending.len());
            fulfilled
        };

        match fulfilled {
            Some(path) => {
                trace!(store = %self.label(), peer = %from, id = %message.id, %path, "answered forwarded get")
            }
            None => {
                debug!(store = %self.label(), peer = %from, id = %message.id, "dropping value for unknown request");
                metrics::value_dropped();
            }
        }
        Ok(())
    }

    async fn on_set(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let path = self.message_path(&message, from, true)?;
        self.apply_set(&path, message.value.unwrap_or(Value::Null)).await
    }

    async fn on_push(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let path = self.message_path(&message, from, true)?;
        self.apply_push(&path, message.value.unwrap_or(Value::Null), message.limit)
            .await
    }

    async fn on_subscribe(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let path = self.message_path(&message, from, true)?;
        let id = SubscriptionId::from(message.id);

        let (forward, replaced) = {
            let mut state = self.state()?;
            let forward = state.attachments.resolve(&path).map(Forward::from);
            let replaced = state.subscriptions.insert(
                Subscription::pass_through(id.clone(), path.clone(), from.clone())
                    .with_forward(forward.clone()),
            );
            Self::record_subscriptions(&state);
            (forward, replaced)
        };

        debug!(store = %self.label(), %path, peer = %from, %id, "registered pass-through");

        // a re-subscribe that moved to another route releases the old one
        if let Some(old) = replaced.and_then(|s| s.forward) {
            if forward.as_ref() != Some(&old) {
                self.release_leg(&id, &old).await;
            }
        }

        if let Some(forward) = forward {
            let message = Message::subscribe(id.as_str(), forward.path.to_dotted());
            if let Err(e) = self.send(&forward.peer, message).await {
                if let Ok(mut state) = self.state() {
                    state.subscriptions.remove_pass_through(from, &id);
                    Self::record_subscriptions(&state);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn on_unsubscribe(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let id = SubscriptionId::from(message.id);

        let removed = {
            let mut state = self.state()?;
            let removed = state.subscriptions.remove_pass_through(from, &id);
            Self::record_subscriptions(&state);
            removed
        };

        match removed {
            Some(subscription) => {
                debug!(store = %self.label(), peer = %from, %id, path = %subscription.path, "removed pass-through");
                self.release_upstream(vec![subscription]).await;
            }
            None => trace!(store = %self.label(), peer = %from, %id, "unsubscribe for unknown pass-through"),
        }
        Ok(())
    }

    async fn on_event(&self, message: Message, from: &PeerId) -> StoreResult<()> {
        let id = SubscriptionId::from(message.id);
        let value = message.value.unwrap_or(Value::Null);

        let deliveries = self.state()?.subscriptions.forwarded(&id, from);

        if deliveries.is_empty() {
            if !self.inner.config.orphan_cleanup {
                debug!(store = %self.label(), peer = %from, %id, "dropping event for unknown subscription");
                return Ok(());
            }
            warn!(store = %self.label(), peer = %from, %id, "event for unknown subscription, unsubscribing");
            metrics::orphan_cleaned();
            return self
                .send(from, Message::unsubscribe(id.as_str(), message.path))
                .await;
        }

        self.fan_out(deliveries, &value).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::core_router::ChannelTransport;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_undecodable_bytes_rejected() {
        let store = Store::new(StoreConfig::default());
        let from = PeerId::new("peer");

        let result = store.receive_bytes(b"not json", &from).await;
        assert!(matches!(result, Err(StoreError::MalformedMessage(_))));

        let result = store
            .receive_bytes(br#"{"id":"1","type":"teleport","path":"x"}"#, &from)
            .await;
        assert!(matches!(result, Err(StoreError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_missing_value_rejected_without_side_effects() {
        let store = Store::new(StoreConfig::default());
        let result = store
            .receive_bytes(br#"{"id":"1","type":"set","path":"x"}"#, &PeerId::new("peer"))
            .await;
        assert!(matches!(result, Err(StoreError::MalformedMessage(_))));
        assert!(store.paths().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_path_rejected() {
        let store = Store::new(StoreConfig::default());
        let message = Message::set("a..b", json!(1));
        let result = store.receive(message, &PeerId::new("peer")).await;
        assert!(matches!(result, Err(StoreError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_inbound_set_applies_locally() {
        let store = Store::new(StoreConfig::default());
        store
            .receive(Message::set("x", json!(5)), &PeerId::new("peer"))
            .await
            .unwrap();
        assert_eq!(store.get("x").await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn test_unknown_value_dropped() {
        let store = Store::new(StoreConfig::default());
        let message = Message::value("no-such-request", "x", Ok(json!(1)));
        store.receive(message, &PeerId::new("peer")).await.unwrap();
        assert_eq!(store.pending_requests().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inbound_subscribe_keyed_by_peer() {
        let store = Store::new(StoreConfig::default());
        store
            .receive(Message::subscribe("same", "x"), &PeerId::new("a"))
            .await
            .unwrap();
        store
            .receive(Message::subscribe("same", "x"), &PeerId::new("b"))
            .await
            .unwrap();
        assert_eq!(store.subscriptions().unwrap().len(), 2);

        store
            .receive(Message::unsubscribe("same", "x"), &PeerId::new("a"))
            .await
            .unwrap();
        let left = store.subscriptions().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].origin, Some(PeerId::new("b")));

        // idempotent
        store
            .receive(Message::unsubscribe("same", "x"), &PeerId::new("a"))
            .await
            .unwrap();
        assert_eq!(store.subscriptions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_orphan_event_dropped_when_cleanup_disabled() {
        let store = Store::new(StoreConfig::default().orphan_cleanup(false));
        // no transport installed: cleanup would fail with NoTransport
        let result = store
            .receive(Message::event("ghost", "x", json!(1)), &PeerId::new("peer"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_orphan_event_needs_transport_to_clean_up() {
        let store = Store::new(StoreConfig::default());
        let result = store
            .receive(Message::event("ghost", "x", json!(1)), &PeerId::new("peer"))
            .await;
        assert!(matches!(result, Err(StoreError::NoTransport)));
    }

    #[test]
    fn test_get_answered_inline_outside_tokio() {
        let (transport, mut rx) = ChannelTransport::new(4);
        let store = Store::new(StoreConfig::default());
        store.set_transport(Arc::new(transport)).unwrap();

        futures::executor::block_on(async {
            store.set("x", json!(1)).await.unwrap();
            store
                .receive(Message::get("r1", "x"), &PeerId::new("peer"))
                .await
                .unwrap();
        });

        // the answer is queued before receive returns
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.to, PeerId::new("peer"));
        assert_eq!(envelope.message.kind, MessageKind::Value);
        assert_eq!(envelope.message.id, "r1");
        assert_eq!(envelope.message.value, Some(json!(1)));
    }

    #[test]
    fn test_forwarded_get_outside_tokio() {
        let (transport, mut rx) = ChannelTransport::new(4);
        let store = Store::with_id("store", StoreConfig::default());
        store.set_transport(Arc::new(transport)).unwrap();

        let answer = async {
            let envelope = rx.recv().await.unwrap();
            let reply = Message::value(envelope.message.id, "x", Ok(json!("far")));
            store.receive(reply, &envelope.to).await.unwrap();
        };

        let (value, ()) = futures::executor::block_on(async {
            store.attach("other", "remote").await.unwrap();
            futures::join!(store.get("other.x"), answer)
        });
        assert_eq!(value.unwrap(), json!("far"));
        assert_eq!(store.pending_requests().unwrap(), 0);
    }
}
