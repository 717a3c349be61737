/*
    Transport - the outbound collaborator a store hands messages to

    A store never holds a reference to another store. It names peers by `PeerId`
    and asks its transport to deliver a `Message` from itself to that peer.
    The transport must eventually call `receive(message, from)` on the target.

    Ordering, retries and framing are the transport's business.
*/

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::message::Message;

/// Opaque handle naming a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    /// Fresh random handle
    pub fn random() -> Self {
        PeerId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        PeerId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no route to peer {0}")]
    UnknownPeer(PeerId),

    #[error("transport closed: {0}")]
    Closed(String),

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// A message in flight between two stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: PeerId,
    pub to: PeerId,
    pub message: Message,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand `message` to `to`, on behalf of `from`
    async fn transmit(&self, message: Message, from: &PeerId, to: &PeerId) -> Result<(), TransportError>;
}
