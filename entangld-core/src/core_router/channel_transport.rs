/*
    ChannelTransport - queue outbound messages for the embedding application

    `transmit` only enqueues an Envelope; whoever owns the receiving half moves it
    to the target (over a socket, another task, another process) and calls
    `receive` or `receive_bytes` there. Delivery is therefore asynchronous: a
    `set` returns before remote subscribers have been notified.
*/

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{Envelope, PeerId, Transport, TransportError};
use super::Message;

#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelTransport {
    /// Transport plus the queue it feeds. `capacity` bounds envelopes in flight.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ChannelTransport { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn transmit(&self, message: Message, from: &PeerId, to: &PeerId) -> Result<(), TransportError> {
        let envelope = Envelope {
            from: from.clone(),
            to: to.clone(),
            message,
        };
        self.tx
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed("envelope queue dropped".to_string()))
    }
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(|e| TransportError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(bytes).map_err(|e| TransportError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_transmit_enqueues_envelope() {
        let (transport, mut rx) = ChannelTransport::new(4);
        transport
            .transmit(Message::get("r1", "x"), &PeerId::new("a"), &PeerId::new("b"))
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.from, PeerId::new("a"));
        assert_eq!(envelope.to, PeerId::new("b"));
        assert_eq!(envelope.message.id, "r1");
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (transport, rx) = ChannelTransport::new(1);
        drop(rx);
        let result = transport
            .transmit(Message::set("x", json!(1)), &PeerId::new("a"), &PeerId::new("b"))
            .await;
        assert!(matches!(result, Err(TransportError::Closed(_))));
    }

    #[test]
    fn test_envelope_bytes() {
        let envelope = Envelope {
            from: PeerId::new("a"),
            to: PeerId::new("b"),
            message: Message::event("s1", "temp", json!(21)),
        };
        let decoded = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        assert!(matches!(Envelope::from_bytes(b"{}"), Err(TransportError::Encode(_))));
    }
}
