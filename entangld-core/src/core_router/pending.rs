/*
    PendingRequests - forwarded gets waiting for their `value`

    Keyed by request id. An entry is removed when it is fulfilled or cancelled;
    a `value` for an unknown id is dropped by the caller.
    There is no timeout: an unanswered request stays until cancelled.
*/

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// What a remote get resolves to: the value or the peer's error text
pub type RemoteResult = Result<Value, String>;

struct PendingRequest {
    path: String,
    response_tx: oneshot::Sender<RemoteResult>,
}

#[derive(Default)]
pub struct PendingRequests {
    requests: HashMap<String, PendingRequest>,
    /// 0 means unbounded
    max: usize,
}

impl PendingRequests {
    pub fn new(max: usize) -> Self {
        PendingRequests {
            requests: HashMap::new(),
            max,
        }
    }

    /// Allocate an id for a request to `path`.
    ///
    /// Returns `None` when the table is full.
    pub fn register(&mut self, path: impl Into<String>) -> Option<(String, oneshot::Receiver<RemoteResult>)> {
        if self.max > 0 && self.requests.len() >= self.max {
            return None;
        }

        let id = Uuid::new_v4().to_string();
        let (response_tx, response_rx) = oneshot::channel();
        self.requests.insert(
            id.clone(),
            PendingRequest {
                path: path.into(),
                response_tx,
            },
        );
        Some((id, response_rx))
    }

    /// Complete the request with `id`, returning the path it was made for.
    ///
    /// `None` if no such request is pending.
    pub fn fulfill(&mut self, id: &str, result: RemoteResult) -> Option<String> {
        let pending = self.requests.remove(id)?;
        // receiver gone means the caller stopped waiting
        let _ = pending.response_tx.send(result);
        Some(pending.path)
    }

    /// Drop the request with `id`; its waiter sees the channel close
    pub fn cancel(&mut self, id: &str) -> bool {
        self.requests.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
