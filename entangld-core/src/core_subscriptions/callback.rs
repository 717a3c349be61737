//! Subscriber callbacks.
//!
//! A callback receives the path it was registered on (in the subscribing
//! store's namespace) and the new value. Async callbacks are awaited before
//! the triggering operation returns.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SyncFn = dyn Fn(&str, &Value) + Send + Sync;
type AsyncFn = dyn Fn(String, Value) -> BoxFuture<'static, ()> + Send + Sync;

#[derive(Clone)]
pub enum Callback {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        Callback::Sync(Arc::new(f))
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Callback::Async(Arc::new(move |path, value| -> BoxFuture<'static, ()> {
            Box::pin(f(path, value))
        }))
    }

    pub async fn invoke(&self, path: &str, value: &Value) {
        match self {
            Callback::Sync(f) => f(path, value),
            Callback::Async(f) => f(path.to_string(), value.clone()).await,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Sync(_) => f.write_str("Callback::Sync"),
            Callback::Async(_) => f.write_str("Callback::Async"),
        }
    }
}
