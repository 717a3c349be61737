/*
    Leaf - the value held at a path

    A leaf is exactly one of:
    - a literal JSON value
    - a synchronous getter, called on every read
    - an asynchronous getter, awaited on every read

    `resolve` is the single place that switches on the variant.
*/

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Failure reported by a getter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct GetterError(pub String);

impl GetterError {
    pub fn new(message: impl Into<String>) -> Self {
        GetterError(message.into())
    }
}

impl From<String> for GetterError {
    fn from(message: String) -> Self {
        GetterError(message)
    }
}

impl From<&str> for GetterError {
    fn from(message: &str) -> Self {
        GetterError(message.to_string())
    }
}

pub type GetterResult = Result<Value, GetterError>;

type SyncGetterFn = dyn Fn() -> GetterResult + Send + Sync;
type AsyncGetterFn = dyn Fn() -> BoxFuture<'static, GetterResult> + Send + Sync;

#[derive(Clone)]
pub enum Leaf {
    Literal(Value),
    SyncGetter(Arc<SyncGetterFn>),
    AsyncGetter(Arc<AsyncGetterFn>),
}

impl Leaf {
    pub fn literal(value: impl Into<Value>) -> Self {
        Leaf::Literal(value.into())
    }

    /// Wrap a synchronous getter
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> GetterResult + Send + Sync + 'static,
    {
        Leaf::SyncGetter(Arc::new(f))
    }

    /// Wrap an asynchronous getter. The closure is called once per read
    /// and the returned future is awaited.
    pub fn async_getter<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GetterResult> + Send + 'static,
    {
        Leaf::AsyncGetter(Arc::new(move || -> BoxFuture<'static, GetterResult> {
            Box::pin(f())
        }))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Leaf::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Leaf::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub async fn resolve(&self) -> GetterResult {
        match self {
            Leaf::Literal(value) => Ok(value.clone()),
            Leaf::SyncGetter(f) => f(),
            Leaf::AsyncGetter(f) => f().await,
        }
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Leaf::SyncGetter(_) => f.write_str("SyncGetter(..)"),
            Leaf::AsyncGetter(_) => f.write_str("AsyncGetter(..)"),
        }
    }
}

impl From<Value> for Leaf {
    fn from(value: Value) -> Self {
        Leaf::Literal(value)
    }
}
