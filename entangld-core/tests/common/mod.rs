//! Shared fixtures for integration tests

#![allow(dead_code)]

use entangld_core::logging::init_test_logging;
use entangld_core::{Callback, GetterError, Leaf, LocalNetwork, Store, StoreConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Three stores on one recording network:
///
/// ```text
/// store --other1--> remote1 --other2--> remote2
///   \-------------other2------------------^
/// ```
pub struct Federation {
    pub network: Arc<LocalNetwork>,
    pub store: Store,
    pub remote1: Store,
    pub remote2: Store,
}

pub async fn federation() -> Federation {
    init_test_logging();

    let network = LocalNetwork::recording();
    let store = Store::with_id("store", StoreConfig::named("store"));
    let remote1 = Store::with_id("remote1", StoreConfig::named("remote1"));
    let remote2 = Store::with_id("remote2", StoreConfig::named("remote2"));

    for s in [&store, &remote1, &remote2] {
        network.join(s).expect("join network");
    }

    store.attach("other1", remote1.id().clone()).await.expect("attach other1");
    store.attach("other2", remote2.id().clone()).await.expect("attach other2");
    remote1.attach("other2", remote2.id().clone()).await.expect("attach other2 on remote1");

    network.clear_log();

    Federation {
        network,
        store,
        remote1,
        remote2,
    }
}

/// A store and one peer attached at `other`
pub async fn pair() -> (Arc<LocalNetwork>, Store, Store) {
    init_test_logging();

    let network = LocalNetwork::recording();
    let store = Store::with_id("store", StoreConfig::named("store"));
    let remote = Store::with_id("remote", StoreConfig::named("remote"));
    network.join(&store).expect("join network");
    network.join(&remote).expect("join network");

    store.attach("other", remote.id().clone()).await.expect("attach other");
    network.clear_log();

    (network, store, remote)
}

/// Literal, sync getter, async getter and delayed async getter
pub async fn populate(store: &Store) {
    store.set("some_data", json!(0.0)).await.expect("set some_data");
    store.define("now", Leaf::getter(|| Ok(json!(1)))).expect("define now");
    store
        .define("async", Leaf::async_getter(|| async { Ok(json!(1)) }))
        .expect("define async");
    store
        .define(
            "later",
            Leaf::async_getter(|| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(json!(1))
            }),
        )
        .expect("define later");
    store
        .define("broken", Leaf::getter(|| Err(GetterError::new("sensor offline"))))
        .expect("define broken");
}

pub fn counter() -> (Arc<AtomicUsize>, Callback) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let callback = Callback::new(move |_, _| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

pub fn async_counter() -> (Arc<AtomicUsize>, Callback) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let callback = Callback::new_async(move |_, _| {
        let c = c.clone();
        async move {
            tokio::task::yield_now().await;
            c.fetch_add(1, Ordering::SeqCst);
        }
    });
    (count, callback)
}

pub type Seen = Arc<Mutex<Vec<(String, Value)>>>;

/// Callback that records every (path, value) it is called with
pub fn recorder() -> (Seen, Callback) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let callback = Callback::new(move |path, value| {
        s.lock().unwrap().push((path.to_string(), value.clone()));
    });
    (seen, callback)
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
