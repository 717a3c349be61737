//! List appends, locally and through an attachment

mod common;

use common::{pair, recorder};
use entangld_core::{Store, StoreConfig};
use serde_json::json;

#[tokio::test]
async fn test_push_builds_list() {
    let store = Store::new(StoreConfig::default());
    store.push("log", json!("a"), None).await.unwrap();
    store.push("log", json!("b"), None).await.unwrap();
    assert_eq!(store.get("log").await.unwrap(), json!(["a", "b"]));
}

#[tokio::test]
async fn test_push_onto_scalar() {
    let store = Store::new(StoreConfig::default());
    store.set("x", json!(1)).await.unwrap();
    store.push("x", json!(2), None).await.unwrap();
    assert_eq!(store.get("x").await.unwrap(), json!([1, 2]));
}

#[tokio::test]
async fn test_push_limit_keeps_newest() {
    let store = Store::new(StoreConfig::default());
    for i in 0..5 {
        store.push("recent", json!(i), Some(3)).await.unwrap();
    }
    assert_eq!(store.get("recent").await.unwrap(), json!([2, 3, 4]));
}

#[tokio::test]
async fn test_push_notifies_with_whole_list() {
    let store = Store::new(StoreConfig::default());
    let (seen, callback) = recorder();
    store.subscribe("log", callback).await.unwrap();

    store.push("log", json!("a"), None).await.unwrap();
    store.push("log", json!("b"), None).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("log".to_string(), json!(["a"])),
            ("log".to_string(), json!(["a", "b"])),
        ]
    );
}

#[tokio::test]
async fn test_remote_push() {
    let (_network, store, remote) = pair().await;
    remote.set("log", json!(["a", "b", "c"])).await.unwrap();

    store.push("other.log", json!("d"), Some(2)).await.unwrap();
    assert_eq!(remote.get("log").await.unwrap(), json!(["c", "d"]));
    assert_eq!(store.get("other.log").await.unwrap(), json!(["c", "d"]));
}

#[tokio::test]
async fn test_remote_push_notifies_subscriber() {
    let (_network, store, _remote) = pair().await;
    let (seen, callback) = recorder();
    store.subscribe("other.log", callback).await.unwrap();

    store.push("other.log", json!(1), None).await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("other.log".to_string(), json!([1]))]
    );
}
