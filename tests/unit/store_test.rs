//! Tests for the in-memory key-value store

use std::sync::Arc;
use std::time::Duration;

use prometheus_poller::core::{holds_lease, new_lease_token, KvStore};
use prometheus_poller::infra::InMemoryStore;

#[tokio::test]
async fn test_store_as_trait_object() {
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    store.set("subject", "token-1", None).await.unwrap();
    assert_eq!(store.get("subject").await.unwrap().as_deref(), Some("token-1"));
    assert_eq!(store.get("other").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lease_is_not_held() {
    let store = InMemoryStore::new();
    let token = new_lease_token();
    store
        .set("subject", &token, Some(Duration::from_millis(10)))
        .await
        .unwrap();
    let remote = store.get("subject").await.unwrap();
    assert!(holds_lease(&token, remote.as_deref()));

    tokio::time::sleep(Duration::from_millis(9)).await;
    let remote = store.get("subject").await.unwrap();
    assert!(holds_lease(&token, remote.as_deref()));

    tokio::time::sleep(Duration::from_millis(1)).await;
    let remote = store.get("subject").await.unwrap();
    assert!(!holds_lease(&token, remote.as_deref()));
}

#[tokio::test]
async fn test_concurrent_writers_last_one_wins() {
    let store = InMemoryStore::new();
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.set("subject", &format!("token-{i}"), None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let value = store.get("subject").await.unwrap().unwrap();
    assert!(value.starts_with("token-"));
    assert_eq!(store.len(), 1);
}
