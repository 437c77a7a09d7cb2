// SPDX-License-Identifier: Apache-2.0

use genograph_store::{KeyStore, MemoryKeyStore};
use std::time::Duration;

#[tokio::test]
async fn counters_are_symmetric_and_start_from_zero() {
    let store = MemoryKeyStore::new();
    assert_eq!(store.increment("refs:g1").await.expect("incr"), 1);
    assert_eq!(store.increment("refs:g1").await.expect("incr"), 2);
    assert_eq!(store.decrement("refs:g1").await.expect("decr"), 1);
    assert_eq!(store.decrement("refs:g1").await.expect("decr"), 0);
    // Decrementing a missing counter mirrors the Redis behavior.
    assert_eq!(store.decrement("refs:gone").await.expect("decr"), -1);
}

#[tokio::test]
async fn swap_returns_previous_value_and_sets_new_one() {
    let store = MemoryKeyStore::new();
    let old = store
        .swap_with_expiry("user:s1", "g1", 120)
        .await
        .expect("swap");
    assert_eq!(old, None);
    let old = store
        .swap_with_expiry("user:s1", "g2", 120)
        .await
        .expect("swap");
    assert_eq!(old.as_deref(), Some("g1"));
    let current = store
        .get_with_ttl("user:s1")
        .await
        .expect("get")
        .expect("binding present");
    assert_eq!(current.value, "g2");
    assert!(current.ttl_remaining.is_some());
}

#[tokio::test]
async fn set_if_absent_admits_exactly_one_winner() {
    let store = MemoryKeyStore::new();
    assert!(store.set_if_absent("lock:g1", "1", 30).await.expect("set"));
    assert!(!store.set_if_absent("lock:g1", "1", 30).await.expect("set"));
    store.delete("lock:g1").await.expect("delete");
    assert!(store.set_if_absent("lock:g1", "1", 30).await.expect("set"));
}

#[tokio::test]
async fn refresh_never_shortens_a_longer_ttl() {
    let store = MemoryKeyStore::new();
    store.set_with_expiry("g1", 30).await.expect("set");
    store
        .refresh_expiry_at_least("g1", 2)
        .await
        .expect("refresh");
    let entry = store
        .get_with_ttl("g1")
        .await
        .expect("get")
        .expect("key present");
    let remaining = entry.ttl_remaining.expect("ttl set");
    assert!(remaining > Duration::from_secs(20), "ttl was shortened");

    store
        .refresh_expiry_at_least("g1", 90)
        .await
        .expect("refresh");
    let entry = store
        .get_with_ttl("g1")
        .await
        .expect("get")
        .expect("key present");
    assert!(entry.ttl_remaining.expect("ttl set") > Duration::from_secs(60));
}

#[tokio::test]
async fn refresh_rearms_a_missing_key() {
    let store = MemoryKeyStore::new();
    store
        .refresh_expiry_at_least("g-missing", 60)
        .await
        .expect("refresh");
    assert!(store.exists("g-missing").await.expect("exists"));
}

#[tokio::test]
async fn natural_expiry_fires_exactly_one_notification() {
    let store = MemoryKeyStore::with_sweep_interval(Duration::from_millis(20));
    let mut expiries = store.subscribe_expiry().await.expect("subscribe");
    store.set_with_expiry("g1", 1).await.expect("set");

    let key = tokio::time::timeout(Duration::from_secs(3), expiries.recv())
        .await
        .expect("expiry within deadline")
        .expect("channel open");
    assert_eq!(key, "g1");
    assert!(!store.exists("g1").await.expect("exists"));

    // No duplicate notification follows for the same elapse.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(expiries.try_recv().is_err());
}

#[tokio::test]
async fn explicit_delete_does_not_notify() {
    let store = MemoryKeyStore::with_sweep_interval(Duration::from_millis(20));
    let mut expiries = store.subscribe_expiry().await.expect("subscribe");
    store.set_with_expiry("g1", 30).await.expect("set");
    store.delete("g1").await.expect("delete");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(expiries.try_recv().is_err());
}

#[tokio::test]
async fn get_with_ttl_misses_after_elapse_without_sweeper() {
    // A very long sweep interval forces the lazy path.
    let store = MemoryKeyStore::with_sweep_interval(Duration::from_secs(3600));
    store.set_with_expiry("g1", 1).await.expect("set");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(store.get_with_ttl("g1").await.expect("get").is_none());
    assert!(!store.exists("g1").await.expect("exists"));
}
