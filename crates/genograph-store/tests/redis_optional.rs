// SPDX-License-Identifier: Apache-2.0

//! Exercises the Redis-backed store against a live server. Skips
//! unless `GENOGRAPH_TEST_REDIS_URL` points at one.

use genograph_store::{KeyStore, RedisKeyStore, RedisKeyStorePolicy};
use std::time::Duration;

fn test_store() -> Option<RedisKeyStore> {
    let url = std::env::var("GENOGRAPH_TEST_REDIS_URL").ok()?;
    RedisKeyStore::connect(&url, "genograph-test", RedisKeyStorePolicy::default()).ok()
}

#[tokio::test]
async fn redis_counters_and_swap_round_trip() {
    let Some(store) = test_store() else {
        eprintln!("GENOGRAPH_TEST_REDIS_URL not set; skipping");
        return;
    };

    store.delete("it:refs").await.expect("cleanup");
    assert_eq!(store.increment("it:refs").await.expect("incr"), 1);
    assert_eq!(store.increment("it:refs").await.expect("incr"), 2);
    assert_eq!(store.decrement("it:refs").await.expect("decr"), 1);

    store.delete("it:user").await.expect("cleanup");
    assert_eq!(
        store
            .swap_with_expiry("it:user", "g1", 60)
            .await
            .expect("swap"),
        None
    );
    assert_eq!(
        store
            .swap_with_expiry("it:user", "g2", 60)
            .await
            .expect("swap")
            .as_deref(),
        Some("g1")
    );

    let entry = store
        .get_with_ttl("it:user")
        .await
        .expect("get")
        .expect("binding present");
    assert_eq!(entry.value, "g2");
    assert!(entry.ttl_remaining.expect("ttl") <= Duration::from_secs(60));

    store.delete("it:refs").await.expect("cleanup");
    store.delete("it:user").await.expect("cleanup");
}

#[tokio::test]
async fn redis_expiry_notification_is_delivered() {
    let Some(store) = test_store() else {
        eprintln!("GENOGRAPH_TEST_REDIS_URL not set; skipping");
        return;
    };

    let mut expiries = store.subscribe_expiry().await.expect("subscribe");
    store.set_with_expiry("it:expiring", 1).await.expect("set");

    let deadline = Duration::from_secs(5);
    let received = tokio::time::timeout(deadline, async {
        while let Some(key) = expiries.recv().await {
            if key == "it:expiring" {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(received, "expected an expiry notification for it:expiring");
}
