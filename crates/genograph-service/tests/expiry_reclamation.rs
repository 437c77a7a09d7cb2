// SPDX-License-Identifier: Apache-2.0

//! End-to-end reclamation: real TTLs in the memory store drive the
//! expiry listener, which drops idle projections and leaves session
//! bindings alone.

use genograph_engine::{FakeEngine, PoolConfig, SessionPool};
use genograph_model::ProjectionId;
use genograph_service::{ProjectionLifecycle, ServiceConfig};
use genograph_store::{KeyStore, MemoryKeyStore};
use std::sync::Arc;
use std::time::Duration;

fn pid(s: &str) -> ProjectionId {
    ProjectionId::parse(s).expect("projection id")
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn mk_lifecycle() -> (FakeEngine, Arc<MemoryKeyStore>, Arc<ProjectionLifecycle>) {
    let engine = FakeEngine::new();
    let pool = SessionPool::new(Arc::new(engine.clone()), PoolConfig::default());
    let store = MemoryKeyStore::with_sweep_interval(Duration::from_millis(20));
    let store_dyn: Arc<dyn KeyStore> = store.clone();
    let lifecycle = ProjectionLifecycle::new(store_dyn, pool, ServiceConfig::default());
    (engine, store, lifecycle)
}

#[tokio::test]
async fn ttl_elapse_reclaims_an_idle_projection() {
    init_tracing();
    let (engine, _store, lifecycle) = mk_lifecycle();
    let listener = lifecycle
        .spawn_expiry_listener()
        .await
        .expect("expiry listener");

    let g1 = pid("g1");
    lifecycle.register_built(&g1, 1).await.expect("register");
    engine.insert_graph("g1");

    tokio::time::sleep(Duration::from_millis(1600)).await;

    assert_eq!(engine.drop_calls(), 1, "expiry issued exactly one drop");
    assert!(!engine.has_graph("g1"));
    assert!(!lifecycle.exists(&g1).await.expect("exists"));
    assert_eq!(lifecycle.ref_count(&g1).await.expect("refs"), 0);

    listener.abort();
}

#[tokio::test]
async fn session_binding_expiry_is_a_soft_signal() {
    init_tracing();
    let (engine, store, lifecycle) = mk_lifecycle();
    let listener = lifecycle
        .spawn_expiry_listener()
        .await
        .expect("expiry listener");

    let g2 = pid("g2");
    lifecycle.register_built(&g2, 60).await.expect("register");
    engine.insert_graph("g2");

    // A binding with a short TTL expires without consequence for the
    // projection it points at.
    store
        .swap_with_expiry("user:transient", "g2", 1)
        .await
        .expect("seed binding");

    tokio::time::sleep(Duration::from_millis(1600)).await;

    assert_eq!(engine.drop_calls(), 0);
    assert!(engine.has_graph("g2"));
    assert!(lifecycle.exists(&g2).await.expect("exists"));

    listener.abort();
}
