// SPDX-License-Identifier: Apache-2.0

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use genograph_engine::{queries, AccessMode, Params, SessionPool};
use genograph_model::{ProjectionId, SessionId};
use genograph_store::KeyStore;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) const SESSION_KEY_PREFIX: &str = "user:";
pub(crate) const REFS_KEY_PREFIX: &str = "refs:";
pub(crate) const LOCK_KEY_PREFIX: &str = "lock:";

pub(crate) fn session_binding_key(session: &SessionId) -> String {
    format!("{SESSION_KEY_PREFIX}{session}")
}

pub(crate) fn refs_key(projection: &str) -> String {
    format!("{REFS_KEY_PREFIX}{projection}")
}

pub(crate) fn build_lock_key(projection: &ProjectionId) -> String {
    format!("{LOCK_KEY_PREFIX}{projection}")
}

#[derive(Default)]
pub struct LifecycleMetrics {
    pub binds: AtomicU64,
    pub rebind_fast_path: AtomicU64,
    pub drops_issued: AtomicU64,
    pub expiry_drops: AtomicU64,
    pub swallowed_drop_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleMetricsSnapshot {
    pub binds: u64,
    pub rebind_fast_path: u64,
    pub drops_issued: u64,
    pub expiry_drops: u64,
    pub swallowed_drop_failures: u64,
}

impl LifecycleMetrics {
    #[must_use]
    pub fn snapshot(&self) -> LifecycleMetricsSnapshot {
        LifecycleMetricsSnapshot {
            binds: self.binds.load(Ordering::Relaxed),
            rebind_fast_path: self.rebind_fast_path.load(Ordering::Relaxed),
            drops_issued: self.drops_issued.load(Ordering::Relaxed),
            expiry_drops: self.expiry_drops.load(Ordering::Relaxed),
            swallowed_drop_failures: self.swallowed_drop_failures.load(Ordering::Relaxed),
        }
    }
}

/// The reuse/build/bind/reclaim state machine for named projections.
///
/// All lifecycle state — existence keys with TTLs, per-projection
/// refcounts, per-session binding pointers — lives in the key store,
/// which is the single source of truth; this struct holds no cache of
/// it, so several instances can safely share one store.
pub struct ProjectionLifecycle {
    store: Arc<dyn KeyStore>,
    pool: Arc<SessionPool>,
    cfg: ServiceConfig,
    pub metrics: Arc<LifecycleMetrics>,
}

impl ProjectionLifecycle {
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, pool: Arc<SessionPool>, cfg: ServiceConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            pool,
            cfg,
            metrics: Arc::new(LifecycleMetrics::default()),
        })
    }

    pub async fn exists(&self, projection: &ProjectionId) -> Result<bool, ServiceError> {
        Ok(self.store.exists(projection.as_str()).await?)
    }

    /// Transitions a freshly built projection to live: arms the
    /// existence key and clears any refcount left from a previous
    /// incarnation. Callers invoke this only after the build query
    /// succeeded; a failed build registers nothing.
    pub async fn register_built(
        &self,
        projection: &ProjectionId,
        ttl_secs: u64,
    ) -> Result<(), ServiceError> {
        self.store.delete(&refs_key(projection.as_str())).await?;
        self.store
            .set_with_expiry(projection.as_str(), ttl_secs)
            .await?;
        info!(projection = %projection, ttl_secs, "projection registered");
        Ok(())
    }

    /// Current number of sessions bound to the projection. Zero for
    /// unknown projections; bookkeeping loss never reports negative.
    pub async fn ref_count(&self, projection: &ProjectionId) -> Result<i64, ServiceError> {
        let entry = self
            .store
            .get_with_ttl(&refs_key(projection.as_str()))
            .await?;
        let count = entry
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0);
        Ok(count.max(0))
    }

    /// Binds a session to a projection, implicitly unbinding it from
    /// whatever it was bound to before.
    ///
    /// The binding pointer is exchanged atomically (swap-with-expiry),
    /// so two racing binds for one session each consume a distinct
    /// previous value: the pointer is last-writer-wins while the
    /// refcount arithmetic is never skipped or doubled.
    pub async fn bind(
        &self,
        session: &SessionId,
        projection: &ProjectionId,
    ) -> Result<(), ServiceError> {
        let binding_key = session_binding_key(session);
        let current = self.store.get_with_ttl(&binding_key).await?;

        if let Some(bound) = &current {
            if bound.value == projection.as_str() && self.exists(projection).await? {
                self.metrics.rebind_fast_path.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        let remaining = current
            .as_ref()
            .and_then(|c| c.ttl_remaining)
            .map_or(0, |d| d.as_secs());
        let session_ttl = remaining.max(self.cfg.session_ttl_secs);

        let previous = self
            .store
            .swap_with_expiry(&binding_key, projection.as_str(), session_ttl)
            .await?;

        match previous {
            Some(prev) if prev == projection.as_str() => {
                // A concurrent bind already moved this session here and
                // took the +1; taking another would overcount.
                self.metrics.rebind_fast_path.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Some(prev) => {
                let left = self.store.decrement(&refs_key(&prev)).await?;
                if left <= 0 {
                    // Last consumer gone: reclaim eagerly instead of
                    // waiting out the TTL.
                    self.drop_projection(&prev).await?;
                }
            }
            None => {}
        }

        self.store
            .increment(&refs_key(projection.as_str()))
            .await?;
        self.store
            .refresh_expiry_at_least(projection.as_str(), self.cfg.projection_ttl_secs)
            .await?;
        self.metrics.binds.fetch_add(1, Ordering::Relaxed);
        debug!(session = %session, projection = %projection, "session bound");
        Ok(())
    }

    /// Drops the backing projection and its bookkeeping keys. Dropping
    /// an already-absent projection is swallowed: cleanup is
    /// idempotent under duplicate notifications and racing unbinds.
    pub(crate) async fn drop_projection(&self, projection: &str) -> Result<(), ServiceError> {
        let mut session = self.pool.acquire(AccessMode::Write).await?;
        let mut params = Params::new();
        params.insert("graphName".to_string(), json!(projection));
        match session.run(queries::projection_drop_query(), params).await {
            Ok(_) => {
                self.metrics.drops_issued.fetch_add(1, Ordering::Relaxed);
                info!(projection, "projection dropped");
            }
            Err(err) if err.is_not_found() => {
                self.metrics
                    .swallowed_drop_failures
                    .fetch_add(1, Ordering::Relaxed);
                debug!(projection, "drop of absent projection ignored: {err}");
            }
            Err(err) => return Err(ServiceError::from(err)),
        }
        self.store.delete(projection).await?;
        self.store.delete(&refs_key(projection)).await?;
        Ok(())
    }

    /// Handles one expired key from the store's notification stream.
    ///
    /// Session bindings and lock/refcount bookkeeping expire without
    /// consequence; anything else names a projection whose TTL
    /// elapsed. The existence key is re-checked first so a stale
    /// notification for a since-re-registered projection is ignored.
    pub async fn on_expiry(&self, key: &str) {
        if key.starts_with(SESSION_KEY_PREFIX)
            || key.starts_with(LOCK_KEY_PREFIX)
            || key.starts_with(REFS_KEY_PREFIX)
        {
            debug!(key, "ignoring non-projection expiry");
            return;
        }
        match self.store.exists(key).await {
            Ok(true) => {
                debug!(key, "projection re-armed since expiry notification");
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(key, "expiry re-check failed: {err}");
                return;
            }
        }
        match self.drop_projection(key).await {
            Ok(()) => {
                self.metrics.expiry_drops.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => warn!(key, "expiry-driven drop failed: {err}"),
        }
    }

    /// Runs the reclamation path off the store's expiry stream,
    /// independent of any in-flight request.
    pub async fn spawn_expiry_listener(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<()>, ServiceError> {
        let mut expiries = self.store.subscribe_expiry().await?;
        let me = Arc::clone(self);
        Ok(tokio::spawn(async move {
            while let Some(key) = expiries.recv().await {
                me.on_expiry(&key).await;
            }
            info!("expiry stream closed");
        }))
    }
}
