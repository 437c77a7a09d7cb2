#![forbid(unsafe_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const CRATE_NAME: &str = "genograph-store";

mod memory;
mod redis_backend;

pub use memory::MemoryKeyStore;
pub use redis_backend::{RedisKeyStore, RedisKeyStorePolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// A value read together with its remaining TTL in one atomic round
/// trip. `ttl_remaining` is `None` for keys without an expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueWithTtl {
    pub value: String,
    pub ttl_remaining: Option<Duration>,
}

#[derive(Default)]
pub struct StoreMetrics {
    pub commands: AtomicU64,
    pub failures: AtomicU64,
    pub expiry_events: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreMetricsSnapshot {
    pub commands: u64,
    pub failures: u64,
    pub expiry_events: u64,
}

impl StoreMetrics {
    #[must_use]
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            expiry_events: self.expiry_events.load(Ordering::Relaxed),
        }
    }
}

/// Durable existence/TTL/refcount bookkeeping plus an asynchronous
/// expiry notification stream.
///
/// The store is the single source of truth for lifecycle state: the
/// consumers hold no conflicting in-process cache, so several manager
/// instances can share one store. Counter operations are atomic (no
/// lost updates); `swap_with_expiry` exchanges a value and sets its
/// TTL in one indivisible step.
#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    /// Creates or refreshes a key's existence and TTL.
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomic counter increment; a missing key counts from zero.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Atomic counter decrement; a missing key counts from zero.
    async fn decrement(&self, key: &str) -> Result<i64, StoreError>;

    /// Removes a key without firing an expiry notification.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Reads a value and its remaining TTL atomically.
    async fn get_with_ttl(&self, key: &str) -> Result<Option<ValueWithTtl>, StoreError>;

    /// Atomically exchanges the stored value (setting the given TTL)
    /// and returns the previous value, if any.
    async fn swap_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>, StoreError>;

    /// Sets the key only when absent; returns whether this caller won.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<bool, StoreError>;

    /// Extends a key's TTL to at least `min_ttl_secs`, never
    /// shortening a longer remaining TTL. A missing key is re-armed
    /// with `min_ttl_secs`.
    async fn refresh_expiry_at_least(&self, key: &str, min_ttl_secs: u64)
        -> Result<(), StoreError>;

    /// Subscribes to expired key names (prefix-stripped). Fires on
    /// natural TTL elapse only, not on explicit deletion. Delivery is
    /// at-least-once across transport reconnects.
    async fn subscribe_expiry(&self) -> Result<mpsc::Receiver<String>, StoreError>;
}
