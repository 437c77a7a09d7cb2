// SPDX-License-Identifier: Apache-2.0

use crate::{KeyStore, StoreError, StoreMetrics, ValueWithTtl};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

const EXPIRY_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct RedisKeyStorePolicy {
    pub timeout: Duration,
    pub retry_attempts: usize,
    /// Database index baked into the keyspace notification channel
    /// name (`__keyevent@<db>__:expired`).
    pub notification_db: i64,
    pub reconnect_backoff: Duration,
}

impl Default for RedisKeyStorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(250),
            retry_attempts: 2,
            notification_db: 0,
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

/// Redis-backed [`KeyStore`]. Every key is namespaced under a prefix
/// that is stripped again before expiry notifications are forwarded.
pub struct RedisKeyStore {
    client: redis::Client,
    prefix: String,
    policy: RedisKeyStorePolicy,
    pub metrics: Arc<StoreMetrics>,
}

impl RedisKeyStore {
    pub fn connect(
        url: &str,
        prefix: &str,
        policy: RedisKeyStorePolicy,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.trim_end_matches(':').to_string(),
            policy,
            metrics: Arc::new(StoreMetrics::default()),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    /// Bounded retry under a per-attempt timeout. Counter mutations
    /// must not pass through here: retrying an INCR/DECR whose first
    /// attempt had an indeterminate outcome can double-apply it.
    async fn with_attempts<T, Fut, F>(&self, attempts: usize, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = attempts.max(1);
        let mut last = None;
        for i in 0..attempts {
            match timeout(self.policy.timeout, op()).await {
                Ok(Ok(v)) => {
                    self.metrics.commands.fetch_add(1, Ordering::Relaxed);
                    return Ok(v);
                }
                Ok(Err(e)) => last = Some(e),
                Err(_) => last = Some(StoreError("key store timeout".to_string())),
            }
            if i + 1 < attempts {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        self.metrics.failures.fetch_add(1, Ordering::Relaxed);
        Err(last.unwrap_or_else(|| StoreError("key store failure".to_string())))
    }

    async fn with_retry<T, Fut, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.with_attempts(self.policy.retry_attempts, op).await
    }
}

async fn open_connection(
    client: &redis::Client,
) -> Result<redis::aio::MultiplexedConnection, StoreError> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| StoreError(e.to_string()))
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                let _: () = conn
                    .set_ex(&full, "", ttl_secs)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                Ok(())
            }
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                conn.exists(&full)
                    .await
                    .map_err(|e| StoreError(e.to_string()))
            }
        })
        .await
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_attempts(1, move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                conn.incr(&full, 1_i64)
                    .await
                    .map_err(|e| StoreError(e.to_string()))
            }
        })
        .await
    }

    async fn decrement(&self, key: &str) -> Result<i64, StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_attempts(1, move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                conn.decr(&full, 1_i64)
                    .await
                    .map_err(|e| StoreError(e.to_string()))
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                let _: () = conn.del(&full).await.map_err(|e| StoreError(e.to_string()))?;
                Ok(())
            }
        })
        .await
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<ValueWithTtl>, StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                // MULTI/EXEC keeps the value and its TTL consistent.
                let (value, ttl): (Option<String>, i64) = redis::pipe()
                    .atomic()
                    .cmd("GET")
                    .arg(&full)
                    .cmd("TTL")
                    .arg(&full)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                Ok(value.map(|value| ValueWithTtl {
                    value,
                    ttl_remaining: u64::try_from(ttl).ok().map(Duration::from_secs),
                }))
            }
        })
        .await
    }

    async fn swap_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>, StoreError> {
        let full = self.full_key(key);
        let payload = value.to_string();
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            let payload = payload.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                redis::cmd("SET")
                    .arg(&full)
                    .arg(&payload)
                    .arg("EX")
                    .arg(ttl_secs)
                    .arg("GET")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError(e.to_string()))
            }
        })
        .await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let full = self.full_key(key);
        let payload = value.to_string();
        let client = self.client.clone();
        self.with_attempts(1, move || {
            let client = client.clone();
            let full = full.clone();
            let payload = payload.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                let reply: Option<String> = redis::cmd("SET")
                    .arg(&full)
                    .arg(&payload)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                Ok(reply.is_some())
            }
        })
        .await
    }

    async fn refresh_expiry_at_least(
        &self,
        key: &str,
        min_ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let full = self.full_key(key);
        let client = self.client.clone();
        self.with_retry(move || {
            let client = client.clone();
            let full = full.clone();
            async move {
                let mut conn = open_connection(&client).await?;
                // EXPIRE GT only ever lengthens the remaining TTL.
                let applied: i64 = redis::cmd("EXPIRE")
                    .arg(&full)
                    .arg(min_ttl_secs)
                    .arg("GT")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                if applied == 0 {
                    let present: bool = conn
                        .exists(&full)
                        .await
                        .map_err(|e| StoreError(e.to_string()))?;
                    if !present {
                        let _: () = conn
                            .set_ex(&full, "", min_ttl_secs)
                            .await
                            .map_err(|e| StoreError(e.to_string()))?;
                    }
                }
                Ok(())
            }
        })
        .await
    }

    async fn subscribe_expiry(&self) -> Result<mpsc::Receiver<String>, StoreError> {
        let mut conn = open_connection(&self.client).await?;
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EXPIRY_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let prefix = format!("{}:", self.prefix);
        let channel = format!("__keyevent@{}__:expired", self.policy.notification_db);
        let backoff = self.policy.reconnect_backoff;
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            loop {
                if tx.is_closed() {
                    return;
                }
                let mut pubsub = match client.get_async_pubsub().await {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("expiry subscription connect failed: {e}");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                };
                if let Err(e) = pubsub.subscribe(&channel).await {
                    warn!("expiry channel subscribe failed: {e}");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                let mut stream = pubsub.on_message();
                while let Some(msg) = stream.next().await {
                    let Ok(key) = msg.get_payload::<String>() else {
                        continue;
                    };
                    // Keys outside our namespace belong to other tenants.
                    let Some(stripped) = key.strip_prefix(&prefix) else {
                        continue;
                    };
                    metrics.expiry_events.fetch_add(1, Ordering::Relaxed);
                    if tx.send(stripped.to_string()).await.is_err() {
                        return;
                    }
                }
                debug!("expiry subscription stream ended, reconnecting");
                tokio::time::sleep(backoff).await;
            }
        });

        Ok(rx)
    }
}
