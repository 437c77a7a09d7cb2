// SPDX-License-Identifier: Apache-2.0

use crate::{KeyStore, StoreError, ValueWithTtl};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

const EXPIRY_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process [`KeyStore`] with real TTL semantics and expiry
/// notifications, used by tests the way the engine fake is. All
/// operations share one mutex, which makes every primitive trivially
/// atomic.
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Entry>>,
    subscribers: Mutex<Vec<mpsc::Sender<String>>>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_sweep_interval(Duration::from_millis(25))
    }

    /// The sweeper turns elapsed TTLs into expiry notifications; lazy
    /// checks on access keep reads correct between sweeps.
    #[must_use]
    pub fn with_sweep_interval(interval: Duration) -> Arc<Self> {
        let store = Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        });
        let weak = Arc::downgrade(&store);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                let Some(me) = weak.upgrade() else { break };
                me.sweep_expired().await;
            }
        });
        store
    }

    async fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<String> = {
            let mut map = self.entries.lock().await;
            let keys: Vec<String> = map
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                map.remove(key);
            }
            keys
        };
        if !expired.is_empty() {
            self.notify_expired(expired).await;
        }
    }

    async fn notify_expired(&self, keys: Vec<String>) {
        let mut subs = self.subscribers.lock().await;
        subs.retain(|tx| !tx.is_closed());
        for key in keys {
            for tx in subs.iter() {
                let _ = tx.try_send(key.clone());
            }
        }
    }

    /// Removes the entry if its TTL elapsed; returns whether it did.
    /// The caller is responsible for notifying outside the lock.
    fn reap_if_expired(map: &mut HashMap<String, Entry>, key: &str, now: Instant) -> bool {
        if map.get(key).is_some_and(|e| e.is_expired(now)) {
            map.remove(key);
            return true;
        }
        false
    }

    async fn counter_step(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut notify = None;
        let result = {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            match map.get_mut(key) {
                Some(entry) => match entry.value.parse::<i64>() {
                    Ok(current) => {
                        let next = current + delta;
                        entry.value = next.to_string();
                        Ok(next)
                    }
                    Err(_) => Err(StoreError(format!(
                        "key {key} does not hold an integer counter"
                    ))),
                },
                None => {
                    map.insert(
                        key.to_string(),
                        Entry {
                            value: delta.to_string(),
                            expires_at: None,
                        },
                    );
                    Ok(delta)
                }
            }
        };
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        result
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut map = self.entries.lock().await;
        map.insert(
            key.to_string(),
            Entry {
                value: String::new(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut notify = None;
        let present = {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            map.contains_key(key)
        };
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        Ok(present)
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        self.counter_step(key, 1).await
    }

    async fn decrement(&self, key: &str) -> Result<i64, StoreError> {
        self.counter_step(key, -1).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.entries.lock().await;
        map.remove(key);
        Ok(())
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<ValueWithTtl>, StoreError> {
        let now = Instant::now();
        let mut notify = None;
        let found = {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            map.get(key).map(|entry| ValueWithTtl {
                value: entry.value.clone(),
                ttl_remaining: entry
                    .expires_at
                    .map(|deadline| deadline.saturating_duration_since(now)),
            })
        };
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        Ok(found)
    }

    async fn swap_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut notify = None;
        let previous = {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            map.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + Duration::from_secs(ttl_secs)),
                },
            )
            .map(|e| e.value)
        };
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        Ok(previous)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut notify = None;
        let won = {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            if map.contains_key(key) {
                false
            } else {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: Some(now + Duration::from_secs(ttl_secs)),
                    },
                );
                true
            }
        };
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        Ok(won)
    }

    async fn refresh_expiry_at_least(
        &self,
        key: &str,
        min_ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let floor = now + Duration::from_secs(min_ttl_secs);
        let mut notify = None;
        {
            let mut map = self.entries.lock().await;
            if Self::reap_if_expired(&mut map, key, now) {
                notify = Some(key.to_string());
            }
            match map.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = match entry.expires_at {
                        Some(current) if current >= floor => Some(current),
                        Some(_) => Some(floor),
                        // No expiry set: already lives longer than any floor.
                        None => None,
                    };
                }
                None => {
                    map.insert(
                        key.to_string(),
                        Entry {
                            value: String::new(),
                            expires_at: Some(floor),
                        },
                    );
                }
            }
        }
        if let Some(key) = notify {
            self.notify_expired(vec![key]).await;
        }
        Ok(())
    }

    async fn subscribe_expiry(&self) -> Result<mpsc::Receiver<String>, StoreError> {
        let (tx, rx) = mpsc::channel(EXPIRY_CHANNEL_CAPACITY);
        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }
}
