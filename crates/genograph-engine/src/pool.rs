// SPDX-License-Identifier: Apache-2.0

use crate::{AccessMode, EngineBackend, EngineError, EngineSession, Params, Row};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const DEFAULT_MAX_POOL_SIZE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Idle sessions retained per access mode; releases beyond this
    /// close the session instead. Acquisition itself is never capped.
    pub max_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }
}

#[derive(Default)]
pub struct PoolMetrics {
    pub created: AtomicU64,
    pub reused: AtomicU64,
    pub returned: AtomicU64,
    pub discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetricsSnapshot {
    pub created: u64,
    pub reused: u64,
    pub returned: u64,
    pub discarded: u64,
}

impl PoolMetrics {
    #[must_use]
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

type Shelf = Arc<Mutex<Vec<Box<dyn EngineSession>>>>;

fn lock_shelf(shelf: &Shelf) -> MutexGuard<'_, Vec<Box<dyn EngineSession>>> {
    shelf.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded pool of reusable engine sessions, split by access mode.
/// The free lists are plain mutexes, never held across an await;
/// acquisition hands each caller an exclusively-owned session.
pub struct SessionPool {
    backend: Arc<dyn EngineBackend>,
    read_idle: Shelf,
    write_idle: Shelf,
    cfg: PoolConfig,
    pub metrics: Arc<PoolMetrics>,
}

impl SessionPool {
    #[must_use]
    pub fn new(backend: Arc<dyn EngineBackend>, cfg: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            read_idle: Arc::new(Mutex::new(Vec::new())),
            write_idle: Arc::new(Mutex::new(Vec::new())),
            cfg,
            metrics: Arc::new(PoolMetrics::default()),
        })
    }

    fn shelf(&self, mode: AccessMode) -> &Shelf {
        match mode {
            AccessMode::Read => &self.read_idle,
            AccessMode::Write => &self.write_idle,
        }
    }

    /// Pops a pooled idle session, else opens a fresh one. Exhaustion
    /// never blocks; an unreachable engine propagates to the caller.
    pub async fn acquire(&self, mode: AccessMode) -> Result<PooledSession, EngineError> {
        let pooled = lock_shelf(self.shelf(mode)).pop();
        let session = match pooled {
            Some(session) => {
                self.metrics.reused.fetch_add(1, Ordering::Relaxed);
                session
            }
            None => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                self.backend.connect(mode).await?
            }
        };
        Ok(PooledSession {
            session: Some(session),
            shelf: Arc::clone(self.shelf(mode)),
            max_pool_size: self.cfg.max_pool_size,
            metrics: Arc::clone(&self.metrics),
        })
    }

    #[must_use]
    pub fn idle_count(&self, mode: AccessMode) -> usize {
        lock_shelf(self.shelf(mode)).len()
    }

    /// Drops every idle session; in-flight sessions close when their
    /// guards drop.
    pub fn drain(&self) {
        let read = lock_shelf(&self.read_idle).drain(..).count();
        let write = lock_shelf(&self.write_idle).drain(..).count();
        debug!(read, write, "session pool drained");
    }
}

/// Scoped session guard. Dropping it returns the session to the pool
/// when capacity allows and closes it otherwise, so release happens
/// exactly once per acquire on every path.
pub struct PooledSession {
    session: Option<Box<dyn EngineSession>>,
    shelf: Shelf,
    max_pool_size: usize,
    metrics: Arc<PoolMetrics>,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("has_session", &self.session.is_some())
            .field("max_pool_size", &self.max_pool_size)
            .finish()
    }
}

impl PooledSession {
    pub async fn run(&mut self, query: &str, params: Params) -> Result<Vec<Row>, EngineError> {
        match self.session.as_mut() {
            Some(session) => session.run(query, params).await,
            None => Err(EngineError::connection("session already released")),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let mut idle = lock_shelf(&self.shelf);
            if idle.len() < self.max_pool_size {
                idle.push(session);
                self.metrics.returned.fetch_add(1, Ordering::Relaxed);
            } else {
                // Dropping the boxed session closes it.
                self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
