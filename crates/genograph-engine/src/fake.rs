// SPDX-License-Identifier: Apache-2.0

use crate::{AccessMode, EngineBackend, EngineError, EngineSession, Params, Row};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The query shapes the fake recognizes, for canning result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeQueryKind {
    Build,
    Drop,
    Exists,
    Community,
    Clustering,
    Expansion,
    Traversal,
}

#[derive(Default)]
struct FakeState {
    connects: AtomicU64,
    closes: AtomicU64,
    build_calls: AtomicU64,
    drop_calls: AtomicU64,
    fail_builds: AtomicBool,
    unreachable: AtomicBool,
    build_delay_ms: AtomicU64,
    graphs: Mutex<HashSet<String>>,
    canned: Mutex<HashMap<FakeQueryKind, Vec<Row>>>,
    queries: Mutex<Vec<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted in-memory engine for tests: records every query, counts
/// session and build/drop traffic, and serves canned rows per query
/// shape. Dropping an unknown graph fails with a not-found error the
/// way the real engine does.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<FakeState>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, kind: FakeQueryKind, rows: Vec<Row>) {
        locked(&self.state.canned).insert(kind, rows);
    }

    pub fn set_fail_builds(&self, fail: bool) {
        self.state.fail_builds.store(fail, Ordering::Relaxed);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::Relaxed);
    }

    pub fn set_build_delay(&self, delay: Duration) {
        self.state
            .build_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn insert_graph(&self, name: &str) {
        locked(&self.state.graphs).insert(name.to_string());
    }

    #[must_use]
    pub fn has_graph(&self, name: &str) -> bool {
        locked(&self.state.graphs).contains(name)
    }

    #[must_use]
    pub fn connects(&self) -> u64 {
        self.state.connects.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn closes(&self) -> u64 {
        self.state.closes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn build_calls(&self) -> u64 {
        self.state.build_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn drop_calls(&self) -> u64 {
        self.state.drop_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        locked(&self.state.queries).clone()
    }
}

#[async_trait]
impl EngineBackend for FakeEngine {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, _mode: AccessMode) -> Result<Box<dyn EngineSession>, EngineError> {
        if self.state.unreachable.load(Ordering::Relaxed) {
            return Err(EngineError::connection("fake engine unreachable"));
        }
        self.state.connects.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.closes.fetch_add(1, Ordering::Relaxed);
    }
}

fn classify(query: &str) -> FakeQueryKind {
    if query.contains("gds.graph.project") {
        FakeQueryKind::Build
    } else if query.contains("gds.graph.drop") {
        FakeQueryKind::Drop
    } else if query.contains("gds.graph.exists") {
        FakeQueryKind::Exists
    } else if query.contains("gds.leiden") {
        FakeQueryKind::Community
    } else if query.contains("ClusteringCoefficient") {
        FakeQueryKind::Clustering
    } else if query.contains("AS geneIDs") {
        FakeQueryKind::Expansion
    } else {
        FakeQueryKind::Traversal
    }
}

fn graph_name_param(params: &Params) -> Result<String, EngineError> {
    params
        .get("graphName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::query("graphName parameter missing"))
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

#[async_trait]
impl EngineSession for FakeSession {
    async fn run(&mut self, query: &str, params: Params) -> Result<Vec<Row>, EngineError> {
        if self.state.unreachable.load(Ordering::Relaxed) {
            return Err(EngineError::connection("fake engine unreachable"));
        }
        locked(&self.state.queries).push(query.to_string());
        let kind = classify(query);
        let canned = locked(&self.state.canned).get(&kind).cloned();

        match kind {
            FakeQueryKind::Build => {
                let delay = self.state.build_delay_ms.load(Ordering::Relaxed);
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                if self.state.fail_builds.load(Ordering::Relaxed) {
                    return Err(EngineError::query("projection build failed"));
                }
                let name = graph_name_param(&params)?;
                locked(&self.state.graphs).insert(name.clone());
                self.state.build_calls.fetch_add(1, Ordering::Relaxed);
                Ok(canned.unwrap_or_else(|| {
                    vec![row(json!({
                        "graphName": name,
                        "nodeCount": 0,
                        "relationshipCount": 0
                    }))]
                }))
            }
            FakeQueryKind::Drop => {
                let name = graph_name_param(&params)?;
                if locked(&self.state.graphs).remove(&name) {
                    self.state.drop_calls.fetch_add(1, Ordering::Relaxed);
                    Ok(vec![row(json!({"graphName": name}))])
                } else {
                    Err(EngineError::not_found(format!(
                        "graph {name} does not exist"
                    )))
                }
            }
            FakeQueryKind::Exists => {
                let name = graph_name_param(&params)?;
                let exists = locked(&self.state.graphs).contains(&name);
                Ok(vec![row(json!({"exists": exists}))])
            }
            FakeQueryKind::Community => Ok(canned.unwrap_or_else(|| {
                vec![row(json!({"modularity": 0.0, "community": []}))]
            })),
            FakeQueryKind::Clustering => Ok(canned.unwrap_or_else(|| {
                vec![row(json!({"averageClusteringCoefficient": 0.0}))]
            })),
            FakeQueryKind::Expansion => Ok(canned.unwrap_or_else(|| {
                let genes = params.get("geneIDs").cloned().unwrap_or_else(|| json!([]));
                vec![row(json!({"geneIDs": genes}))]
            })),
            FakeQueryKind::Traversal => Ok(canned.unwrap_or_else(|| {
                vec![row(json!({"genes": [], "links": []}))]
            })),
        }
    }
}
