#![forbid(unsafe_code)]

use async_trait::async_trait;

pub const CRATE_NAME: &str = "genograph-engine";

mod fake;
mod http_backend;
mod pool;
pub mod queries;

pub use fake::{FakeEngine, FakeQueryKind};
pub use http_backend::HttpEngineBackend;
pub use pool::{PoolConfig, PoolMetrics, PoolMetricsSnapshot, PooledSession, SessionPool};

/// One opaque result row from the analytics engine.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Named query parameters, passed alongside the opaque query text.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Read and write sessions may route to different replicas, so the
/// pool is partitioned by access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineErrorKind {
    /// Engine unreachable or transport-level failure.
    Connection,
    /// The engine does not know the referenced projection.
    NotFound,
    /// The engine rejected the query itself.
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Connection,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::NotFound,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Query,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, EngineErrorKind::NotFound)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}

/// An exclusively-owned bidirectional engine session. Closing is
/// drop-based: every backend's session type releases its transport
/// resources when dropped.
#[async_trait]
pub trait EngineSession: Send + 'static {
    async fn run(&mut self, query: &str, params: Params) -> Result<Vec<Row>, EngineError>;
}

#[async_trait]
pub trait EngineBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Opens a fresh session. Unreachable engines surface here; the
    /// pool does not retry on the caller's behalf.
    async fn connect(&self, mode: AccessMode) -> Result<Box<dyn EngineSession>, EngineError>;
}
