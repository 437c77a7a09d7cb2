// SPDX-License-Identifier: Apache-2.0

use genograph_engine::{EngineError, EngineErrorKind};
use genograph_model::ValidationError;
use genograph_store::StoreError;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ServiceError {
    /// The engine does not know the referenced projection.
    NotFound(String),
    /// Key store unreachable; refcount correctness cannot be
    /// approximated locally, so there is no fallback.
    StoreUnavailable(StoreError),
    /// Engine unreachable or a query it rejected; no retry here.
    Connection(EngineError),
    /// Lost the build lock and the winner never registered the
    /// projection within the poll budget.
    BuildConflict(String),
    /// The build query failed; nothing was registered.
    BuildFailed(String),
    InvalidInput(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::StoreUnavailable(err) => write!(f, "key store unavailable: {err}"),
            Self::Connection(err) => write!(f, "engine failure: {err}"),
            Self::BuildConflict(msg) => write!(f, "build conflict: {msg}"),
            Self::BuildFailed(msg) => write!(f, "build failed: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

impl From<EngineError> for ServiceError {
    fn from(value: EngineError) -> Self {
        match value.kind {
            EngineErrorKind::NotFound => Self::NotFound(value.message),
            _ => Self::Connection(value),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value.0)
    }
}
