// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const PROJECTION_ID_MAX_LEN: usize = 256;
pub const SESSION_ID_MAX_LEN: usize = 128;

/// Opaque key naming one materialized projection inside the analytics
/// engine. Usually the canonical hash of a [`crate::ProjectionSpec`],
/// but callers may supply their own stable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ProjectionId(String);

impl ProjectionId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError(
                "projection id must not be empty".to_string(),
            ));
        }
        if s.len() > PROJECTION_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "projection id exceeds max length {PROJECTION_ID_MAX_LEN}"
            )));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError(
                "projection id must not contain whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub(crate) fn from_hash(hash: String) -> Self {
        Self(hash)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ProjectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a calling client session, long-lived relative to
/// any single projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("session id must not be empty".to_string()));
        }
        if s.len() > SESSION_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "session id exceeds max length {SESSION_ID_MAX_LEN}"
            )));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError(
                "session id must not contain whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
