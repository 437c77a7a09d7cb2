// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TTL granted to a projection's existence key on build and the
    /// floor applied on every bind (never shortening).
    pub projection_ttl_secs: u64,
    /// Floor for the session-binding key's TTL on every bind.
    pub session_ttl_secs: u64,
    /// TTL on the per-identity build lock; bounds the damage of a
    /// builder that dies holding it.
    pub build_lock_ttl_secs: u64,
    /// How often a losing builder re-checks whether the winner has
    /// registered the projection.
    pub build_poll_interval: Duration,
    /// Poll budget before a losing builder gives up with a conflict.
    pub build_wait_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            projection_ttl_secs: 120,
            session_ttl_secs: 120,
            build_lock_ttl_secs: 10,
            build_poll_interval: Duration::from_millis(100),
            build_wait_attempts: 100,
        }
    }
}

pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), String> {
    if cfg.projection_ttl_secs == 0 || cfg.session_ttl_secs == 0 {
        return Err("projection and session TTLs must be > 0".to_string());
    }
    if cfg.build_lock_ttl_secs == 0 {
        return Err("build lock TTL must be > 0".to_string());
    }
    if cfg.build_poll_interval.is_zero() {
        return Err("build poll interval must be > 0".to_string());
    }
    if cfg.build_wait_attempts == 0 {
        return Err("build wait attempts must be > 0".to_string());
    }
    let poll_budget = cfg.build_poll_interval * cfg.build_wait_attempts;
    if poll_budget < Duration::from_secs(cfg.build_lock_ttl_secs) {
        return Err(
            "build poll budget must cover the lock TTL, or losers give up before a crashed \
             winner's lock lapses"
                .to_string(),
        );
    }
    Ok(())
}
