//! Client configuration
//!
//! One `ClientConfig` describes one backend. Independent clients (for
//! different backends) each own their own configuration and state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_LIMIT, DEFAULT_SYNC_LOOKBACK_HOURS, DEFAULT_TIMEOUT_SECS,
    MAX_SYNC_LOOKBACK_HOURS,
};
use crate::errors::{Result, TidewireError};

/// Configuration for one API client instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for the REST API (e.g., "https://api.example.com/v1")
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Total attempts (initial try + retries) for transient failures
    pub max_attempts: u32,
    /// Backoff base; delay before retry `n` is `base * 2^n`
    pub base_backoff_ms: u64,
    /// Default TTL for cached read responses
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub chunk_size_bytes: u64,
    pub page_limit: u32,
    pub sync_default_lookback_hours: i64,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            page_limit: DEFAULT_PAGE_LIMIT,
            sync_default_lookback_hours: DEFAULT_SYNC_LOOKBACK_HOURS,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Reject configurations the protocol engines cannot run with.
    ///
    /// # Errors
    /// Returns `TidewireError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(TidewireError::Config("base_url must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(TidewireError::Config("max_attempts must be at least 1".into()));
        }
        if self.chunk_size_bytes == 0 {
            return Err(TidewireError::Config("chunk_size_bytes must be positive".into()));
        }
        if self.page_limit == 0 {
            return Err(TidewireError::Config("page_limit must be positive".into()));
        }
        if self.timeout_secs == 0 {
            return Err(TidewireError::Config("timeout_secs must be positive".into()));
        }
        if !(0..=MAX_SYNC_LOOKBACK_HOURS).contains(&self.sync_default_lookback_hours) {
            return Err(TidewireError::Config(format!(
                "sync_default_lookback_hours must be within 0..={MAX_SYNC_LOOKBACK_HOURS}"
            )));
        }
        Ok(())
    }
}
