//! TTL cache implementation

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

/// One stored value. Entries are immutable; a write with the same key
/// replaces the entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Valid iff `now - stored_at < ttl`.
    pub fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Thread-safe keyed store with a per-entry time-to-live
///
/// # Type Parameters
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock type for time-based operations (defaults to `SystemClock`)
pub struct TtlCache<V, C = SystemClock>
where
    V: Clone,
    C: Clock,
{
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    max_entries: usize,
    metrics: MetricsCollector,
    clock: C,
}

impl<V: Clone> TtlCache<V, SystemClock> {
    /// Create a cache using the system clock.
    ///
    /// `max_entries` of `0` means unbounded.
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(default_ttl, max_entries, SystemClock)
    }
}

impl<V, C> TtlCache<V, C>
where
    V: Clone,
    C: Clock,
{
    /// Create a cache with a custom clock (useful for testing)
    pub fn with_clock(default_ttl: Duration, max_entries: usize, clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries,
            metrics: MetricsCollector::default(),
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the value for `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => {
                    self.metrics.record_miss();
                    return None;
                }
                Some(entry) if entry.is_valid(now) => {
                    self.metrics.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent put may have replaced
        // the expired entry in between.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => {
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.record_expiration();
                self.metrics.record_miss();
                debug!(key, "cache entry expired");
                None
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Store `value` under `key` with the default TTL.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let entry = CacheEntry { key: key.clone(), value, stored_at: now, ttl };

        let mut entries = self.entries.write();
        let at_capacity =
            self.max_entries > 0 && entries.len() >= self.max_entries && !entries.contains_key(&key);

        // Make room by dropping exactly one entry: an expired one if any,
        // otherwise the oldest. Other expired entries wait for their lookup.
        if at_capacity {
            let victim = entries
                .values()
                .min_by_key(|entry| (entry.is_valid(now), entry.stored_at))
                .map(|entry| (entry.key.clone(), entry.is_valid(now)));
            if let Some((victim, still_valid)) = victim {
                entries.remove(&victim);
                if still_valid {
                    self.metrics.record_eviction();
                } else {
                    self.metrics.record_expiration();
                }
            }
        }
        entries.insert(key, entry);
        self.metrics.record_insert();
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.write().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }
}
