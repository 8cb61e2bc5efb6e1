//! Response cache with per-entry time-to-live
//!
//! # Semantics
//!
//! - An entry is valid iff `now - stored_at < ttl`
//! - Expired entries are dropped lazily on lookup, never swept in the
//!   background
//! - Writes replace whole entries; there is no merge and no dependency
//!   tracking between keys
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use tidewire_common::cache::{cache_key, TtlCache};
//!
//! let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(300), 100);
//! let key = cache_key("GET /posts", &[("page", "1"), ("limit", "20")]);
//! cache.put(key.clone(), "cached body".to_string());
//! assert_eq!(cache.get(&key).as_deref(), Some("cached body"));
//! ```

mod core;
mod stats;

use url::form_urlencoded;

pub use self::core::{CacheEntry, TtlCache};
pub use stats::CacheStats;

/// Deterministic cache key from an endpoint identity and its parameters.
///
/// Parameters are sorted so the key does not depend on the order the caller
/// listed them in, and form-urlencoded so no two parameter sets share a key.
pub fn cache_key<K, V>(endpoint: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(&str, &str)> =
        params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())).collect();
    pairs.sort_unstable();

    if pairs.is_empty() {
        return endpoint.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();
    format!("{endpoint}?{query}")
}
