//! Result caching.
//!
//! A handler configured with a [`CacheHandler`] and a positive TTL memoizes
//! the rows returned by `get()`. Entries are never invalidated by writes;
//! keep TTLs short or pass explicit keys you can evict yourself.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

/// A pluggable cache store.
///
/// `get` must return `None` only for a genuine miss. Any `Some`, including
/// `Some(Value::Null)`, is treated as a hit.
#[async_trait]
pub trait CacheHandler: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);
}

/// Builds the default cache key for a statement from its inlined SQL.
#[must_use]
pub fn cache_key(raw_sql: &str) -> String {
    format!("oxide_query:{}", blake3::hash(raw_sql.as_bytes()).to_hex())
}

/// An entry's deadline; `None` never expires.
type Expiry = Option<Instant>;

fn alive(expires: Expiry, now: Instant) -> bool {
    expires.is_none_or(|at| at > now)
}

/// An in-process cache with per-entry expiry.
///
/// Expired entries are dropped when read and swept on every write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Expiry)>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops one entry.
    pub fn forget(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl CacheHandler for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((value, expires)) if alive(*expires, Instant::now()) => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (_, expires)| alive(*expires, now));
        entries.insert(key.to_string(), (value, now.checked_add(ttl)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key("SELECT * FROM t WHERE id = 1");
        assert_eq!(a, cache_key("SELECT * FROM t WHERE id = 1"));
        assert_ne!(a, cache_key("SELECT * FROM t WHERE id = 2"));
        assert!(a.starts_with("oxide_query:"));
    }

    #[tokio::test]
    async fn test_memory_cache_hit_miss_and_expiry() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await, None);

        cache.set("k", json!(null), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(json!(null)));

        cache.set("gone", json!(1), Duration::ZERO).await;
        assert_eq!(cache.get("gone").await, None);
        assert_eq!(cache.len(), 1);
        assert!(cache.forget("k"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_unbounded_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache
            .set("forever", json!([1, 2]), Duration::from_secs(u64::MAX))
            .await;
        assert_eq!(cache.get("forever").await, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_entries_on_set() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::ZERO).await;
        cache.set("b", json!(2), Duration::ZERO).await;
        cache.set("c", json!(3), Duration::from_secs(60)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c").await, Some(json!(3)));
    }
}
