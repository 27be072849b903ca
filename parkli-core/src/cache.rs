//! In-memory TTL cache for city aggregates.
//!
//! Entries are immutable snapshots behind an `Arc`; replacing one is a single
//! map insert, so readers never see a half-built value. Expired entries are
//! evicted lazily on the next `get`, there is no background sweep.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::model::{City, CityId};

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Thread-safe cache whose entries expire `ttl` after insertion.
#[derive(Debug)]
pub struct Cache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
}

/// The cache shared by every adapter, keyed per city.
pub type CityCache = Cache<City>;

impl<V> Cache<V> {
    /// Empty cache with the given time to live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Configured time to live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`; an expired entry is evicted and reported absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if !entry.is_expired(now, self.ttl) {
            debug!(key, "cache hit");
            return Some(Arc::clone(&entry.value));
        }
        drop(entry);

        let ttl = self.ttl;
        self.entries
            .remove_if(key, |_, stale| stale.is_expired(now, ttl));
        debug!(key, "cache entry expired");
        None
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: Arc<V>) {
        let key = key.into();
        debug!(key = %key, "caching value");
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            debug!(key, "invalidated cache entry");
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        debug!("clearing cache");
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key of a city aggregate.
#[must_use]
pub fn city_key(city: &CityId) -> String {
    format!("city:{city}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn value_is_returned_until_ttl_elapses() {
        let cache = Cache::new(Duration::from_secs(60));
        cache.set("city:bern", Arc::new(7_u32));
        assert_eq!(cache.get("city:bern").as_deref(), Some(&7));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get("city:bern").as_deref(), Some(&7));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("city:bern"), None);
        assert!(cache.is_empty(), "expired entry should be evicted on access");
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_the_timestamp() {
        let cache = Cache::new(Duration::from_secs(10));
        cache.set("k", Arc::new("old"));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", Arc::new("new"));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k").as_deref(), Some(&"new"));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = Cache::new(Duration::from_secs(10));
        cache.set("a", Arc::new(1));
        cache.set("b", Arc::new(2));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn city_keys_are_prefixed() {
        assert_eq!(city_key(&CityId::from("basel")), "city:basel");
    }
}
