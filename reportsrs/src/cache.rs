//! Time-bounded memoization shared by the schema introspector and lookup cache.
//!
//! Entries expire purely by elapsed time on an injected [`Clock`]; there is no
//! explicit invalidation signal from the database.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of "now" for cache expiry.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same offset.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Cache entry with timestamp for TTL tracking.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Key/value cache with TTL and size limits.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_size: usize,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(ttl: Duration, max_size: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_size: max_size.max(1),
            clock,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_expired();
            if self.entries.len() >= self.max_size {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: self.clock.now(),
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let now = self.clock.now();
        self.entries.get(key).and_then(|entry| {
            if now.saturating_duration_since(entry.inserted_at) < self.ttl {
                Some(&entry.value)
            } else {
                // Expired - treat as cache miss
                None
            }
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove expired entries from the cache.
    pub fn evict_expired(&mut self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
    }

    /// Remove the oldest entry from the cache.
    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(k, _)| k.clone())
        {
            tracing::debug!(key = ?oldest_key, "evicting oldest cache entry");
            self.entries.remove(&oldest_key);
        }
    }

    /// Current entry count, including expired entries not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

}
