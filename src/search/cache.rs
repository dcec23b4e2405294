//! Bounded recency cache for query results.
//!
//! Entries are evicted only when the cache is over capacity, least recently
//! accessed first; nothing expires by age. Every operation takes the same
//! lock, so a `set` can never interleave with a `get` mid-update.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

/// Default number of cached queries.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// A cached value with its access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub last_access: Instant,
    pub hit_count: u64,
}

/// Cache statistics for monitoring and tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    stats: CacheStats,
}

pub struct RecencyCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Default for RecencyCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<K: Hash + Eq, V: Clone> RecencyCache<K, V> {
    /// A cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..CacheStats::default()
                },
            }),
        }
    }

    /// Look up `key`, refreshing its access time on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let Inner { entries, stats } = &mut *inner;
        if let Some(entry) = entries.get_mut(key) {
            entry.last_access = Instant::now();
            entry.hit_count += 1;
            stats.hits += 1;
            Some(entry.value.clone())
        } else {
            stats.misses += 1;
            None
        }
    }

    /// Insert or overwrite `key`, evicting the least recently accessed entry
    /// if the cache would exceed its capacity.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            value,
            last_access: Instant::now(),
            hit_count: 0,
        };
        if let Some((evicted, _)) = inner.entries.push(key, entry) {
            // `push` hands back the old value on overwrite too; only a
            // different key means something was evicted.
            if !inner.entries.contains(&evicted) {
                inner.stats.evictions += 1;
            }
        }
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}
