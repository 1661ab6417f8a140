//! Bounded memoization cache for analytics results
//!
//! Entries are addressed by string fingerprints (see
//! [`AnalyticsEngine`](crate::analytics::AnalyticsEngine)) and carry their own
//! TTL. The cache enforces two ceilings, an entry count and an approximate
//! memory size, evicting the oldest insertions first.
//!
//! ## Value copies
//!
//! Values are cloned into the cache on [`set`](AnalyticsCache::set) and
//! cloned out on [`get`](AnalyticsCache::get), so callers never share state
//! with cache internals. Size is estimated from the value's JSON encoding;
//! a value that cannot be encoded is simply not cached.
//!
//! ## Expiry
//!
//! Expiry is lazy: a `get` that finds an expired entry removes it and counts
//! a miss. There is no background sweep.

use crate::clock::Clock;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Families of cached results, invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePartition {
    /// Bucketed word counts
    Counts,
    /// Trend, prediction, correlation, seasonal and consistency results
    Analytics,
    /// Corpus-wide totals
    Summary,
    /// Period-over-period comparisons
    Comparison,
    /// Per-folder totals
    Breakdown,
    /// Streak statistics
    Streak,
}

impl CachePartition {
    /// Every partition.
    pub const ALL: [CachePartition; 6] = [
        CachePartition::Counts,
        CachePartition::Analytics,
        CachePartition::Summary,
        CachePartition::Comparison,
        CachePartition::Breakdown,
        CachePartition::Streak,
    ];

    /// Partitions that depend on document text, invalidated on modification.
    pub const CONTENT: [CachePartition; 5] = [
        CachePartition::Counts,
        CachePartition::Analytics,
        CachePartition::Summary,
        CachePartition::Breakdown,
        CachePartition::Streak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePartition::Counts => "counts",
            CachePartition::Analytics => "analytics",
            CachePartition::Summary => "summary",
            CachePartition::Comparison => "comparison",
            CachePartition::Breakdown => "breakdown",
            CachePartition::Streak => "streak",
        }
    }

    /// Key prefix shared by every entry in this partition.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

/// Cache key for one operation: `{partition}:{operation}:{params}@g{generation}`.
///
/// The generation suffix makes results computed before a corpus change
/// unreachable even if they are written back after the change.
pub fn fingerprint(
    partition: CachePartition,
    operation: &str,
    params: &str,
    generation: u64,
) -> String {
    format!(
        "{}:{}:{}@g{}",
        partition.as_str(),
        operation,
        params,
        generation
    )
}

/// A cached value with its bookkeeping.
pub struct CacheEntry {
    /// Fingerprint the entry is stored under
    pub key: String,
    payload: Box<dyn Any + Send + Sync>,
    /// Insertion time
    pub created_at: DateTime<Utc>,
    /// Time to live from `created_at`
    pub ttl: Duration,
    /// Estimated footprint (encoded payload plus key)
    pub approx_size_bytes: usize,
    /// Tie-breaker for entries inserted at the same instant
    sequence: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        match self.created_at.checked_add_signed(ttl) {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .field("approx_size_bytes", &self.approx_size_bytes)
            .finish_non_exhaustive()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// `hits / (hits + misses)`, 0 before any lookup
    pub hit_rate: f64,
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub approx_memory_bytes: usize,
}

/// TTL- and size-bounded cache of cloned values.
pub struct AnalyticsCache {
    entries: HashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
    max_memory_bytes: usize,
    memory_bytes: usize,
    hits: u64,
    misses: u64,
    next_sequence: u64,
}

impl AnalyticsCache {
    /// Create a cache with the given ceilings.
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize, max_memory_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
            max_entries: max_entries.max(1),
            max_memory_bytes: max_memory_bytes.max(1),
            memory_bytes: 0,
            hits: 0,
            misses: 0,
            next_sequence: 0,
        }
    }

    /// Look up a live entry and return a copy of it.
    ///
    /// Expired entries are removed. An entry holding a different type than
    /// requested is logged and treated as a miss.
    pub fn get<T>(&mut self, key: &str) -> Option<T>
    where
        T: Clone + 'static,
    {
        let now = self.clock.now();

        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                tracing::debug!(key, "Cache miss");
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.remove(key);
            self.misses += 1;
            tracing::debug!(key, "Cache entry expired");
            return None;
        }

        let value = self
            .entries
            .get(key)
            .and_then(|entry| entry.payload.downcast_ref::<T>())
            .cloned();

        match value {
            Some(value) => {
                self.hits += 1;
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            None => {
                self.misses += 1;
                tracing::warn!(
                    key,
                    expected = std::any::type_name::<T>(),
                    "Cached value has unexpected type, treating as miss"
                );
                None
            }
        }
    }

    /// Store a copy of `value` under `key` for `ttl`.
    ///
    /// Replaces any existing entry for `key`. Oldest entries are evicted
    /// until both ceilings hold with the new entry in place. Returns whether
    /// the value was cached.
    pub fn set<T>(&mut self, key: &str, value: &T, ttl: Duration) -> bool
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        let size = match estimate_size(key, value) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(key, error = %e, "Not caching value");
                return false;
            }
        };

        if size > self.max_memory_bytes {
            tracing::warn!(
                key,
                size,
                max_memory_bytes = self.max_memory_bytes,
                "Value larger than cache ceiling, not caching"
            );
            return false;
        }

        self.remove(key);
        self.evict_for(size);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.memory_bytes += size;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload: Box::new(value.clone()),
                created_at: self.clock.now(),
                ttl,
                approx_size_bytes: size,
                sequence,
            },
        );
        true
    }

    /// Remove every entry whose key contains `pattern`. Returns the count.
    pub fn invalidate(&mut self, pattern: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.contains(pattern))
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        if !keys.is_empty() {
            tracing::debug!(pattern, removed = keys.len(), "Invalidated cache entries");
        }
        keys.len()
    }

    /// Remove every entry in the given partitions. Returns the count.
    pub fn invalidate_partitions(&mut self, partitions: &[CachePartition]) -> usize {
        partitions
            .iter()
            .map(|p| self.invalidate(&p.prefix()))
            .sum()
    }

    /// Drop every entry. Hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_bytes = 0;
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            entry_count: self.entries.len(),
            hit_count: self.hits,
            miss_count: self.misses,
            approx_memory_bytes: self.memory_bytes,
        }
    }

    /// Whether a live or expired entry exists for `key`. Does not count as a lookup.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.memory_bytes = self.memory_bytes.saturating_sub(entry.approx_size_bytes);
        }
    }

    /// Evict oldest-first until an entry of `incoming` bytes fits.
    fn evict_for(&mut self, incoming: usize) {
        let over_limits = |cache: &Self| {
            cache.entries.len() + 1 > cache.max_entries
                || cache.memory_bytes + incoming > cache.max_memory_bytes
        };
        if !over_limits(self) {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, u64, String)> = self
            .entries
            .values()
            .map(|e| (e.created_at, e.sequence, e.key.clone()))
            .collect();
        by_age.sort();

        let mut evicted = 0usize;
        for (_, _, key) in by_age {
            if !over_limits(self) {
                break;
            }
            self.remove(&key);
            evicted += 1;
        }

        tracing::debug!(
            evicted,
            entries = self.entries.len(),
            memory_bytes = self.memory_bytes,
            "Evicted cache entries"
        );
    }
}

/// Encoded payload size plus key length.
fn estimate_size<T: Serialize>(key: &str, value: &T) -> Result<usize> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Error::Cache(format!("failed to estimate size: {e}")))?;
    Ok(bytes.len() + key.len())
}

/// Cache shared between the engine and the change coordinator.
///
/// Locks are short and never held across an `.await`.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<AnalyticsCache>>,
}

impl SharedCache {
    /// Wrap a cache for sharing.
    pub fn new(cache: AnalyticsCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Lock the cache, recovering from a poisoned lock.
    pub fn lock(&self) -> MutexGuard<'_, AnalyticsCache> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_set_then_get_returns_copy() {
        let clock = clock();
        let mut cache = AnalyticsCache::new(clock, 10, 1024 * 1024);

        let mut original = vec![1u64, 2, 3];
        assert!(cache.set("counts:day", &original, Duration::from_secs(60)));
        original.push(4);

        let mut first: Vec<u64> = cache.get("counts:day").unwrap();
        assert_eq!(first, vec![1, 2, 3]);
        first.clear();

        let second: Vec<u64> = cache.get("counts:day").unwrap();
        assert_eq!(second, vec![1, 2, 3]);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 0);
        assert_eq!(stats.hit_rate, 1.0);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let clock = clock();
        let mut cache = AnalyticsCache::new(clock.clone(), 10, 1024 * 1024);
        cache.set("summary:totals", &42u64, Duration::from_secs(300));

        clock.advance(chrono::Duration::seconds(299));
        assert_eq!(cache.get::<u64>("summary:totals"), Some(42));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get::<u64>("summary:totals"), None);
        assert!(!cache.contains_key("summary:totals"));
        assert_eq!(cache.stats().approx_memory_bytes, 0);
        assert_eq!(cache.stats().miss_count, 1);
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let mut cache = AnalyticsCache::new(clock(), 10, 1024);
        cache.set("k", &1u64, Duration::from_secs(60));
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.stats().miss_count, 1);
    }

    #[test]
    fn test_entry_ceiling_evicts_oldest() {
        let clock = clock();
        let mut cache = AnalyticsCache::new(clock.clone(), 3, 1024 * 1024);
        for i in 0..5u64 {
            cache.set(&format!("k{i}"), &i, Duration::from_secs(600));
            clock.advance(chrono::Duration::seconds(1));
            assert!(cache.stats().entry_count <= 3);
        }

        assert!(!cache.contains_key("k0"));
        assert!(!cache.contains_key("k1"));
        assert_eq!(cache.get::<u64>("k4"), Some(4));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_memory_ceiling_evicts_oldest() {
        let clock = clock();
        // Each entry: 12 encoded bytes ("\"xxxxxxxxxx\"") plus a 2 byte key
        let mut cache = AnalyticsCache::new(clock, 100, 30);
        let value = "x".repeat(10);
        cache.set("k1", &value, Duration::from_secs(60));
        cache.set("k2", &value, Duration::from_secs(60));
        assert_eq!(cache.stats().approx_memory_bytes, 28);

        cache.set("k3", &value, Duration::from_secs(60));
        let stats = cache.stats();
        assert!(stats.approx_memory_bytes <= 30);
        assert_eq!(stats.entry_count, 2);
        assert!(!cache.contains_key("k1"));
    }

    #[test]
    fn test_oversized_value_is_not_cached() {
        let mut cache = AnalyticsCache::new(clock(), 10, 8);
        assert!(!cache.set("big", &"y".repeat(64), Duration::from_secs(60)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replacing_key_does_not_double_count() {
        let mut cache = AnalyticsCache::new(clock(), 10, 1024);
        cache.set("k", &1u64, Duration::from_secs(60));
        cache.set("k", &2u64, Duration::from_secs(60));
        assert_eq!(cache.stats().entry_count, 1);
        assert_eq!(cache.stats().approx_memory_bytes, 2);
        assert_eq!(cache.get::<u64>("k"), Some(2));
    }

    #[test]
    fn test_invalidate_by_substring() {
        let mut cache = AnalyticsCache::new(clock(), 10, 1024);
        cache.set("counts:buckets:day@g0", &1u64, Duration::from_secs(60));
        cache.set("counts:buckets:week@g0", &2u64, Duration::from_secs(60));
        cache.set("summary:totals@g0", &3u64, Duration::from_secs(60));

        assert_eq!(cache.invalidate("counts:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate("nothing"), 0);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().approx_memory_bytes, 0);
    }

    #[test]
    fn test_partition_invalidation() {
        let mut cache = AnalyticsCache::new(clock(), 10, 1024);
        let ttl = Duration::from_secs(60);
        for partition in CachePartition::ALL {
            cache.set(&fingerprint(partition, "op", "all", 3), &1u64, ttl);
        }

        let removed = cache.invalidate_partitions(&CachePartition::CONTENT);
        assert_eq!(removed, 5);
        assert!(cache.contains_key("comparison:op:all@g3"));
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(
            fingerprint(CachePartition::Counts, "buckets", "week:all", 7),
            "counts:buckets:week:all@g7"
        );
    }
}
