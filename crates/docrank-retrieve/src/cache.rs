//! A generic, thread-safe LRU + TTL cache. The embedding cache, the
//! cross-encoder pair-score cache, and the orchestrator's semantic query
//! cache are all built on top of this primitive rather than each
//! reimplementing eviction bookkeeping.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// One cached value plus the bookkeeping needed for LRU eviction and TTL
/// expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        Self { value, inserted_at: now, last_accessed_at: now, access_count: 0 }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }

    fn touch(&mut self) {
        self.last_accessed_at = Instant::now();
        self.access_count += 1;
    }
}

/// Snapshot of cache activity, surfaced through `Stats::cache_stats`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions_capacity: u64,
    pub evictions_ttl: u64,
    pub inserts: u64,
    pub current_entries: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { max_entries, ttl }
    }

    /// Reads `env_prefix_CAPACITY` and `env_prefix_TTL_SECS`, falling back
    /// to `default_max_entries`/`default_ttl` on missing or unparseable
    /// values.
    pub fn from_env(env_prefix: &str, default_max_entries: usize, default_ttl: Duration) -> Self {
        let max_entries = std::env::var(format!("{env_prefix}_CAPACITY"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_max_entries);
        let ttl = std::env::var(format!("{env_prefix}_TTL_SECS"))
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_ttl);
        Self { max_entries, ttl }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    metrics: CacheMetrics,
}

/// An LRU-evicting, TTL-expiring cache. All operations serialize through a
/// single `RwLock`; reads take a write lock too, since a hit updates
/// recency bookkeeping.
pub struct Cache<K, V> {
    config: CacheConfig,
    inner: RwLock<Inner<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self { config, inner: RwLock::new(Inner { entries: HashMap::new(), metrics: CacheMetrics::default() }) }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(self.config.ttl),
            None => {
                inner.metrics.misses += 1;
                return None;
            }
        };
        if expired {
            inner.entries.remove(key);
            inner.metrics.misses += 1;
            inner.metrics.evictions_ttl += 1;
            return None;
        }
        let entry = inner.entries.get_mut(key).expect("checked above");
        entry.touch();
        inner.metrics.hits += 1;
        Some(entry.value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_entries {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed_at)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
                inner.metrics.evictions_capacity += 1;
            }
        }
        inner.entries.insert(key, CacheEntry::new(value));
        inner.metrics.inserts += 1;
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        inner.entries.clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        let inner = self.inner.read().expect("cache lock poisoned");
        let mut metrics = inner.metrics;
        metrics.current_entries = inner.entries.len() as u64;
        metrics
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
