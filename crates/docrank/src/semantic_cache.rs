//! The semantic query cache: keyed by query embedding rather than exact
//! text, so near-duplicate queries reuse a cached result set. Lookup is a
//! bounded similarity scan rather than a hash lookup, since embeddings
//! rarely repeat exactly.
//!
//! Open question resolved here (the upstream behavior this is grounded on
//! leaves the scan width unspecified): the scan walks only the
//! most-recently-used half of the cache, re-examined on every miss. This
//! is a default, not a correctness guarantee — a cold entry outside the
//! MRU half can be evicted without ever being matched against.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use docrank_retrieve::cache::CacheMetrics;

use crate::options::SearchMode;

pub const DEFAULT_MAX_ENTRIES: usize = 100;
pub const DEFAULT_TTL_SECS: u64 = 1_800;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;

#[derive(Debug, Clone, Copy)]
pub struct SemanticCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
    pub similarity_threshold: f32,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self { max_entries: DEFAULT_MAX_ENTRIES, ttl: Duration::from_secs(DEFAULT_TTL_SECS), similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }
}

struct Entry<V> {
    embedding: Vec<f32>,
    mode: SearchMode,
    value: V,
    inserted_at: Instant,
    last_accessed_at: Instant,
    epoch: u64,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// `epoch` is shared with the orchestrator's BM25 index so a rebuild
/// invalidates stale entries without a dedicated sweep: an entry stamped
/// with a now-superseded epoch is treated as a miss on next lookup.
pub struct SemanticQueryCache<V> {
    config: SemanticCacheConfig,
    entries: RwLock<Vec<Entry<V>>>,
    metrics: RwLock<CacheMetrics>,
    epoch: Arc<AtomicU64>,
}

impl<V: Clone> SemanticQueryCache<V> {
    pub fn new(config: SemanticCacheConfig, epoch: Arc<AtomicU64>) -> Self {
        Self { config, entries: RwLock::new(Vec::new()), metrics: RwLock::new(CacheMetrics::default()), epoch }
    }

    /// `mode` is part of the match, not just the embedding: a `Hybrid`
    /// search and a `Reranked` search over the same query must never share a
    /// cache entry, since a `Reranked` hit implies the cross-encoder actually
    /// ran (spec.md "`mode = reranked` implies hybrid + rerank").
    pub fn get(&self, embedding: &[f32], mode: SearchMode) -> Option<V> {
        let current_epoch = self.epoch.load(Ordering::Acquire);
        let mut entries = self.entries.write().expect("lock poisoned");
        let mut metrics = self.metrics.write().expect("lock poisoned");

        // MRU-half scan: only the most-recently-accessed half is
        // considered a candidate match.
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(entries[i].last_accessed_at));
        let scan_width = order.len().div_ceil(2);
        let scan_indices = &order[..scan_width];

        let mut hit_index = None;
        for &i in scan_indices {
            let entry = &entries[i];
            if entry.mode != mode || entry.epoch != current_epoch || entry.inserted_at.elapsed() > self.config.ttl {
                continue;
            }
            if cosine(&entry.embedding, embedding) >= self.config.similarity_threshold {
                hit_index = Some(i);
                break;
            }
        }

        match hit_index {
            Some(i) => {
                entries[i].last_accessed_at = Instant::now();
                metrics.hits += 1;
                Some(entries[i].value.clone())
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, embedding: Vec<f32>, mode: SearchMode, value: V) {
        let current_epoch = self.epoch.load(Ordering::Acquire);
        let mut entries = self.entries.write().expect("lock poisoned");
        let mut metrics = self.metrics.write().expect("lock poisoned");

        if entries.len() >= self.config.max_entries {
            if let Some((lru_pos, _)) = entries.iter().enumerate().min_by_key(|(_, e)| e.last_accessed_at) {
                entries.remove(lru_pos);
                metrics.evictions_capacity += 1;
            }
        }
        let now = Instant::now();
        entries.push(Entry { embedding, mode, value, inserted_at: now, last_accessed_at: now, epoch: current_epoch });
        metrics.inserts += 1;
    }

    pub fn metrics(&self) -> CacheMetrics {
        let mut metrics = *self.metrics.read().expect("lock poisoned");
        metrics.current_entries = self.entries.read().expect("lock poisoned").len() as u64;
        metrics
    }
}
