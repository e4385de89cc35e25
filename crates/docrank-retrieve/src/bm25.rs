//! Okapi BM25 lexical index with lazy rebuild.
//!
//! `add`/`remove` only touch the document content store and flip a dirty
//! flag; the postings, document frequencies, and average document length
//! are rebuilt from scratch the next time `ensure_built` observes the dirty
//! flag set, which amortizes index maintenance to O(total corpus size) per
//! rebuild rather than per mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::tokenizer::tokenize;

pub const DEFAULT_K1: f32 = 1.5;
pub const DEFAULT_B: f32 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

#[derive(Debug, Clone)]
pub struct PostingEntry {
    pub doc_id: String,
    pub term_frequency: u32,
    pub doc_length: u32,
}

#[derive(Debug, Default)]
struct BuiltState {
    /// term -> doc_id -> term frequency
    postings: HashMap<String, HashMap<String, u32>>,
    doc_lengths: HashMap<String, u32>,
    avgdl: f32,
    n: u32,
}

impl BuiltState {
    fn rebuild(documents: &HashMap<String, String>) -> Self {
        let mut postings: HashMap<String, HashMap<String, u32>> = HashMap::new();
        let mut doc_lengths = HashMap::new();
        let mut total_len: u64 = 0;

        for (doc_id, content) in documents {
            let tokens = tokenize(content);
            doc_lengths.insert(doc_id.clone(), tokens.len() as u32);
            total_len += tokens.len() as u64;
            for term in tokens {
                *postings.entry(term).or_default().entry(doc_id.clone()).or_insert(0) += 1;
            }
        }

        let n = documents.len() as u32;
        let avgdl = if n == 0 { 0.0 } else { total_len as f32 / n as f32 };

        Self { postings, doc_lengths, avgdl, n }
    }

    fn doc_frequency(&self, term: &str) -> u32 {
        self.postings.get(term).map_or(0, HashMap::len) as u32
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.doc_frequency(term);
        (((self.n as f32 - df as f32 + 0.5) / (df as f32 + 0.5)) + 1.0).ln()
    }

    fn score(&self, doc_id: &str, query_terms: &[String], params: &Bm25Params) -> f32 {
        let doc_length = *self.doc_lengths.get(doc_id).unwrap_or(&0) as f32;
        let mut score = 0.0;
        for term in query_terms {
            let tf = self
                .postings
                .get(term)
                .and_then(|docs| docs.get(doc_id))
                .copied()
                .unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let numerator = idf * tf * (params.k1 + 1.0);
            let denominator = tf + params.k1 * (1.0 - params.b + params.b * doc_length / self.avgdl.max(f32::EPSILON));
            score += numerator / denominator;
        }
        score
    }

    fn search(&self, query_terms: &[String], top_k: usize) -> Vec<(String, f32)> {
        if self.n == 0 || query_terms.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<&str> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for term in query_terms {
            if let Some(docs) = self.postings.get(term) {
                for doc_id in docs.keys() {
                    if seen.insert(doc_id.as_str()) {
                        candidates.push(doc_id);
                    }
                }
            }
        }

        let mut scored: Vec<(String, f32)> = candidates
            .into_iter()
            .map(|doc_id| (doc_id.to_string(), self.score(doc_id, query_terms, &Bm25Params::default())))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        scored
    }
}

/// Thread-safe BM25 index. `add`/`remove` are cheap and only mark the index
/// dirty; `search` (via `ensure_built`) performs the actual rebuild the
/// first time it is needed after a mutation.
pub struct Bm25Index {
    documents: RwLock<HashMap<String, String>>,
    built: RwLock<BuiltState>,
    dirty: AtomicBool,
    rebuild_count: AtomicU64,
    params: Bm25Params,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::with_params(Bm25Params::default())
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            built: RwLock::new(BuiltState::default()),
            dirty: AtomicBool::new(false),
            rebuild_count: AtomicU64::new(0),
            params,
        }
    }

    /// Inserts or replaces the content stored for `doc_id`. O(1) amortized.
    pub fn add(&self, doc_id: &str, content: &str) {
        self.documents.write().expect("lock poisoned").insert(doc_id.to_string(), content.to_string());
        self.dirty.store(true, Ordering::Release);
    }

    /// Removes `doc_id` if present. O(1) amortized.
    pub fn remove(&self, doc_id: &str) {
        let removed = self.documents.write().expect("lock poisoned").remove(doc_id).is_some();
        if removed {
            self.dirty.store(true, Ordering::Release);
        }
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.documents.read().expect("lock poisoned").contains_key(doc_id)
    }

    /// Returns the raw content stored for `doc_id`, if indexed. Used by the
    /// orchestrator to hydrate a lexical hit into a full document when the
    /// vector backend's copy is unavailable.
    pub fn content(&self, doc_id: &str) -> Option<String> {
        self.documents.read().expect("lock poisoned").get(doc_id).cloned()
    }

    /// Rebuilds postings/df/avgdl from the stored document set if dirty.
    /// No-op (and does not increment the rebuild counter) when already
    /// clean.
    pub fn ensure_built(&self) {
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        let mut built = self.built.write().expect("lock poisoned");
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        let documents = self.documents.read().expect("lock poisoned");
        *built = BuiltState::rebuild(&documents);
        drop(documents);
        self.dirty.store(false, Ordering::Release);
        self.rebuild_count.fetch_add(1, Ordering::Release);
        tracing::debug!(rebuild_count = self.rebuild_count.load(Ordering::Acquire), n = built.n, "bm25 index rebuilt");
    }

    /// Number of completed `Dirty -> Building -> Clean` transitions.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count.load(Ordering::Acquire)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Scores documents containing at least one query token and returns the
    /// top `top_k` by descending score (ties broken by ascending `doc_id`).
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        self.ensure_built();
        let query_terms = tokenize(query);
        let built = self.built.read().expect("lock poisoned");
        built.search(&query_terms, top_k)
    }

    pub fn len(&self) -> usize {
        self.documents.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_returns_empty_results() {
        let index = Bm25Index::new();
        assert!(index.search("anything", 10).is_empty());
    }

    #[test]
    fn scores_documents_containing_query_terms() {
        let index = Bm25Index::new();
        index.add("jwt", "Use JWT bearer token for authentication");
        index.add("json", "Serialize JSON data");
        let results = index.search("JWT", 10);
        assert_eq!(results[0].0, "jwt");
        assert!(results.iter().all(|(_, score)| *score > 0.0));
    }

    #[test]
    fn unknown_terms_contribute_zero_and_are_excluded() {
        let index = Bm25Index::new();
        index.add("a", "hello world");
        assert!(index.search("nonexistent", 10).is_empty());
    }

    #[test]
    fn lazy_rebuild_counter_increments_once_per_batch() {
        let index = Bm25Index::new();
        for i in 0..100 {
            index.add(&format!("doc{i}"), "some api endpoint documentation");
        }
        assert_eq!(index.rebuild_count(), 0);
        let _ = index.search("api", 10);
        assert_eq!(index.rebuild_count(), 1);
        let _ = index.search("api", 10);
        assert_eq!(index.rebuild_count(), 1);
    }

    #[test]
    fn remove_then_search_excludes_document() {
        let index = Bm25Index::new();
        index.add("a", "authentication guide");
        index.remove("a");
        assert!(index.search("authentication", 10).is_empty());
    }

    #[test]
    fn ties_broken_by_ascending_doc_id() {
        let index = Bm25Index::new();
        index.add("zzz", "identical content here");
        index.add("aaa", "identical content here");
        let results = index.search("identical content", 10);
        assert_eq!(results[0].0, "aaa");
        assert_eq!(results[1].0, "zzz");
    }

    #[test]
    fn top_k_truncates_results() {
        let index = Bm25Index::new();
        for i in 0..10 {
            index.add(&format!("d{i}"), "api endpoint reference");
        }
        assert_eq!(index.search("api", 3).len(), 3);
    }
}
