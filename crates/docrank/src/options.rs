//! The closed `SearchOptions` record and the result types `search` returns.
//! Every pipeline toggle is an enumerated variant or an explicit boolean —
//! no dynamically-typed config bag.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use docrank_fusion::FusionExplain;
use docrank_retrieve::{ExpandedQuery, Filter, Metadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Vector,
    Hybrid,
    Reranked,
}

pub const DEFAULT_RERANK_CANDIDATE_MULTIPLIER: usize = 4;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub use_query_expansion: bool,
    pub filter: Option<Filter>,
    pub use_diversification: bool,
    pub diversification_lambda: f32,
    pub rerank_candidate_multiplier: usize,
    pub deadline: Option<std::time::Instant>,
    /// Cooperative cancellation: set to `true` from another thread to abort
    /// an in-flight `search` at its next checkpoint. Checked at the same
    /// points as `deadline` (before each suspension point) and threaded
    /// through to the reranker's batch driver.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            use_query_expansion: false,
            filter: None,
            use_diversification: false,
            diversification_lambda: 0.5,
            rerank_candidate_multiplier: DEFAULT_RERANK_CANDIDATE_MULTIPLIER,
            deadline: None,
            cancel: None,
        }
    }
}

impl SearchOptions {
    /// A caller-supplied `0` is treated as `1` rather than as "skip
    /// reranking" — skipping reranking is controlled solely by `mode`.
    pub fn effective_rerank_candidate_multiplier(&self) -> usize {
        self.rerank_candidate_multiplier.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMethod {
    Bm25,
    Vector,
    Fused,
    Reranked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub doc_id: String,
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
    pub source_method: SourceMethod,
    pub original_rank: Option<usize>,
    pub rerank_rank: Option<usize>,
    /// Per-source rank/score breakdown from the fusion stage. `None` for
    /// `mode = vector`, where there is no fusion to explain.
    #[serde(skip)]
    pub explain: Option<FusionExplain>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub mode_used: SearchMode,
    pub expanded_query: Option<ExpandedQuery>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetResult {
    pub field: String,
    pub values: Vec<(String, u64)>,
    pub total_docs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocumentsReport {
    pub new: usize,
    pub skipped: usize,
    pub ids: Vec<String>,
    /// Per-document encoding failures (e.g. non-finite metadata floats).
    /// The batch continues past each one; a failed document contributes to
    /// neither `new` nor `skipped`.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub count: usize,
    pub features: Vec<String>,
    pub cache_stats: Vec<(String, docrank_retrieve::cache::CacheMetrics)>,
}
