//! Reciprocal Rank Fusion: merges two ranked candidate lists by summing
//! `1 / (k + rank)` across the lists a document appears in, with a fixed
//! deterministic tie-break.

use std::collections::HashMap;

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const RRF_K_ENV_VAR: &str = "DOCRANK_RRF_K";

#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    pub k: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl RrfConfig {
    pub fn from_env() -> Self {
        let k = std::env::var(RRF_K_ENV_VAR).ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_RRF_K);
        Self { k }
    }
}

/// `1 / (k + rank)` when `rank` (1-based) is present, `0.0` otherwise.
pub fn rrf_contribution(k: f64, rank: Option<usize>) -> f64 {
    rank.map_or(0.0, |r| 1.0 / (k + r as f64))
}

/// Per-source contribution breakdown attached to a fused hit, useful for
/// a caller inspecting why a document ranked where it did.
#[derive(Debug, Clone, Default)]
pub struct FusionExplain {
    pub lexical_rank: Option<usize>,
    pub lexical_score: Option<f32>,
    pub semantic_rank: Option<usize>,
    pub semantic_score: Option<f32>,
    pub rrf_score: f64,
}

#[derive(Debug, Clone)]
pub struct FusedHit {
    pub doc_id: String,
    pub rrf_score: f64,
    pub explain: FusionExplain,
}

/// Fuses two `(doc_id, score)` candidate lists, `lexical` and `semantic`,
/// via RRF. A document present in only one list contributes only that
/// list's term. Output is sorted by descending `rrf_score`, ties broken by
/// ascending `doc_id`.
pub fn fuse_rrf(lexical: &[(String, f32)], semantic: &[(String, f32)], config: RrfConfig) -> Vec<FusedHit> {
    let mut explains: HashMap<String, FusionExplain> = HashMap::new();

    for (rank, (doc_id, score)) in lexical.iter().enumerate() {
        let entry = explains.entry(doc_id.clone()).or_default();
        entry.lexical_rank = Some(rank + 1);
        entry.lexical_score = Some(*score);
    }
    for (rank, (doc_id, score)) in semantic.iter().enumerate() {
        let entry = explains.entry(doc_id.clone()).or_default();
        entry.semantic_rank = Some(rank + 1);
        entry.semantic_score = Some(*score);
    }

    let mut hits: Vec<FusedHit> = explains
        .into_iter()
        .map(|(doc_id, mut explain)| {
            let rrf_score = rrf_contribution(config.k, explain.lexical_rank) + rrf_contribution(config.k, explain.semantic_rank);
            explain.rrf_score = rrf_score;
            FusedHit { doc_id, rrf_score, explain }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    hits
}
