//! Cross-encoder reranking: pair-score caching, batched model evaluation,
//! and head-keep/tail-drop truncation to a token budget.

use std::sync::atomic::{AtomicBool, Ordering};

use docrank_retrieve::cache::{Cache, CacheConfig};
use docrank_retrieve::tokenize;

use crate::error::RerankError;
use crate::model::CrossEncoderModel;

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_TOKEN_BUDGET: usize = 512;
pub const PAIR_CACHE_ENV_PREFIX: &str = "DOCRANK_PAIR_CACHE";
pub const DEFAULT_PAIR_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_PAIR_CACHE_TTL_SECS: u64 = 3_600;

type PairKey = (String, String, String); // (model_id, query, content)

#[derive(Debug, Clone)]
pub struct RerankedHit {
    pub doc_id: String,
    pub score: f32,
    pub original_rank: usize,
    pub rerank_rank: usize,
}

/// Reranks `(doc_id, content)` candidates against `query` using a
/// cross-encoder model, with an LRU+TTL cache over `(model_id, query,
/// content)` pair scores.
pub struct CrossEncoderReranker<M: CrossEncoderModel> {
    model: M,
    pair_cache: Cache<PairKey, f32>,
    batch_size: usize,
    token_budget: usize,
}

impl<M: CrossEncoderModel> CrossEncoderReranker<M> {
    pub fn new(model: M) -> Self {
        let cache_config = CacheConfig::from_env(
            PAIR_CACHE_ENV_PREFIX,
            DEFAULT_PAIR_CACHE_CAPACITY,
            std::time::Duration::from_secs(DEFAULT_PAIR_CACHE_TTL_SECS),
        );
        Self { model, pair_cache: Cache::new(cache_config), batch_size: DEFAULT_BATCH_SIZE, token_budget: DEFAULT_TOKEN_BUDGET }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn cache_metrics(&self) -> docrank_retrieve::cache::CacheMetrics {
        self.pair_cache.metrics()
    }

    /// Truncates `content` to `self.token_budget` tokens, keeping the head
    /// and dropping the tail, on a tokenizer boundary rather than a raw
    /// byte cut.
    fn truncate(&self, content: &str) -> String {
        let tokens = tokenize(content);
        if tokens.len() <= self.token_budget {
            return content.to_string();
        }
        tokens[..self.token_budget].join(" ")
    }

    /// Reranks `candidates` (in their incoming order, which becomes
    /// `original_rank`) and returns the top `top_k` by descending score.
    /// Returns `Err(RerankError::ModelUnavailable)` without mutating the
    /// cache if the model reports itself unavailable; the caller is
    /// expected to fall back to the pre-rerank ranking in that case.
    pub fn rerank(&self, query: &str, candidates: &[(String, String)], top_k: usize) -> Result<Vec<RerankedHit>, RerankError> {
        self.rerank_cancellable(query, candidates, top_k, None)
    }

    /// Same as `rerank`, but polls `cancel` between batches of the model's
    /// batch driver and bails out with `RerankError::Cancelled` as soon as
    /// it is observed set, leaving already-cached pair scores in place.
    pub fn rerank_cancellable(
        &self,
        query: &str,
        candidates: &[(String, String)],
        top_k: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<RerankedHit>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if !self.model.is_available() {
            return Err(RerankError::ModelUnavailable);
        }

        let model_id = self.model.model_id().to_string();
        let truncated: Vec<String> = candidates.iter().map(|(_, content)| self.truncate(content)).collect();

        let mut scores = vec![None; candidates.len()];
        let mut miss_indices = Vec::new();
        for (i, content) in truncated.iter().enumerate() {
            let key = (model_id.clone(), query.to_string(), content.clone());
            match self.pair_cache.get(&key) {
                Some(score) => scores[i] = Some(score),
                None => miss_indices.push(i),
            }
        }
        tracing::debug!(
            model_id = %model_id,
            candidates = candidates.len(),
            cache_misses = miss_indices.len(),
            batch_size = self.batch_size,
            "cross-encoder batch eval starting"
        );

        for batch in miss_indices.chunks(self.batch_size) {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                tracing::debug!(model_id = %model_id, "cross-encoder batch eval cancelled");
                return Err(RerankError::Cancelled);
            }
            let pairs: Vec<(String, String)> = batch.iter().map(|&i| (query.to_string(), truncated[i].clone())).collect();
            let batch_scores = self.model.score_pairs(&pairs);
            for (&i, score) in batch.iter().zip(batch_scores) {
                scores[i] = Some(score);
                let key = (model_id.clone(), query.to_string(), truncated[i].clone());
                self.pair_cache.put(key, score);
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| (i, score.unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_k.min(candidates.len()));

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (original_index, score))| RerankedHit {
                doc_id: candidates[original_index].0.clone(),
                score,
                original_rank: original_index + 1,
                rerank_rank: rank + 1,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockCrossEncoderModel;

    fn candidates() -> Vec<(String, String)> {
        vec![
            ("a".to_string(), "Use JWT bearer token for authentication".to_string()),
            ("b".to_string(), "Serialize JSON data".to_string()),
        ]
    }

    #[test]
    fn reranks_by_descending_score() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        let results = reranker.rerank("jwt authentication", &candidates(), 2).unwrap();
        assert_eq!(results[0].doc_id, "a");
        assert_eq!(results[0].rerank_rank, 1);
        assert_eq!(results[0].original_rank, 1);
    }

    #[test]
    fn idempotent_on_a_deterministic_model() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        let first = reranker.rerank("jwt authentication", &candidates(), 2).unwrap();
        let reordered: Vec<(String, String)> = first.iter().map(|h| {
            let content = candidates().into_iter().find(|(id, _)| id == &h.doc_id).unwrap().1;
            (h.doc_id.clone(), content)
        }).collect();
        let second = reranker.rerank("jwt authentication", &reordered, 2).unwrap();
        let first_ids: Vec<_> = first.iter().map(|h| h.doc_id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|h| h.doc_id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn unavailable_model_errors_instead_of_degrading_silently() {
        let model = MockCrossEncoderModel::new("mock-ce-v1");
        model.set_available(false);
        let reranker = CrossEncoderReranker::new(model);
        assert!(matches!(reranker.rerank("q", &candidates(), 2), Err(RerankError::ModelUnavailable)));
    }

    #[test]
    fn top_k_larger_than_candidates_returns_all_candidates() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        let results = reranker.rerank("jwt", &candidates(), 100).unwrap();
        assert_eq!(results.len(), candidates().len());
    }

    #[test]
    fn empty_candidates_returns_empty_without_model_call() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        assert!(reranker.rerank("q", &[], 10).unwrap().is_empty());
    }

    #[test]
    fn pre_set_cancel_flag_aborts_before_first_batch() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        let cancel = AtomicBool::new(true);
        let result = reranker.rerank_cancellable("jwt authentication", &candidates(), 2, Some(&cancel));
        assert!(matches!(result, Err(RerankError::Cancelled)));
    }

    #[test]
    fn unset_cancel_flag_does_not_affect_result() {
        let reranker = CrossEncoderReranker::new(MockCrossEncoderModel::new("mock-ce-v1"));
        let cancel = AtomicBool::new(false);
        let result = reranker.rerank_cancellable("jwt authentication", &candidates(), 2, Some(&cancel)).unwrap();
        assert_eq!(result[0].doc_id, "a");
    }
}
