//! The top-level pipeline: composes the lexical index, a vector backend,
//! fusion, optional reranking, and optional diversification behind a single
//! `search` call. Owns the caches and the locking discipline that keeps
//! concurrent reads safe while a background BM25 rebuild is in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docrank_fusion::{fuse_rrf, FusionExplain, RrfConfig};
use docrank_rerank::{mmr_select, CrossEncoderModel, CrossEncoderReranker, MmrCandidate, RerankError};
use docrank_retrieve::cache::{Cache, CacheConfig};
use docrank_retrieve::{
    content_fingerprint, Bm25Index, ContentPattern, Document, EmbeddingModel, ExpansionMethod, Filter, Metadata,
    QueryExpander, RetrieveError, VectorBackend, VectorHit,
};

use crate::error::SearchError;
use crate::facet::compute_facets;
use crate::options::{AddDocumentsReport, DeleteReport, FacetResult, RankedResult, SearchMode, SearchOptions, SearchResponse, SourceMethod, Stats};
use crate::semantic_cache::{SemanticCacheConfig, SemanticQueryCache};

/// Candidate multiplier used when reranking is not requested; reranked
/// searches use `SearchOptions::effective_rerank_candidate_multiplier`
/// instead.
pub const DEFAULT_VECTOR_MULTIPLIER_NO_RERANK: usize = 2;
/// Chunk size for `VectorBackend::upsert` calls inside `add_documents`, so a
/// large batch doesn't turn into one oversized request to a real backend.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 500;
pub const EMBEDDING_CACHE_ENV_PREFIX: &str = "DOCRANK_EMBEDDING_CACHE";
pub const DEFAULT_EMBEDDING_CACHE_CAPACITY: usize = 5_000;
pub const DEFAULT_EMBEDDING_CACHE_TTL_SECS: u64 = 3_600;

/// A document awaiting insertion. `id` is generated from `(content,
/// metadata)` via `content_fingerprint` when omitted, which is what makes
/// re-inserting an identical document a no-op (`skipped`, not `new`).
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub metadata: Metadata,
    pub id: Option<String>,
}

impl NewDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new(), id: None }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

fn non_finite_metadata_field(metadata: &Metadata) -> Option<String> {
    use docrank_retrieve::{MetadataScalar, MetadataValue};
    for (field, value) in metadata {
        let bad = match value {
            MetadataValue::Float(f) => !f.is_finite(),
            MetadataValue::List(items) => items.iter().any(|s| matches!(s, MetadataScalar::Float(f) if !f.is_finite())),
            _ => false,
        };
        if bad {
            return Some(field.clone());
        }
    }
    None
}

fn content_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Rejects filter shapes the smart constructors in `docrank_retrieve::Filter`
/// would have rejected, so a caller constructing `Filter` variants directly
/// (all of them are public) still can't smuggle an invalid tree past
/// `search` — "Filter validation failure → SearchError::Filter, no side
/// effects" holds regardless of how the filter was built.
fn validate_filter(filter: &Filter) -> Result<(), RetrieveError> {
    match filter {
        Filter::Leaf { .. } => Ok(()),
        Filter::And(children) | Filter::Or(children) => {
            if children.is_empty() {
                return Err(RetrieveError::invalid_filter("And/Or requires at least one child"));
            }
            children.iter().try_for_each(validate_filter)
        }
        Filter::Not(child) => validate_filter(child),
        Filter::ContentMatch { pattern: ContentPattern::Regex(pattern), .. } => {
            regex::Regex::new(pattern).map(|_| ()).map_err(|e| RetrieveError::invalid_filter(format!("invalid regex: {e}")))
        }
        Filter::ContentMatch { pattern: ContentPattern::Substring(_), .. } => Ok(()),
    }
}

/// Checked before every suspension point in `search`: a blown deadline and
/// an operator-triggered cancellation are both surfaced as
/// `SearchError::Timeout` (the error taxonomy has no dedicated
/// "cancelled" kind, §7) — in both cases the search is aborted before
/// completion and returns no partial results.
fn check_interrupt(options: &SearchOptions) -> Result<(), SearchError> {
    if let Some(deadline) = options.deadline {
        if Instant::now() >= deadline {
            return Err(SearchError::Timeout);
        }
    }
    if let Some(cancel) = &options.cancel {
        if cancel.load(Ordering::Acquire) {
            return Err(SearchError::Timeout);
        }
    }
    Ok(())
}

/// Composes the lexical index, a vector backend `B` (paired with embedding
/// model `E`), and an optional cross-encoder `C` into a single hybrid search
/// pipeline.
pub struct SearchOrchestrator<B: VectorBackend, E: EmbeddingModel, C: CrossEncoderModel> {
    bm25: Bm25Index,
    backend: B,
    embedder: E,
    expander: QueryExpander,
    reranker: Option<CrossEncoderReranker<C>>,
    embedding_cache: Cache<(String, u64), Vec<f32>>,
    semantic_cache: SemanticQueryCache<(Vec<RankedResult>, bool)>,
    epoch: Arc<AtomicU64>,
    degraded_logged: AtomicBool,
    seeded_from_backend: AtomicBool,
}

/// Page size used when reseeding the lexical index from the vector backend
/// on first search after a restart; keeps a single page's worth of content
/// in memory rather than listing the whole corpus at once.
const BACKEND_SEED_PAGE_SIZE: usize = 1_000;

impl<B: VectorBackend, E: EmbeddingModel, C: CrossEncoderModel> SearchOrchestrator<B, E, C> {
    /// A hybrid-only orchestrator: `mode = reranked` will degrade to fused
    /// results (no reranker configured is treated the same as the reranker
    /// reporting itself unavailable).
    pub fn new(backend: B, embedder: E) -> Self {
        Self::build(backend, embedder, None, QueryExpander::new())
    }

    pub fn with_reranker(backend: B, embedder: E, reranker: CrossEncoderReranker<C>) -> Self {
        Self::build(backend, embedder, Some(reranker), QueryExpander::new())
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    fn build(backend: B, embedder: E, reranker: Option<CrossEncoderReranker<C>>, expander: QueryExpander) -> Self {
        let epoch = Arc::new(AtomicU64::new(0));
        let embedding_cache_config =
            CacheConfig::from_env(EMBEDDING_CACHE_ENV_PREFIX, DEFAULT_EMBEDDING_CACHE_CAPACITY, Duration::from_secs(DEFAULT_EMBEDDING_CACHE_TTL_SECS));
        Self {
            bm25: Bm25Index::new(),
            backend,
            embedder,
            expander,
            reranker,
            embedding_cache: Cache::new(embedding_cache_config),
            semantic_cache: SemanticQueryCache::new(SemanticCacheConfig::default(), epoch.clone()),
            epoch,
            degraded_logged: AtomicBool::new(false),
            seeded_from_backend: AtomicBool::new(false),
        }
    }

    /// The core keeps no state of its own between restarts; a freshly
    /// constructed orchestrator wrapping an already-populated backend has
    /// an empty BM25 index until this runs once. Paginates through
    /// `backend.list` and feeds every document into the lexical index
    /// without re-upserting into the backend. Idempotent and safe to call
    /// on every `search`; only the first call after construction does any
    /// work.
    fn ensure_seeded_from_backend(&self) -> Result<(), SearchError> {
        if self.seeded_from_backend.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut offset = 0;
        loop {
            let page = self.backend.list(offset, BACKEND_SEED_PAGE_SIZE).map_err(SearchError::from)?;
            let page_len = page.len();
            for doc in page {
                if !self.bm25.contains(&doc.id) {
                    self.bm25.add(&doc.id, &doc.content);
                }
            }
            if page_len < BACKEND_SEED_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        self.seeded_from_backend.store(true, Ordering::Release);
        Ok(())
    }

    fn embed_query_cached(&self, text: &str) -> Vec<f32> {
        let key = (self.embedder.model_id().to_string(), content_hash(text));
        if let Some(cached) = self.embedding_cache.get(&key) {
            return cached;
        }
        let embedding = self.embedder.embed_query(text);
        self.embedding_cache.put(key, embedding.clone());
        embedding
    }

    fn vector_leg(&self, query_text: &str, top_k: usize, pushdown: Option<&Filter>) -> Result<Vec<VectorHit>, SearchError> {
        let embedding = self.embed_query_cached(query_text);
        self.backend.query(&embedding, top_k, pushdown).map_err(SearchError::from)
    }

    /// Inserts `docs`, skipping any whose id (explicit or content-derived)
    /// is already indexed. Per-document metadata-encoding failures (a
    /// non-finite float) are accumulated in the report and do not abort the
    /// batch; a vector-backend failure aborts the whole call and rolls back
    /// the documents that were about to be upserted.
    pub fn add_documents(&self, docs: impl IntoIterator<Item = NewDocument>) -> Result<AddDocumentsReport, SearchError> {
        let mut report = AddDocumentsReport { new: 0, skipped: 0, ids: Vec::new(), errors: Vec::new() };
        let mut accepted: Vec<Document> = Vec::new();

        for new_doc in docs {
            if let Some(field) = non_finite_metadata_field(&new_doc.metadata) {
                report.errors.push(format!("document rejected: non-finite float in metadata field {field:?}"));
                continue;
            }
            let id = new_doc.id.clone().unwrap_or_else(|| content_fingerprint(&new_doc.content, &new_doc.metadata));
            if self.bm25.contains(&id) {
                report.skipped += 1;
                continue;
            }
            self.bm25.add(&id, &new_doc.content);
            accepted.push(Document { id: id.clone(), content: new_doc.content, metadata: new_doc.metadata });
            report.new += 1;
            report.ids.push(id);
        }

        for chunk in accepted.chunks(DEFAULT_UPSERT_BATCH_SIZE) {
            if let Err(err) = self.backend.upsert(chunk) {
                for doc in &accepted {
                    self.bm25.remove(&doc.id);
                }
                return Err(SearchError::from(err));
            }
        }

        Ok(report)
    }

    pub fn add_document(&self, doc: NewDocument) -> Result<AddDocumentsReport, SearchError> {
        self.add_documents(std::iter::once(doc))
    }

    pub fn bulk_delete(&self, ids: &[String]) -> Result<DeleteReport, SearchError> {
        let mut deleted = 0;
        let mut not_found = 0;
        for id in ids {
            if self.bm25.contains(id) {
                deleted += 1;
            } else {
                not_found += 1;
            }
        }
        for id in ids {
            self.bm25.remove(id);
        }
        self.backend.delete(ids).map_err(SearchError::from)?;
        Ok(DeleteReport { deleted, not_found })
    }

    pub fn delete(&self, id: &str) -> Result<DeleteReport, SearchError> {
        self.bulk_delete(std::slice::from_ref(&id.to_string()))
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>, SearchError> {
        self.backend.get(id).map_err(SearchError::from)
    }

    pub fn stats(&self) -> Result<Stats, SearchError> {
        let count = self.backend.count().map_err(SearchError::from)?;
        let mut cache_stats = vec![
            ("embedding_cache".to_string(), self.embedding_cache.metrics()),
            ("semantic_query_cache".to_string(), self.semantic_cache.metrics()),
        ];
        let mut features = vec![
            "bm25".to_string(),
            "vector".to_string(),
            "rrf_fusion".to_string(),
            "query_expansion".to_string(),
            "mmr_diversification".to_string(),
            "facets".to_string(),
        ];
        if let Some(reranker) = &self.reranker {
            cache_stats.push(("pair_score_cache".to_string(), reranker.cache_metrics()));
            features.push("cross_encoder_rerank".to_string());
        }
        Ok(Stats { count, features, cache_stats })
    }

    pub fn search_with_facets(
        &self,
        query: &str,
        n_results: usize,
        facet_fields: &[String],
        top_facet_values: usize,
        options: &SearchOptions,
    ) -> Result<(SearchResponse, Vec<FacetResult>), SearchError> {
        let response = self.search(query, n_results, options)?;
        let facets = compute_facets(&response.results, facet_fields, top_facet_values);
        Ok((response, facets))
    }

    /// Runs the full retrieve → fuse → rerank → diversify pipeline per
    /// `options.mode`. `n_results = 0` short-circuits before any backend
    /// call; an invalid filter returns `SearchError::Filter` before any
    /// retrieval side effect.
    pub fn search(&self, query: &str, n_results: usize, options: &SearchOptions) -> Result<SearchResponse, SearchError> {
        if let Some(filter) = &options.filter {
            validate_filter(filter)?;
        }

        if n_results == 0 {
            return Ok(SearchResponse { results: Vec::new(), mode_used: options.mode, expanded_query: None, degraded: false });
        }

        check_interrupt(options)?;
        self.ensure_seeded_from_backend()?;

        let expanded_query = if options.use_query_expansion { Some(self.expander.expand(query, ExpansionMethod::Auto)) } else { None };
        let effective_query = match &expanded_query {
            Some(expanded) => {
                let mut parts = vec![expanded.original.clone()];
                parts.extend(expanded.terms.iter().cloned());
                parts.extend(expanded.variations.iter().cloned());
                parts.join(" ")
            }
            None => query.to_string(),
        };

        self.bm25.ensure_built();
        self.epoch.store(self.bm25.rebuild_count(), Ordering::Release);

        let supports = |op| self.backend.supports(op);
        let (pushdown, residual) = match &options.filter {
            Some(filter) => filter.compile_for_backend(&supports),
            None => (None, None),
        };

        // The semantic cache is scoped to the unfiltered, non-diversified
        // hybrid/reranked path: its key is the query embedding plus
        // `options.mode`, so honoring a per-request filter or MMR lambda
        // would require folding them into the key too, which the corpus
        // this is grounded on does not do either (see DESIGN.md). The mode
        // is part of the key specifically so a `Hybrid` search can never
        // return a `Reranked` cache hit or vice versa.
        let cacheable = options.filter.is_none() && !options.use_diversification && options.mode != SearchMode::Vector;
        let query_embedding = if cacheable { Some(self.embed_query_cached(&effective_query)) } else { None };
        if let Some(embedding) = &query_embedding {
            if let Some((cached_results, cached_degraded)) = self.semantic_cache.get(embedding, options.mode) {
                let mut results = cached_results;
                results.truncate(n_results);
                return Ok(SearchResponse { results, mode_used: options.mode, expanded_query, degraded: cached_degraded });
            }
        }

        check_interrupt(options)?;

        let rerank_requested = options.mode == SearchMode::Reranked;
        let k = if rerank_requested { n_results * options.effective_rerank_candidate_multiplier() } else { n_results * DEFAULT_VECTOR_MULTIPLIER_NO_RERANK };

        let (bm25_hits, vector_hits): (Vec<(String, f32)>, Vec<VectorHit>) = if options.mode == SearchMode::Vector {
            (Vec::new(), self.vector_leg(&effective_query, k, pushdown.as_ref())?)
        } else {
            std::thread::scope(|scope| {
                let bm25_handle = scope.spawn(|| self.bm25.search(&effective_query, k));
                let vector_handle = scope.spawn(|| self.vector_leg(&effective_query, k, pushdown.as_ref()));
                let bm25_hits = bm25_handle.join().expect("bm25 leg panicked");
                let vector_hits = vector_handle.join().expect("vector leg panicked")?;
                Ok::<_, SearchError>((bm25_hits, vector_hits))
            })?
        };

        check_interrupt(options)?;

        // Hydrate every candidate to a full Document so the client-side
        // filter (residual for the vector leg, the whole filter for the
        // BM25 leg, which has no native filter support at all) and the
        // reranker/diversifier (which both need content) can see it.
        let mut hydrated: HashMap<String, (String, Metadata)> = HashMap::new();
        let mut filtered_vector: Vec<(String, f32)> = Vec::new();
        for hit in &vector_hits {
            if let Some(residual_filter) = &residual {
                let pseudo = Document { id: hit.doc_id.clone(), content: hit.content.clone(), metadata: hit.metadata.clone() };
                if !residual_filter.matches(&pseudo) {
                    continue;
                }
            }
            hydrated.insert(hit.doc_id.clone(), (hit.content.clone(), hit.metadata.clone()));
            filtered_vector.push((hit.doc_id.clone(), hit.similarity));
        }

        let mut filtered_bm25: Vec<(String, f32)> = Vec::new();
        for (doc_id, score) in &bm25_hits {
            if !hydrated.contains_key(doc_id) {
                match self.backend.get(doc_id).map_err(SearchError::from)? {
                    Some(doc) => {
                        hydrated.insert(doc_id.clone(), (doc.content, doc.metadata));
                    }
                    None => {
                        tracing::warn!(doc_id = doc_id.as_str(), "lexical index references a document absent from the vector backend; skipping");
                        continue;
                    }
                }
            }
            if let Some(full_filter) = &options.filter {
                let (content, metadata) = hydrated.get(doc_id).expect("just inserted or already present");
                let pseudo = Document { id: doc_id.clone(), content: content.clone(), metadata: metadata.clone() };
                if !full_filter.matches(&pseudo) {
                    continue;
                }
            }
            filtered_bm25.push((doc_id.clone(), *score));
        }

        check_interrupt(options)?;

        let (mut ranked, base_source): (Vec<(String, f32, Option<usize>, FusionExplain)>, SourceMethod) = if options.mode == SearchMode::Vector {
            let ranked = filtered_vector.iter().enumerate().map(|(i, (id, score))| (id.clone(), *score, Some(i + 1), FusionExplain::default())).collect();
            (ranked, SourceMethod::Vector)
        } else {
            let fused = fuse_rrf(&filtered_bm25, &filtered_vector, RrfConfig::from_env());
            let ranked = fused.into_iter().enumerate().map(|(i, hit)| (hit.doc_id, hit.rrf_score as f32, Some(i + 1), hit.explain)).collect();
            (ranked, SourceMethod::Fused)
        };

        check_interrupt(options)?;

        let mut rerank_ranks: HashMap<String, usize> = HashMap::new();
        let mut final_source = base_source;
        let mut degraded = false;

        if rerank_requested {
            match &self.reranker {
                Some(reranker) => {
                    let candidates: Vec<(String, String)> =
                        ranked.iter().filter_map(|(id, _score, _rank, _explain)| hydrated.get(id).map(|(content, _)| (id.clone(), content.clone()))).collect();
                    match reranker.rerank_cancellable(&effective_query, &candidates, candidates.len(), options.cancel.as_deref()) {
                        Ok(reranked_hits) => {
                            for hit in &reranked_hits {
                                rerank_ranks.insert(hit.doc_id.clone(), hit.rerank_rank);
                            }
                            ranked = reranked_hits
                                .iter()
                                .map(|hit| {
                                    let explain = ranked
                                        .iter()
                                        .find(|(id, ..)| id == &hit.doc_id)
                                        .map(|(_, _, _, explain)| explain.clone())
                                        .unwrap_or_default();
                                    (hit.doc_id.clone(), hit.score, Some(hit.original_rank), explain)
                                })
                                .collect();
                            final_source = SourceMethod::Reranked;
                        }
                        Err(RerankError::ModelUnavailable) => {
                            self.log_degraded_once("cross-encoder reranker unavailable, degrading to fused ranking");
                            degraded = true;
                        }
                        Err(other) => return Err(SearchError::from(other)),
                    }
                }
                None => {
                    self.log_degraded_once("reranked mode requested without a configured reranker, degrading to fused ranking");
                    degraded = true;
                }
            }
        }

        check_interrupt(options)?;

        let selected_indices: Vec<usize> = if options.use_diversification {
            let mmr_candidates: Vec<MmrCandidate> = ranked
                .iter()
                .map(|(id, score, ..)| MmrCandidate { doc_id: id.clone(), relevance: *score, content: hydrated.get(id).map(|(c, _)| c.clone()).unwrap_or_default(), embedding: None })
                .collect();
            mmr_select(&mmr_candidates, n_results, options.diversification_lambda)
        } else {
            (0..ranked.len().min(n_results)).collect()
        };

        let results: Vec<RankedResult> = selected_indices
            .into_iter()
            .map(|i| {
                let (doc_id, score, original_rank, explain) = ranked[i].clone();
                let (content, metadata) = hydrated.get(&doc_id).cloned().unwrap_or_default();
                RankedResult {
                    doc_id: doc_id.clone(),
                    content,
                    metadata,
                    score,
                    source_method: final_source,
                    original_rank,
                    rerank_rank: rerank_ranks.get(&doc_id).copied(),
                    explain: if options.mode == SearchMode::Vector { None } else { Some(explain) },
                }
            })
            .collect();

        if let Some(embedding) = query_embedding {
            self.semantic_cache.put(embedding, options.mode, (results.clone(), degraded));
        }

        Ok(SearchResponse { results, mode_used: options.mode, expanded_query, degraded })
    }

    fn log_degraded_once(&self, message: &'static str) {
        if self.degraded_logged.compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            tracing::warn!(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrank_retrieve::{Filter, FilterOp, FilterValue, InMemoryVectorBackend, MetadataScalar, MetadataValue, MockEmbeddingModel};
    use docrank_rerank::MockCrossEncoderModel;

    type TestOrchestrator = SearchOrchestrator<InMemoryVectorBackend<MockEmbeddingModel>, MockEmbeddingModel, MockCrossEncoderModel>;

    fn orchestrator() -> TestOrchestrator {
        let backend = InMemoryVectorBackend::new(MockEmbeddingModel::new("mock-embed-v1"));
        SearchOrchestrator::new(backend, MockEmbeddingModel::new("mock-embed-v1"))
    }

    fn orchestrator_with_reranker() -> SearchOrchestrator<InMemoryVectorBackend<MockEmbeddingModel>, MockEmbeddingModel, Arc<MockCrossEncoderModel>> {
        let backend = InMemoryVectorBackend::new(MockEmbeddingModel::new("mock-embed-v1"));
        let model = Arc::new(MockCrossEncoderModel::new("mock-ce-v1"));
        SearchOrchestrator::with_reranker(backend, MockEmbeddingModel::new("mock-embed-v1"), CrossEncoderReranker::new(model))
    }

    #[test]
    fn empty_corpus_returns_empty_results_without_error() {
        let orchestrator = orchestrator();
        let response = orchestrator.search("anything", 5, &SearchOptions::default()).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn n_results_zero_short_circuits() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("hello world")).unwrap();
        let response = orchestrator.search("hello", 0, &SearchOptions::default()).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn pre_set_cancel_flag_aborts_search_with_timeout() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("hello world")).unwrap();
        let mut options = SearchOptions::default();
        options.cancel = Some(Arc::new(AtomicBool::new(true)));
        let result = orchestrator.search("hello", 5, &options);
        assert!(matches!(result, Err(SearchError::Timeout)));
    }

    #[test]
    fn unset_cancel_flag_does_not_affect_search() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("hello world")).unwrap();
        let mut options = SearchOptions::default();
        options.cancel = Some(Arc::new(AtomicBool::new(false)));
        let response = orchestrator.search("hello", 5, &options).unwrap();
        assert!(!response.results.is_empty());
    }

    #[test]
    fn cancelled_reranked_search_errors_instead_of_degrading_to_fused() {
        let orchestrator = orchestrator_with_reranker();
        orchestrator.add_document(NewDocument::new("Use JWT bearer token for authentication")).unwrap();
        orchestrator.add_document(NewDocument::new("Serialize JSON data")).unwrap();
        let mut options = SearchOptions::default();
        options.mode = SearchMode::Reranked;
        // Cancellation surfaces as SearchError::Timeout, distinct from the
        // ModelUnavailable degrade path which falls back to fused ranking.
        options.cancel = Some(Arc::new(AtomicBool::new(true)));
        let result = orchestrator.search("jwt authentication", 5, &options);
        assert!(matches!(result, Err(SearchError::Timeout)));
    }

    #[test]
    fn hybrid_search_does_not_populate_cache_hit_for_reranked_mode() {
        let orchestrator = orchestrator_with_reranker();
        orchestrator.add_document(NewDocument::new("Use JWT bearer token for authentication")).unwrap();
        orchestrator.add_document(NewDocument::new("Serialize JSON data")).unwrap();

        let mut hybrid_options = SearchOptions::default();
        hybrid_options.mode = SearchMode::Hybrid;
        let hybrid = orchestrator.search("jwt authentication", 5, &hybrid_options).unwrap();
        assert_eq!(hybrid.results[0].source_method, SourceMethod::Fused);

        // Same (cosine-identical) query embedding, but reranked mode: must
        // not return the hybrid-mode cache entry — the cross-encoder has to
        // actually run, not be skipped by a cache hit keyed on embedding alone.
        let mut reranked_options = SearchOptions::default();
        reranked_options.mode = SearchMode::Reranked;
        let reranked = orchestrator.search("jwt authentication", 5, &reranked_options).unwrap();
        assert_eq!(reranked.mode_used, SearchMode::Reranked);
        assert_eq!(reranked.results[0].source_method, SourceMethod::Reranked);
        assert!(!reranked.degraded);
    }

    #[test]
    fn scenario_hybrid_recall_of_acronym() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("Use JWT bearer token for authentication")).unwrap();
        orchestrator.add_document(NewDocument::new("Serialize JSON data")).unwrap();
        let response = orchestrator.search("JWT", 5, &SearchOptions::default()).unwrap();
        assert!(response.results[0].content.contains("JWT"));
        assert_eq!(response.results[0].source_method, SourceMethod::Fused);
    }

    #[test]
    fn scenario_expansion_improves_recall() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("Read the authentication guide before calling the API")).unwrap();
        orchestrator.add_document(NewDocument::new("Pagination cursors explained")).unwrap();

        let mut with_expansion = SearchOptions::default();
        with_expansion.use_query_expansion = true;
        let expanded = orchestrator.search("auth", 5, &with_expansion).unwrap();
        assert!(expanded.results.iter().any(|r| r.content.contains("authentication")));
    }

    #[test]
    fn scenario_filter_pushdown_vs_residual() {
        let orchestrator = orchestrator();
        let mut get_meta = Metadata::new();
        get_meta.insert("method".into(), MetadataValue::String("GET".into()));
        let mut post_meta = Metadata::new();
        post_meta.insert("method".into(), MetadataValue::String("POST".into()));
        post_meta.insert("status".into(), MetadataValue::String("deprecated".into()));

        orchestrator.add_document(NewDocument::new("list widgets endpoint").with_metadata(get_meta.clone())).unwrap();
        orchestrator.add_document(NewDocument::new("get widget by id endpoint").with_metadata(get_meta)).unwrap();
        orchestrator.add_document(NewDocument::new("create widget endpoint").with_metadata(post_meta)).unwrap();

        let filter = Filter::and(vec![
            Filter::leaf("method", FilterOp::Eq, FilterValue::Scalar(MetadataScalar::String("GET".into()))).unwrap(),
            Filter::not(Filter::leaf("status", FilterOp::Eq, FilterValue::Scalar(MetadataScalar::String("deprecated".into()))).unwrap()),
        ])
        .unwrap();

        let mut options = SearchOptions::default();
        options.filter = Some(filter);
        let response = orchestrator.search("widget", 10, &options).unwrap();
        assert!(!response.results.is_empty());
        assert!(response.results.iter().all(|r| r.metadata.get("method").and_then(|v| v.as_string()) == Some("GET")));
    }

    #[test]
    fn scenario_mmr_diversifies_near_duplicates() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("POST /auth/login variant one jwt token")).unwrap();
        orchestrator.add_document(NewDocument::new("POST /auth/login variant two jwt token")).unwrap();
        orchestrator.add_document(NewDocument::new("POST /auth/login variant three jwt token")).unwrap();
        orchestrator.add_document(NewDocument::new("rate limiting documentation")).unwrap();
        orchestrator.add_document(NewDocument::new("pagination cursor documentation")).unwrap();

        let mut options = SearchOptions::default();
        options.use_diversification = true;
        options.diversification_lambda = 0.5;
        let response = orchestrator.search("auth login jwt token", 3, &options).unwrap();
        let login_variants = response.results.iter().filter(|r| r.content.contains("variant")).count();
        assert!(login_variants <= 1, "expected at most one near-duplicate, got {login_variants}");
    }

    #[test]
    fn scenario_lazy_rebuild_counter() {
        let orchestrator = orchestrator();
        for i in 0..100 {
            orchestrator.add_document(NewDocument::new(format!("api endpoint number {i}"))).unwrap();
        }
        let _ = orchestrator.search("api", 5, &SearchOptions::default()).unwrap();
        assert_eq!(orchestrator.epoch.load(Ordering::Acquire), 1);
        let _ = orchestrator.search("api", 5, &SearchOptions::default()).unwrap();
        assert_eq!(orchestrator.epoch.load(Ordering::Acquire), 1);
    }

    #[test]
    fn scenario_degraded_rerank_falls_back_to_fused() {
        let orchestrator = orchestrator_with_reranker();
        orchestrator.add_document(NewDocument::new("Use JWT bearer token for authentication")).unwrap();
        orchestrator.add_document(NewDocument::new("Serialize JSON data")).unwrap();

        orchestrator.reranker.as_ref().unwrap().model().set_available(false);

        let mut options = SearchOptions::default();
        options.mode = SearchMode::Reranked;
        let response = orchestrator.search("jwt authentication", 2, &options).unwrap();
        assert!(response.degraded);
        assert!(response.results.iter().all(|r| r.source_method == SourceMethod::Fused));
    }

    #[test]
    fn successful_rerank_marks_source_method_reranked() {
        let orchestrator = orchestrator_with_reranker();
        orchestrator.add_document(NewDocument::new("Use JWT bearer token for authentication")).unwrap();
        orchestrator.add_document(NewDocument::new("Serialize JSON data")).unwrap();

        let mut options = SearchOptions::default();
        options.mode = SearchMode::Reranked;
        let response = orchestrator.search("jwt authentication", 2, &options).unwrap();
        assert!(!response.degraded);
        assert!(response.results.iter().any(|r| r.source_method == SourceMethod::Reranked));
    }

    #[test]
    fn duplicate_content_is_skipped() {
        let orchestrator = orchestrator();
        let first = orchestrator.add_document(NewDocument::new("identical content")).unwrap();
        let second = orchestrator.add_document(NewDocument::new("identical content")).unwrap();
        assert_eq!(first.new, 1);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.new, 0);
    }

    #[test]
    fn delete_then_search_excludes_document() {
        let orchestrator = orchestrator();
        let report = orchestrator.add_document(NewDocument::new("ephemeral document content")).unwrap();
        let id = report.ids[0].clone();
        let delete_report = orchestrator.delete(&id).unwrap();
        assert_eq!(delete_report.deleted, 1);
        let response = orchestrator.search("ephemeral", 5, &SearchOptions::default()).unwrap();
        assert!(response.results.iter().all(|r| r.doc_id != id));
    }

    #[test]
    fn delete_missing_id_reports_not_found() {
        let orchestrator = orchestrator();
        let report = orchestrator.delete("does-not-exist").unwrap();
        assert_eq!(report.not_found, 1);
        assert_eq!(report.deleted, 0);
    }

    #[test]
    fn non_finite_metadata_float_is_rejected_but_batch_continues() {
        let orchestrator = orchestrator();
        let mut bad_meta = Metadata::new();
        bad_meta.insert("weight".into(), MetadataValue::Float(f64::NAN));
        let report = orchestrator
            .add_documents(vec![NewDocument::new("bad doc").with_metadata(bad_meta), NewDocument::new("good doc")])
            .unwrap();
        assert_eq!(report.new, 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn vector_only_mode_skips_fusion() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("authentication guide")).unwrap();
        let mut options = SearchOptions::default();
        options.mode = SearchMode::Vector;
        let response = orchestrator.search("authentication", 5, &options).unwrap();
        assert!(response.results.iter().all(|r| r.source_method == SourceMethod::Vector));
    }

    #[test]
    fn restart_reseeds_bm25_from_existing_backend_documents() {
        let backend = InMemoryVectorBackend::new(MockEmbeddingModel::new("mock-embed-v1"));
        backend.upsert(&[Document::new("pre-existing", "legacy widget endpoint documentation")]).unwrap();

        let orchestrator = SearchOrchestrator::new(backend, MockEmbeddingModel::new("mock-embed-v1"));
        assert!(orchestrator.bm25.is_empty());

        let response = orchestrator.search("widget", 5, &SearchOptions::default()).unwrap();
        assert!(response.results.iter().any(|r| r.doc_id == "pre-existing"));
        assert!(!orchestrator.bm25.is_empty());
    }

    #[test]
    fn backend_reseed_only_happens_once() {
        let backend = InMemoryVectorBackend::new(MockEmbeddingModel::new("mock-embed-v1"));
        backend.upsert(&[Document::new("a", "widget endpoint")]).unwrap();
        let orchestrator = SearchOrchestrator::new(backend, MockEmbeddingModel::new("mock-embed-v1"));

        let _ = orchestrator.search("widget", 5, &SearchOptions::default()).unwrap();
        let count_after_first = orchestrator.bm25.rebuild_count();
        let _ = orchestrator.search("widget", 5, &SearchOptions::default()).unwrap();
        assert_eq!(orchestrator.bm25.rebuild_count(), count_after_first);
    }

    #[test]
    fn stats_reports_document_count() {
        let orchestrator = orchestrator();
        orchestrator.add_document(NewDocument::new("doc one")).unwrap();
        orchestrator.add_document(NewDocument::new("doc two")).unwrap();
        assert_eq!(orchestrator.stats().unwrap().count, 2);
    }
}
