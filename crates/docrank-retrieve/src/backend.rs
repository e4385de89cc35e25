//! The `VectorBackend` capability interface and the embedding-model
//! capability it is paired with. Neither is implemented by a real ANN store
//! here — that is explicitly out of scope (approximate index construction
//! is delegated to a backend, per the Non-goals). What ships is a
//! brute-force, cosine-similarity, in-process reference implementation used
//! by the orchestrator's tests and the CLI demo, plus a deterministic
//! hash-based embedding model so the whole pipeline can run without a real
//! neural model.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::document::{Document, Metadata};
use crate::error::RetrieveError;
use crate::filter::{BackendFilter, FilterOp};
use crate::tokenizer::tokenize;

/// A single candidate returned by `VectorBackend::query`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub doc_id: String,
    pub content: String,
    pub metadata: Metadata,
    pub similarity: f32,
}

/// An embedding model: produces a fixed-dimension unit vector per piece of
/// text. The core never references a concrete implementation; it depends
/// only on this trait, which lets tests supply a deterministic mock.
pub trait EmbeddingModel: Send + Sync {
    fn embed_query(&self, text: &str) -> Vec<f32>;
    fn embed_documents(&self, texts: &[String]) -> Vec<Vec<f32>>;
    fn model_id(&self) -> &str;
}

/// The external vector store adapter. Not implemented inside the core:
/// real deployments plug in whatever ANN store they run (persistence and
/// index construction are the backend's problem, not the orchestrator's).
pub trait VectorBackend: Send + Sync {
    fn upsert(&self, docs: &[Document]) -> Result<(), RetrieveError>;
    fn delete(&self, ids: &[String]) -> Result<(), RetrieveError>;
    fn query(&self, embedding: &[f32], top_k: usize, filter: Option<&BackendFilter>) -> Result<Vec<VectorHit>, RetrieveError>;
    fn get(&self, id: &str) -> Result<Option<Document>, RetrieveError>;
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, RetrieveError>;
    fn count(&self) -> Result<usize, RetrieveError>;
    fn supports(&self, op: FilterOp) -> bool;
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

/// Hashes tokens into a fixed-width bag-of-words vector and L2-normalizes
/// it. Deterministic and side-effect-free, which is what makes it usable
/// as a test double: identical content always embeds identically, and
/// documents sharing vocabulary score as similar without any real model.
pub struct MockEmbeddingModel {
    model_id: String,
    dimensions: usize,
}

impl MockEmbeddingModel {
    pub const DEFAULT_DIMENSIONS: usize = 64;

    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), dimensions: Self::DEFAULT_DIMENSIONS }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    fn embed_query(&self, text: &str) -> Vec<f32> {
        self.embed_one(text)
    }

    fn embed_documents(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Brute-force cosine-similarity vector store, kept entirely in memory.
/// Natively supports only `eq`/`ne`/`in`/`not_in` on metadata, so the
/// filter compiler has a realistic push-down/residual split to exercise.
pub struct InMemoryVectorBackend<E: EmbeddingModel> {
    embedder: E,
    entries: RwLock<HashMap<String, (Document, Vec<f32>)>>,
}

impl<E: EmbeddingModel> InMemoryVectorBackend<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder, entries: RwLock::new(HashMap::new()) }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E: EmbeddingModel> VectorBackend for InMemoryVectorBackend<E> {
    fn upsert(&self, docs: &[Document]) -> Result<(), RetrieveError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        for doc in docs {
            let embedding = self.embedder.embed_documents(std::slice::from_ref(&doc.content)).remove(0);
            entries.insert(doc.id.clone(), (doc.clone(), embedding));
        }
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<(), RetrieveError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    fn query(&self, embedding: &[f32], top_k: usize, filter: Option<&BackendFilter>) -> Result<Vec<VectorHit>, RetrieveError> {
        let entries = self.entries.read().expect("lock poisoned");
        let mut hits: Vec<VectorHit> = entries
            .values()
            .filter(|(doc, _)| filter.map_or(true, |f| f.matches(doc)))
            .map(|(doc, emb)| VectorHit {
                doc_id: doc.id.clone(),
                content: doc.content.clone(),
                metadata: doc.metadata.clone(),
                similarity: cosine(embedding, emb),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn get(&self, id: &str) -> Result<Option<Document>, RetrieveError> {
        Ok(self.entries.read().expect("lock poisoned").get(id).map(|(doc, _)| doc.clone()))
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>, RetrieveError> {
        let entries = self.entries.read().expect("lock poisoned");
        let mut docs: Vec<Document> = entries.values().map(|(doc, _)| doc.clone()).collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs.into_iter().skip(offset).take(limit).collect())
    }

    fn count(&self) -> Result<usize, RetrieveError> {
        Ok(self.entries.read().expect("lock poisoned").len())
    }

    fn supports(&self, op: FilterOp) -> bool {
        matches!(op, FilterOp::Eq | FilterOp::Ne | FilterOp::In | FilterOp::NotIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_embedding_is_deterministic_and_unit_length() {
        let model = MockEmbeddingModel::new("mock-v1");
        let a = model.embed_query("authentication guide");
        let b = model.embed_query("authentication guide");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn shared_vocabulary_scores_more_similar_than_disjoint() {
        let model = MockEmbeddingModel::new("mock-v1");
        let backend = InMemoryVectorBackend::new(model);
        backend.upsert(&[Document::new("a", "authentication token guide"), Document::new("b", "serialize json payload")]).unwrap();
        let query_embedding = backend.embedder().embed_query("authentication token");
        let hits = backend.query(&query_embedding, 2, None).unwrap();
        assert_eq!(hits[0].doc_id, "a");
    }

    #[test]
    fn query_respects_pushdown_filter() {
        let model = MockEmbeddingModel::new("mock-v1");
        let backend = InMemoryVectorBackend::new(model);
        let mut meta = Metadata::new();
        meta.insert("method".into(), crate::document::MetadataValue::String("GET".into()));
        backend.upsert(&[Document::new("a", "hello").with_metadata(meta)]).unwrap();
        backend.upsert(&[Document::new("b", "hello")]).unwrap();
        let filter = crate::filter::Filter::leaf(
            "method",
            FilterOp::Eq,
            crate::filter::FilterValue::Scalar(crate::document::MetadataScalar::String("GET".into())),
        )
        .unwrap();
        let embedding = backend.embedder().embed_query("hello");
        let hits = backend.query(&embedding, 10, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "a");
    }
}
