//! Lexical retrieval, the vector-backend capability seam, the filter
//! algebra, and query expansion: the first-stage building blocks a hybrid
//! search pipeline fuses and reranks.
//!
//! This crate has no opinion on fusion, reranking, or orchestration — see
//! `docrank-fusion`, `docrank-rerank`, and `docrank` for those stages.

pub mod backend;
pub mod bm25;
pub mod cache;
pub mod document;
pub mod error;
pub mod filter;
pub mod query_expansion;
pub mod tokenizer;

pub use backend::{EmbeddingModel, InMemoryVectorBackend, MockEmbeddingModel, VectorBackend, VectorHit};
pub use bm25::{Bm25Index, Bm25Params, PostingEntry};
pub use cache::{Cache, CacheConfig, CacheEntry, CacheMetrics};
pub use document::{content_fingerprint, Document, Metadata, MetadataScalar, MetadataValue};
pub use error::RetrieveError;
pub use filter::{BackendFilter, ContentPattern, Filter, FilterOp, FilterValue};
pub use query_expansion::{ExpandedQuery, ExpansionMethod, QueryExpander};
pub use tokenizer::tokenize;
