//! `docrank`: the unified facade over lexical retrieval, vector search,
//! fusion, reranking, and diversification — a hybrid search engine purpose-
//! built for API documentation (OpenAPI endpoints, GraphQL fields, Postman
//! requests normalized to a common `Document` shape upstream of this
//! crate).
//!
//! `SearchOrchestrator` is the single entry point most callers need; the
//! `retrieve`, `fusion`, and `rerank` modules re-export the lower-level
//! crates for callers who want to compose the stages themselves.

pub mod error;
pub mod facet;
pub mod options;
pub mod orchestrator;
pub mod semantic_cache;

pub use error::SearchError;
pub use facet::{compute_facets, DEFAULT_TOP_FACET_VALUES};
pub use options::{
    AddDocumentsReport, DeleteReport, FacetResult, RankedResult, SearchMode, SearchOptions, SearchResponse, SourceMethod, Stats,
    DEFAULT_RERANK_CANDIDATE_MULTIPLIER,
};
pub use orchestrator::{NewDocument, SearchOrchestrator};
pub use semantic_cache::{SemanticCacheConfig, SemanticQueryCache};

/// Lexical retrieval, the vector-backend seam, the filter algebra, and
/// query expansion.
pub mod retrieve {
    pub use docrank_retrieve::*;
}

/// Reciprocal rank fusion and weighted-score fusion.
pub mod fusion {
    pub use docrank_fusion::*;
}

/// Cross-encoder reranking and MMR diversification.
pub mod rerank {
    pub use docrank_rerank::*;
}

/// The types most callers need, in one `use docrank::prelude::*;`.
pub mod prelude {
    pub use crate::error::SearchError;
    pub use crate::facet::{compute_facets, FacetResult, DEFAULT_TOP_FACET_VALUES};
    pub use crate::options::{
        AddDocumentsReport, DeleteReport, RankedResult, SearchMode, SearchOptions, SearchResponse, SourceMethod, Stats,
    };
    pub use crate::orchestrator::{NewDocument, SearchOrchestrator};
    pub use docrank_retrieve::{
        ContentPattern, Document, EmbeddingModel, ExpansionMethod, Filter, FilterOp, FilterValue, InMemoryVectorBackend, Metadata,
        MetadataScalar, MetadataValue, MockEmbeddingModel, QueryExpander, VectorBackend,
    };
    pub use docrank_rerank::{CrossEncoderModel, CrossEncoderReranker, MockCrossEncoderModel};
}
