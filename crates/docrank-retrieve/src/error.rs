use thiserror::Error;

/// Failures surfaced by the lexical index, filter algebra, and query
/// expander. The orchestrator crate converts these into the broader
/// search error taxonomy via `#[from]`.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("index contains no documents")]
    EmptyIndex,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("document {doc_id:?} contains invalid UTF-8 or a non-scalar metadata value: {reason}")]
    Encoding { doc_id: Option<String>, reason: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0}")]
    Other(String),
}

impl RetrieveError {
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}
