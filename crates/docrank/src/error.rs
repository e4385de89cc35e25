//! The top-level error taxonomy surfaced by the orchestrator. Lower-crate
//! errors convert in via `#[from]`; every variant carries a stable
//! `error_code()` and an `is_retryable()` classification so a caller can
//! decide whether to retry without string-matching the message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid filter: {0}")]
    Filter(String),

    #[error("vector backend error: {0}")]
    Backend(String),

    #[error("model unavailable: {0}")]
    Model(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("index and backend document sets disagree: {0}")]
    Consistency(String),
}

impl SearchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SearchError::Encoding(_) => "ENCODING",
            SearchError::Filter(_) => "FILTER",
            SearchError::Backend(_) => "BACKEND",
            SearchError::Model(_) => "MODEL",
            SearchError::Timeout => "TIMEOUT",
            SearchError::Consistency(_) => "CONSISTENCY",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::Timeout | SearchError::Backend(_))
    }
}

impl From<docrank_retrieve::RetrieveError> for SearchError {
    fn from(err: docrank_retrieve::RetrieveError) -> Self {
        use docrank_retrieve::RetrieveError::*;
        match err {
            Encoding { doc_id, reason } => {
                SearchError::Encoding(format!("{reason} (doc_id={})", doc_id.unwrap_or_else(|| "<generated>".to_string())))
            }
            InvalidFilter(msg) => SearchError::Filter(msg),
            EmptyQuery | EmptyIndex | InvalidParameter(_) | Other(_) => SearchError::Backend(err.to_string()),
        }
    }
}

impl From<docrank_rerank::RerankError> for SearchError {
    fn from(err: docrank_rerank::RerankError) -> Self {
        match err {
            docrank_rerank::RerankError::Cancelled => SearchError::Timeout,
            other => SearchError::Model(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_stable_error_code() {
        assert_eq!(SearchError::Encoding("x".into()).error_code(), "ENCODING");
        assert_eq!(SearchError::Filter("x".into()).error_code(), "FILTER");
        assert_eq!(SearchError::Backend("x".into()).error_code(), "BACKEND");
        assert_eq!(SearchError::Model("x".into()).error_code(), "MODEL");
        assert_eq!(SearchError::Timeout.error_code(), "TIMEOUT");
        assert_eq!(SearchError::Consistency("x".into()).error_code(), "CONSISTENCY");
    }

    #[test]
    fn only_timeout_and_backend_are_retryable() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::Backend("x".into()).is_retryable());
        assert!(!SearchError::Filter("x".into()).is_retryable());
        assert!(!SearchError::Encoding("x".into()).is_retryable());
        assert!(!SearchError::Model("x".into()).is_retryable());
        assert!(!SearchError::Consistency("x".into()).is_retryable());
    }
}
