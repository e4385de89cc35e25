use thiserror::Error;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("cross-encoder model unavailable")]
    ModelUnavailable,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("reranking cancelled")]
    Cancelled,
}
