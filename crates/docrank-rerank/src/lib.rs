//! Second-stage ranking: cross-encoder rescoring of a candidate set too
//! small to run through in first-stage retrieval, and MMR diversification
//! of the result.

pub mod cross_encoder;
pub mod diversify;
pub mod error;
pub mod model;

pub use cross_encoder::{CrossEncoderReranker, RerankedHit, DEFAULT_BATCH_SIZE, DEFAULT_TOKEN_BUDGET};
pub use diversify::{mmr_select, MmrCandidate};
pub use error::RerankError;
pub use model::{CrossEncoderModel, MockCrossEncoderModel};
