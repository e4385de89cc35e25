//! Merges ranked candidate lists from independent retrieval legs into a
//! single ranking. Two strategies are provided: Reciprocal Rank Fusion
//! (the default) and weighted min-max score fusion.

pub mod rrf;
pub mod weighted;

pub use rrf::{fuse_rrf, rrf_contribution, FusedHit, FusionExplain, RrfConfig, DEFAULT_RRF_K, RRF_K_ENV_VAR};
pub use weighted::{fuse_weighted, WeightedConfig, WeightedHit};
