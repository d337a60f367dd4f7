//! localrag-hybrid
//!
//! Fuses lexical and semantic rankings and owns the retrieval lifecycle.
pub mod engine;
pub mod fusion;

pub use engine::{EngineState, IndexSelection, RankedChunk, RetrievalContext, RetrievalEngine};
pub use fusion::{fuse, min_max_normalize, FusedHit, FusionWeights};
