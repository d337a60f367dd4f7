//! localrag-vector
//!
//! Exact in-memory nearest-neighbour search over chunk embeddings, with a
//! content-addressed cache so rebuilds only embed new text.
pub mod cache;
pub mod index;

pub use cache::EmbeddingCache;
pub use index::{BuildOptions, SemanticIndex};
