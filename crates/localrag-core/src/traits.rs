use async_trait::async_trait;

use crate::types::{Meta, SourceType};

/// Text to vector function used by the semantic index.
///
/// Implementations must return vectors of `dim()` length and be deterministic
/// for a given input so repeated queries against one build rank stably.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Raw text plus metadata produced by a loader.
#[derive(Debug, Clone, Default)]
pub struct LoadedSource {
    pub raw_text: String,
    pub metadata: Meta,
}

/// Turns a source reference into raw text; one implementation per source type.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, source_type: SourceType, source_uri: &str) -> anyhow::Result<LoadedSource>;
}
