//! Embedding providers for the semantic index.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use localrag_core::config::{expand_path, EmbeddingProviderKind, EmbeddingSettings};
use localrag_core::traits::Embedder;

pub mod bge;
pub mod device;
pub mod hash;
pub mod ollama;
pub mod pool;
pub mod tokenize;

pub use bge::BgeM3Embedder;
pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Build the configured embedder. `APP_USE_FAKE_EMBEDDINGS=1` forces the hash embedder.
pub async fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        tracing::info!(dim = settings.dim, "using hash embedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)?));
    }
    match settings.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(settings.dim)?)),
        EmbeddingProviderKind::Bge => {
            let configured: Option<PathBuf> = settings.model_dir.as_deref().map(expand_path);
            let dir = bge::resolve_model_dir(configured.as_deref())?;
            let max_len = settings.max_len;
            let embedder = tokio::task::spawn_blocking(move || BgeM3Embedder::load(&dir, max_len)).await??;
            Ok(Arc::new(embedder))
        }
        EmbeddingProviderKind::Ollama => {
            Ok(Arc::new(OllamaEmbedder::connect(&settings.ollama_url, &settings.ollama_model).await?))
        }
    }
}
