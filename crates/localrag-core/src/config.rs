use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the working directory, choosing the overlay by `RUST_ENV`.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(base: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            other => tracing::debug!(env = other, "no config overlay for environment"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Typed view over the merged configuration. Every table is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalSettings,
    pub lexical: LexicalSettings,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_multiplier must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 || self.embedding.concurrency == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size and embedding.concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    pub default_k: usize,
    /// Each index is asked for `k * candidate_multiplier` hits before fusion.
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { lexical_weight: 0.5, semantic_weight: 0.5, default_k: 5, candidate_multiplier: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalSettings {
    pub stop_words: Vec<String>,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        let stop_words = [
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
            "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
            "then", "than", "so", "if",
        ];
        Self { stop_words: stop_words.iter().map(|s| (*s).to_string()).collect() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Worker threads for normalize + chunk; 0 means available parallelism.
    pub workers: usize,
}

impl IngestSettings {
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(4)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Hash,
    Bge,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    /// Dimension of the hash embedder; model-backed providers report their own.
    pub dim: usize,
    pub batch_size: usize,
    /// Maximum embedding batches in flight during a semantic build.
    pub concurrency: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub ollama_url: String,
    pub ollama_model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            dim: 384,
            batch_size: 32,
            concurrency: 2,
            model_dir: None,
            max_len: 256,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "deepseek-r1:8b".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
