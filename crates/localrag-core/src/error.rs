use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corpus is empty; nothing to index")]
    EmptyCorpus,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index build failed: {0}")]
    Index(String),

    #[error("Failed to load {uri}: {reason}")]
    Load { uri: String, reason: String },

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// True for failures of the embedding backend, which callers may retry or
    /// answer by falling back to lexical-only indexing.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Error::Embedding(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
