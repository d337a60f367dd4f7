//! Domain types shared by the ingestion pipeline and both indexes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type ChunkId = String;
pub type DocumentId = String;
pub type Meta = HashMap<String, String>;

/// Where a document's raw text came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Url,
    Youtube,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Url => "url",
            SourceType::Youtube => "youtube",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested source unit, as handed over by a loader.
///
/// - `id`: content hash of `(source_type, source_uri, raw_text)`, assigned by [`Document::new`]
/// - `source_uri`: file path, URL or video id
/// - `raw_text`: producer-supplied text, possibly spanning several pages
/// - `metadata`: open map (title, origin URL, extraction timestamp, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_type: SourceType,
    pub source_uri: String,
    pub raw_text: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(source_type: SourceType, source_uri: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let source_uri = source_uri.into();
        let raw_text = raw_text.into();
        let mut hasher = blake3::Hasher::new();
        hasher.update(source_type.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(source_uri.as_bytes());
        hasher.update(&[0]);
        hasher.update(raw_text.as_bytes());
        let id = hasher.finalize().to_hex()[..16].to_string();
        Self { id, source_type, source_uri, raw_text, metadata: Meta::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A retrievable unit of normalized text.
///
/// `parent_document_id` is a back-reference only; chunks outlive their document.
/// `start_offset` is a character offset into the parent's normalized text.
/// `embedding` is filled in by the semantic index and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub parent_document_id: DocumentId,
    pub text: String,
    pub start_offset: usize,
    pub sequence_index: usize,
    pub source_type: SourceType,
    pub source_uri: String,
    pub title: Option<String>,
    #[serde(skip)]
    pub embedding: Option<Arc<[f32]>>,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, sequence_index: usize) -> ChunkId {
        format!("{document_id}:{sequence_index}")
    }

    /// Attach an embedding. Re-attaching replaces nothing once a vector is present.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Arc<[f32]>) -> Self {
        if self.embedding.is_none() {
            self.embedding = Some(embedding);
        }
        self
    }

    /// The shape handed to answer generation.
    pub fn context(&self) -> RetrievedContext {
        RetrievedContext {
            text: self.text.clone(),
            source_uri: self.source_uri.clone(),
            source_type: self.source_type,
            title: self.title.clone(),
        }
    }
}

/// What the answer-generation collaborator receives for each ranked chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedContext {
    pub text: String,
    pub source_uri: String,
    pub source_type: SourceType,
    pub title: Option<String>,
}

/// Indicates which index produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Lexical,
    Semantic,
}

/// The minimal surface returned by both indexes.
///
/// `id` matches `Chunk::id`. `score` is index-specific but higher is always
/// better. `source` labels the originating index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}
