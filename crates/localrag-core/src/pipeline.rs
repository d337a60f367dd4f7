//! Normalize and chunk a batch of documents on a bounded worker pool.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::chunker::{ChunkConfig, Chunker};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::title::TitleResolver;
use crate::types::{Chunk, Document, DocumentId};

pub type NormalizeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A document whose processing panicked; the rest of the batch is unaffected.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub document_id: DocumentId,
    pub source_uri: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// Chunks of every successful document, in input document order.
    pub chunks: Vec<Chunk>,
    pub failed: Vec<DocumentFailure>,
    /// Documents whose normalized text was empty.
    pub empty: Vec<DocumentId>,
    pub documents: usize,
}

enum Outcome {
    Chunks(Vec<Chunk>),
    Empty,
    Failed(String),
}

pub struct IngestionPipeline {
    chunker: Chunker,
    titles: TitleResolver,
    normalizer: NormalizeFn,
    pool: ThreadPool,
}

impl IngestionPipeline {
    pub fn new(chunking: ChunkConfig, workers: usize) -> Result<Self> {
        let chunker = Chunker::new(chunking)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("ingest-{i}"))
            .build()
            .map_err(|e| Error::Operation(format!("failed to build ingest pool: {e}")))?;
        Ok(Self { chunker, titles: TitleResolver::default(), normalizer: Arc::new(normalize), pool })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.chunking.clone(), settings.ingest.worker_count())
    }

    /// Replace the text normalizer, e.g. with one that keeps non-ASCII text.
    #[must_use]
    pub fn with_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.normalizer = Arc::new(normalizer);
        self
    }

    #[must_use]
    pub fn with_title_resolver(mut self, titles: TitleResolver) -> Self {
        self.titles = titles;
        self
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        self.chunker.config()
    }

    /// Run normalize -> chunk for every document.
    ///
    /// Never fails as a whole: empty documents and panicking documents are
    /// recorded in the report and contribute no chunks.
    pub fn ingest(&self, documents: &[Document]) -> IngestReport {
        let outcomes: Vec<Outcome> = self.pool.install(|| documents.par_iter().map(|doc| self.process(doc)).collect());

        let mut report = IngestReport { documents: documents.len(), ..IngestReport::default() };
        for (doc, outcome) in documents.iter().zip(outcomes) {
            match outcome {
                Outcome::Chunks(chunks) => report.chunks.extend(chunks),
                Outcome::Empty => {
                    tracing::debug!(doc = %doc.id, uri = %doc.source_uri, "document is empty after normalization");
                    report.empty.push(doc.id.clone());
                }
                Outcome::Failed(reason) => {
                    tracing::warn!(doc = %doc.id, uri = %doc.source_uri, %reason, "document processing failed");
                    report.failed.push(DocumentFailure {
                        document_id: doc.id.clone(),
                        source_uri: doc.source_uri.clone(),
                        reason,
                    });
                }
            }
        }
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks.len(),
            empty = report.empty.len(),
            failed = report.failed.len(),
            "ingestion finished"
        );
        report
    }

    fn process(&self, doc: &Document) -> Outcome {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let cleaned = (self.normalizer)(&doc.raw_text);
            if cleaned.is_empty() {
                return None;
            }
            let title = self.titles.resolve(doc);
            let chunks: Vec<Chunk> = self
                .chunker
                .split(&cleaned)
                .into_iter()
                .enumerate()
                .map(|(seq, span)| Chunk {
                    id: Chunk::chunk_id(&doc.id, seq),
                    parent_document_id: doc.id.clone(),
                    text: span.text,
                    start_offset: span.start_offset,
                    sequence_index: seq,
                    source_type: doc.source_type,
                    source_uri: doc.source_uri.clone(),
                    title: title.clone(),
                    embedding: None,
                })
                .collect();
            Some(chunks)
        }));
        match result {
            Ok(Some(chunks)) if !chunks.is_empty() => Outcome::Chunks(chunks),
            Ok(_) => Outcome::Empty,
            Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
