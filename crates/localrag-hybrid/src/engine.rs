//! Retrieval engine: owns corpus generations and their indexes.
//!
//! A generation is an immutable corpus plus the indexes built over it. Builds
//! run under an async build lock (one writer at a time) and publish their
//! result with a single pointer swap; queries clone the current `Arc` and never
//! see a half-built generation. Dropping an in-flight build commits nothing.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::instrument;

use localrag_core::config::Settings;
use localrag_core::error::{Error, Result};
use localrag_core::pipeline::{IngestReport, IngestionPipeline};
use localrag_core::traits::Embedder;
use localrag_core::types::{Chunk, ChunkId, Document, RetrievedContext};
use localrag_text::{build_analyzer, LexicalIndex, TextAnalyzer};
use localrag_vector::cache::hash_content;
use localrag_vector::{BuildOptions, EmbeddingCache, SemanticIndex};

use crate::fusion::{fuse, FusionWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Empty,
    LexicalReady,
    SemanticReady,
    HybridReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSelection {
    Lexical,
    Semantic,
    Both,
}

/// Everything an engine needs besides its data. Built once, shared by reference.
pub struct RetrievalContext {
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
    pub analyzer: TextAnalyzer,
}

impl RetrievalContext {
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>) -> Self {
        let analyzer = build_analyzer(&settings.lexical.stop_words);
        Self { settings, embedder, analyzer }
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: TextAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }
}

/// One ranked result handed to answer generation.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
    pub lexical: Option<f32>,
    pub semantic: Option<f32>,
}

impl RankedChunk {
    pub fn context(&self) -> RetrievedContext {
        self.chunk.context()
    }
}

enum Indexes {
    Lexical(LexicalIndex),
    Semantic(SemanticIndex),
    Hybrid { lexical: LexicalIndex, semantic: SemanticIndex },
}

struct Generation {
    number: u64,
    corpus: Vec<Arc<Chunk>>,
    by_id: HashMap<ChunkId, usize>,
    indexes: Indexes,
}

impl Generation {
    fn state(&self) -> EngineState {
        match self.indexes {
            Indexes::Lexical(_) => EngineState::LexicalReady,
            Indexes::Semantic(_) => EngineState::SemanticReady,
            Indexes::Hybrid { .. } => EngineState::HybridReady,
        }
    }
}

enum Lifecycle {
    Empty,
    Ready(Arc<Generation>),
}

pub struct RetrievalEngine {
    ctx: Arc<RetrievalContext>,
    pipeline: Arc<IngestionPipeline>,
    cache: EmbeddingCache,
    current: RwLock<Lifecycle>,
    build_lock: Mutex<()>,
    generations: AtomicU64,
}

impl RetrievalEngine {
    pub fn new(ctx: RetrievalContext) -> Result<Self> {
        ctx.settings.validate()?;
        let pipeline = IngestionPipeline::from_settings(&ctx.settings)?;
        Ok(Self {
            ctx: Arc::new(ctx),
            pipeline: Arc::new(pipeline),
            cache: EmbeddingCache::new(),
            current: RwLock::new(Lifecycle::Empty),
            build_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
        })
    }

    pub fn context(&self) -> &RetrievalContext {
        &self.ctx
    }

    pub fn state(&self) -> EngineState {
        self.snapshot().map_or(EngineState::Empty, |g| g.state())
    }

    pub fn corpus_len(&self) -> usize {
        self.snapshot().map_or(0, |g| g.corpus.len())
    }

    /// Number of the visible generation; 0 when empty.
    pub fn generation(&self) -> u64 {
        self.snapshot().map_or(0, |g| g.number)
    }

    /// Embeddings held for reuse; only texts of the visible corpus are kept.
    pub fn cached_embeddings(&self) -> usize {
        self.cache.len()
    }

    pub fn chunk(&self, id: &str) -> Option<Arc<Chunk>> {
        let generation = self.snapshot()?;
        generation.by_id.get(id).map(|&i| Arc::clone(&generation.corpus[i]))
    }

    /// Normalize and chunk `documents` without touching the indexes.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.ingest(&documents))
            .await
            .map_err(|e| Error::Operation(format!("ingestion task failed: {e}")))
    }

    /// Ingest, then build both indexes over the result as a fresh generation.
    ///
    /// Returns the corpus size. On any failure the previous generation stays visible.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn ingest_and_index(&self, documents: Vec<Document>) -> Result<usize> {
        let _guard = self.build_lock.lock().await;
        let report = self.ingest(documents).await?;
        if report.chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        self.build_locked(report.chunks, IndexSelection::Both).await
    }

    /// Commit `chunks` as a fresh generation with the selected indexes.
    #[instrument(skip_all, fields(chunks = chunks.len(), selection = ?selection))]
    pub async fn build(&self, chunks: Vec<Chunk>, selection: IndexSelection) -> Result<usize> {
        let _guard = self.build_lock.lock().await;
        self.build_locked(chunks, selection).await
    }

    /// Rebuild indexes over the current corpus, e.g. to add the semantic index
    /// once the embedding backend is reachable again.
    #[instrument(skip_all, fields(selection = ?selection))]
    pub async fn rebuild(&self, selection: IndexSelection) -> Result<usize> {
        let _guard = self.build_lock.lock().await;
        let generation = self.snapshot().ok_or(Error::EmptyCorpus)?;
        let corpus = generation.corpus.clone();
        drop(generation);
        self.commit_corpus(corpus, selection).await
    }

    pub async fn clear(&self) {
        let _guard = self.build_lock.lock().await;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Lifecycle::Empty;
        self.cache.clear();
        tracing::info!("engine cleared");
    }

    /// Top-`k` chunks using the configured weights.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RankedChunk>> {
        self.query_with_weights(text, k, FusionWeights::from(&self.ctx.settings.retrieval)).await
    }

    /// Top-`k` chunks. With only one index built, ranks by that index alone;
    /// with none, returns an empty list.
    #[instrument(skip(self, text), fields(query_len = text.len()))]
    pub async fn query_with_weights(&self, text: &str, k: usize, weights: FusionWeights) -> Result<Vec<RankedChunk>> {
        let Some(generation) = self.snapshot() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        let fetch = k.saturating_mul(self.ctx.settings.retrieval.candidate_multiplier.max(1));

        let fused = match &generation.indexes {
            Indexes::Lexical(lexical) => {
                let hits = lexical.score(text, fetch)?;
                fuse(&hits, &[], FusionWeights { lexical: 1.0, semantic: 0.0 }, k)
            }
            Indexes::Semantic(semantic) => {
                let hits = semantic.search(text, fetch).await?;
                fuse(&[], &hits, FusionWeights { lexical: 0.0, semantic: 1.0 }, k)
            }
            Indexes::Hybrid { lexical, semantic } => {
                let lexical_hits = lexical.score(text, fetch)?;
                let semantic_hits = semantic.search(text, fetch).await?;
                fuse(&lexical_hits, &semantic_hits, weights, k)
            }
        };

        Ok(fused
            .into_iter()
            .filter_map(|hit| {
                generation.by_id.get(&hit.id).map(|&i| RankedChunk {
                    chunk: Arc::clone(&generation.corpus[i]),
                    score: hit.score,
                    lexical: hit.lexical,
                    semantic: hit.semantic,
                })
            })
            .collect())
    }

    fn snapshot(&self) -> Option<Arc<Generation>> {
        match &*self.current.read().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::Empty => None,
            Lifecycle::Ready(generation) => Some(Arc::clone(generation)),
        }
    }

    async fn build_locked(&self, chunks: Vec<Chunk>, selection: IndexSelection) -> Result<usize> {
        let mut seen = HashSet::new();
        let total = chunks.len();
        let corpus: Vec<Arc<Chunk>> = chunks.into_iter().filter(|c| seen.insert(c.id.clone())).map(Arc::new).collect();
        if corpus.len() < total {
            tracing::debug!(duplicates = total - corpus.len(), "dropped duplicate chunk ids");
        }
        self.commit_corpus(corpus, selection).await
    }

    async fn commit_corpus(&self, corpus: Vec<Arc<Chunk>>, selection: IndexSelection) -> Result<usize> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let (corpus, semantic) = match selection {
            IndexSelection::Lexical => (corpus, None),
            IndexSelection::Semantic | IndexSelection::Both => {
                let (corpus, index) = self.build_semantic(corpus).await?;
                (corpus, Some(index))
            }
        };
        let lexical = match selection {
            IndexSelection::Semantic => None,
            IndexSelection::Lexical | IndexSelection::Both => Some(self.build_lexical(&corpus).await?),
        };
        let indexes = match (lexical, semantic) {
            (Some(lexical), Some(semantic)) => Indexes::Hybrid { lexical, semantic },
            (Some(lexical), None) => Indexes::Lexical(lexical),
            (None, Some(semantic)) => Indexes::Semantic(semantic),
            (None, None) => return Err(Error::Operation("no index selected".into())),
        };

        let live: HashSet<String> = corpus.iter().map(|c| hash_content(&c.text)).collect();
        let by_id = corpus.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
        let number = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Generation { number, corpus, by_id, indexes };
        let state = generation.state();
        let size = generation.corpus.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Lifecycle::Ready(Arc::new(generation));
        self.cache.retain_hashes(&live);
        tracing::info!(generation = number, chunks = size, ?state, "committed corpus generation");
        Ok(size)
    }

    /// Builds the semantic index and returns the corpus annotated with embeddings.
    async fn build_semantic(&self, corpus: Vec<Arc<Chunk>>) -> Result<(Vec<Arc<Chunk>>, SemanticIndex)> {
        let opts = BuildOptions::from(&self.ctx.settings.embedding);
        let index = SemanticIndex::build(&corpus, Arc::clone(&self.ctx.embedder), opts, Some(&self.cache)).await?;
        let annotated = corpus
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| match index.vector(i) {
                Some(v) if chunk.embedding.is_none() => Arc::new((*chunk).clone().with_embedding(Arc::clone(v))),
                _ => chunk,
            })
            .collect();
        Ok((annotated, index))
    }

    async fn build_lexical(&self, corpus: &[Arc<Chunk>]) -> Result<LexicalIndex> {
        let corpus = corpus.to_vec();
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || LexicalIndex::build(corpus.iter().map(|c| &**c), &ctx.analyzer))
            .await
            .map_err(|e| Error::Operation(format!("lexical build task failed: {e}")))?
    }
}
