use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use localrag_core::chunker::ChunkConfig;
use localrag_core::config::Settings;
use localrag_core::error::Error;
use localrag_core::traits::Embedder;
use localrag_core::types::{Document, SourceType};
use localrag_embed::HashEmbedder;
use localrag_hybrid::{EngineState, FusionWeights, IndexSelection, RetrievalContext, RetrievalEngine};

/// Hash embedder that can be told to fail or stall.
struct Switchable {
    inner: HashEmbedder,
    fail: AtomicBool,
    delay_ms: AtomicU64,
}

impl Switchable {
    fn new() -> Arc<Self> {
        Arc::new(Self { inner: HashEmbedder::new(128).unwrap(), fail: AtomicBool::new(false), delay_ms: AtomicU64::new(0) })
    }
}

#[async_trait]
impl Embedder for Switchable {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding backend unavailable");
        }
        self.inner.embed_batch(texts).await
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.chunking = ChunkConfig::new(120, 20);
    settings.ingest.workers = 2;
    settings
}

fn engine(embedder: Arc<Switchable>) -> RetrievalEngine {
    RetrievalEngine::new(RetrievalContext::new(settings(), embedder)).unwrap()
}

fn documents() -> Vec<Document> {
    vec![
        Document::new(
            SourceType::Pdf,
            "/papers/ownership.pdf",
            "Rust ownership rules. Each value has a single owner, and borrowing lets code use a value \
             without taking ownership. The borrow checker rejects dangling references at compile time.",
        ),
        Document::new(
            SourceType::Url,
            "https://bread.example/sourdough",
            "Sourdough bread relies on a wild yeast starter. Feed the starter with flour and water, \
             then let the dough proof overnight before baking in a hot oven.",
        )
        .with_metadata("title", "Sourdough Basics"),
        Document::new(
            SourceType::Youtube,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "In this video we explore async Rust with the tokio runtime, spawning tasks and awaiting futures.",
        ),
    ]
}

#[tokio::test]
async fn query_on_empty_engine_returns_nothing() {
    let engine = engine(Switchable::new());
    assert_eq!(engine.state(), EngineState::Empty);
    assert!(engine.query("anything", 5).await.unwrap().is_empty());
    assert_eq!(engine.generation(), 0);
}

#[tokio::test]
async fn ingest_and_index_reaches_hybrid_ready() {
    let engine = engine(Switchable::new());
    let size = engine.ingest_and_index(documents()).await.unwrap();

    assert!(size >= 3);
    assert_eq!(engine.corpus_len(), size);
    assert_eq!(engine.state(), EngineState::HybridReady);
    assert_eq!(engine.generation(), 1);

    let results = engine.query("sourdough starter", 3).await.unwrap();
    assert!(!results.is_empty() && results.len() <= 3);
    assert_eq!(results[0].chunk.source_uri, "https://bread.example/sourdough");
    assert_eq!(results[0].context().title.as_deref(), Some("Sourdough Basics"));
    assert!(results[0].chunk.embedding.is_some());
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn results_carry_titles_for_every_source_type() {
    let engine = engine(Switchable::new());
    engine.ingest_and_index(documents()).await.unwrap();

    let video = engine.query("tokio runtime async", 1).await.unwrap();
    assert_eq!(video[0].context().title.as_deref(), Some("YouTube Video dQw4w9WgXcQ"));
    let paper = engine.query("borrow checker ownership", 1).await.unwrap();
    assert_eq!(paper[0].context().title.as_deref(), Some("ownership"));
}

#[tokio::test]
async fn embedding_failure_keeps_the_previous_generation() {
    let embedder = Switchable::new();
    let engine = engine(Arc::clone(&embedder));
    let size = engine.ingest_and_index(documents()).await.unwrap();

    embedder.fail.store(true, Ordering::SeqCst);
    let extra = vec![Document::new(SourceType::Pdf, "new.pdf", "Completely new material about gardening.")];
    let err = engine.ingest_and_index(extra).await.unwrap_err();

    assert!(err.is_embedding(), "got {err:?}");
    assert_eq!(engine.state(), EngineState::HybridReady);
    assert_eq!(engine.generation(), 1);
    assert_eq!(engine.corpus_len(), size);
}

#[tokio::test]
async fn lexical_fallback_then_rebuild_to_hybrid() {
    let embedder = Switchable::new();
    embedder.fail.store(true, Ordering::SeqCst);
    let engine = engine(Arc::clone(&embedder));

    assert!(engine.ingest_and_index(documents()).await.unwrap_err().is_embedding());
    assert_eq!(engine.state(), EngineState::Empty);

    let report = engine.ingest(documents()).await.unwrap();
    engine.build(report.chunks, IndexSelection::Lexical).await.unwrap();
    assert_eq!(engine.state(), EngineState::LexicalReady);
    let lexical_only = engine.query("borrow checker", 2).await.unwrap();
    assert_eq!(lexical_only[0].chunk.source_uri, "/papers/ownership.pdf");
    assert!(lexical_only.iter().all(|r| r.semantic.is_none()));

    embedder.fail.store(false, Ordering::SeqCst);
    engine.rebuild(IndexSelection::Both).await.unwrap();
    assert_eq!(engine.state(), EngineState::HybridReady);
    assert_eq!(engine.generation(), 2);
}

#[tokio::test]
async fn semantic_only_generation_ranks_by_similarity() {
    let engine = engine(Switchable::new());
    let report = engine.ingest(documents()).await.unwrap();
    engine.build(report.chunks, IndexSelection::Semantic).await.unwrap();
    assert_eq!(engine.state(), EngineState::SemanticReady);

    let results = engine.query("tokio tasks futures", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].lexical.is_none());
}

#[tokio::test]
async fn batch_without_text_is_an_empty_corpus() {
    let engine = engine(Switchable::new());
    let blank = vec![Document::new(SourceType::Pdf, "blank.pdf", "   \n  ")];
    assert!(matches!(engine.ingest_and_index(blank).await, Err(Error::EmptyCorpus)));
    assert!(matches!(engine.rebuild(IndexSelection::Both).await, Err(Error::EmptyCorpus)));
    assert_eq!(engine.state(), EngineState::Empty);
}

#[tokio::test]
async fn abandoned_build_commits_nothing() {
    let embedder = Switchable::new();
    let engine = engine(Arc::clone(&embedder));
    embedder.delay_ms.store(5_000, Ordering::SeqCst);

    let outcome = tokio::time::timeout(Duration::from_millis(100), engine.ingest_and_index(documents())).await;
    assert!(outcome.is_err(), "build should still be waiting on the embedder");
    assert_eq!(engine.state(), EngineState::Empty);

    embedder.delay_ms.store(0, Ordering::SeqCst);
    engine.ingest_and_index(documents()).await.unwrap();
    assert_eq!(engine.state(), EngineState::HybridReady);
}

#[tokio::test]
async fn identical_documents_collapse_to_one_chunk_set() {
    let engine = engine(Switchable::new());
    let single = engine.ingest_and_index(documents()[..1].to_vec()).await.unwrap();
    let doubled = engine.ingest_and_index(vec![documents()[0].clone(), documents()[0].clone()]).await.unwrap();
    assert_eq!(single, doubled);
    assert_eq!(engine.generation(), 2);
}

#[tokio::test]
async fn weights_shift_the_ranking_and_k_bounds_it() {
    let engine = engine(Switchable::new());
    engine.ingest_and_index(documents()).await.unwrap();

    let lexical_heavy = engine
        .query_with_weights("tokio", 10, FusionWeights { lexical: 1.0, semantic: 0.0 })
        .await
        .unwrap();
    assert!(lexical_heavy.len() <= 10);
    assert!(lexical_heavy[0].chunk.text.to_lowercase().contains("tokio"));
    assert!(engine.query("tokio", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_returns_to_empty() {
    let engine = engine(Switchable::new());
    engine.ingest_and_index(documents()).await.unwrap();
    engine.clear().await;
    assert_eq!(engine.state(), EngineState::Empty);
    assert!(engine.query("rust", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn engines_with_different_settings_coexist() {
    let mut coarse = settings();
    coarse.chunking = ChunkConfig::new(1000, 200);
    let a = RetrievalEngine::new(RetrievalContext::new(coarse, Switchable::new())).unwrap();
    let b = engine(Switchable::new());
    let na = a.ingest_and_index(documents()).await.unwrap();
    let nb = b.ingest_and_index(documents()).await.unwrap();
    assert_eq!(na, 3);
    assert!(nb > na);
}

#[tokio::test]
async fn reingestion_keeps_only_the_live_corpus_embeddings() {
    let engine = engine(Switchable::new());
    for i in 0..5 {
        let doc = Document::new(SourceType::Pdf, format!("notes-{i}.pdf"), format!("Field notes for season {i}."));
        assert_eq!(engine.ingest_and_index(vec![doc]).await.unwrap(), 1);
        assert_eq!(engine.cached_embeddings(), 1);
    }

    engine.clear().await;
    assert_eq!(engine.corpus_len(), 0);
    assert_eq!(engine.cached_embeddings(), 0);
}

#[tokio::test]
async fn overlapping_reingestion_reuses_cached_embeddings() {
    let engine = engine(Switchable::new());
    let size = engine.ingest_and_index(documents()).await.unwrap();
    assert_eq!(engine.cached_embeddings(), size);

    let mut next = documents()[..2].to_vec();
    next.push(Document::new(SourceType::Pdf, "extra.pdf", "A short note on composting kitchen scraps."));
    let next_size = engine.ingest_and_index(next).await.unwrap();
    assert_eq!(engine.cached_embeddings(), next_size);
}
