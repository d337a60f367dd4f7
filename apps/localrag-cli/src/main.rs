//! localrag: ingest a directory of documents and answer retrieval queries.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use localrag_core::config::{Config, EmbeddingSettings};
use localrag_core::loader::load_documents;
use localrag_core::traits::Embedder;
use localrag_embed::{embedder_from_settings, HashEmbedder};
use localrag_hybrid::{IndexSelection, RetrievalContext, RetrievalEngine};

mod files;
mod output;

use files::{discover, FileLoader};
use output::QueryReport;

const PREVIEW_CHARS: usize = 160;

#[derive(Parser)]
#[command(name = "localrag")]
#[command(version, about = "Hybrid lexical and semantic retrieval over local documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every .txt and .pdf file under a directory, then run queries
    IngestQuery {
        /// Directory to walk
        dir: PathBuf,

        /// Query to run; repeatable. Reads one query per line from stdin when absent
        #[arg(short, long = "query")]
        queries: Vec<String>,

        /// Results per query (defaults to retrieval.default_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Print one JSON object per query
        #[arg(long)]
        json: bool,

        /// Skip the semantic index
        #[arg(long)]
        lexical_only: bool,

        #[arg(long)]
        lexical_weight: Option<f32>,

        #[arg(long)]
        semantic_weight: Option<f32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::IngestQuery { dir, queries, k, json, lexical_only, lexical_weight, semantic_weight } => {
            let mut settings = Config::load()?.settings()?;
            if let Some(w) = lexical_weight {
                settings.retrieval.lexical_weight = w;
            }
            if let Some(w) = semantic_weight {
                settings.retrieval.semantic_weight = w;
            }
            let k = k.unwrap_or(settings.retrieval.default_k);

            let (embedder, selection) = pick_embedder(&settings.embedding, lexical_only).await?;
            let engine = RetrievalEngine::new(RetrievalContext::new(settings, embedder))?;

            let requests = discover(&dir)?;
            tracing::info!(files = requests.len(), dir = %dir.display(), "discovered sources");
            let loaded = load_documents(&FileLoader, &requests).await;
            if !loaded.failures.is_empty() {
                tracing::warn!(failed = loaded.failures.len(), "some files could not be loaded");
            }

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message(format!("chunking {} documents", loaded.documents.len()));

            let report = engine.ingest(loaded.documents).await?;
            for failure in &report.failed {
                tracing::warn!(document = %failure.document_id, uri = %failure.source_uri, reason = %failure.reason, "document skipped");
            }
            if report.chunks.is_empty() {
                spinner.finish_and_clear();
                anyhow::bail!("no text found under {}", dir.display());
            }

            spinner.set_message(format!("indexing {} chunks", report.chunks.len()));
            let size = match engine.build(report.chunks.clone(), selection).await {
                Ok(size) => size,
                Err(e) if e.is_embedding() => {
                    tracing::warn!(error = %e, "semantic index unavailable; continuing lexical-only");
                    engine.build(report.chunks, IndexSelection::Lexical).await?
                }
                Err(e) => return Err(e.into()),
            };
            spinner.finish_with_message(format!("indexed {size} chunks ({:?})", engine.state()));

            let queries = if queries.is_empty() { read_queries().await? } else { queries };
            for query in queries.iter().filter(|q| !q.trim().is_empty()) {
                let ranked = engine.query(query, k).await?;
                let report = QueryReport::new(query, &ranked);
                if json {
                    println!("{}", report.to_json()?);
                } else {
                    print!("{}", report.to_text(PREVIEW_CHARS));
                }
            }
            Ok(())
        }
    }
}

/// The configured embedder, or the hash embedder as a placeholder when only the
/// lexical index will be built.
async fn pick_embedder(
    settings: &EmbeddingSettings,
    lexical_only: bool,
) -> Result<(Arc<dyn Embedder>, IndexSelection)> {
    let placeholder = || -> Result<Arc<dyn Embedder>> { Ok(Arc::new(HashEmbedder::new(settings.dim)?)) };
    if lexical_only {
        return Ok((placeholder()?, IndexSelection::Lexical));
    }
    match embedder_from_settings(settings).await {
        Ok(embedder) => Ok((embedder, IndexSelection::Both)),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), provider = ?settings.provider, "embedder unavailable; lexical-only");
            Ok((placeholder()?, IndexSelection::Lexical))
        }
    }
}

async fn read_queries() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut queries = Vec::new();
    while let Some(line) = lines.next_line().await.context("reading queries from stdin")? {
        queries.push(line);
    }
    Ok(queries)
}
