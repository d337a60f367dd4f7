//! Local-directory loader: `.txt` files hold pre-extracted text, `.pdf` files go
//! through `pdf-extract`. Both are ingested as `pdf` documents.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use walkdir::WalkDir;

use localrag_core::loader::SourceRequest;
use localrag_core::traits::{LoadedSource, Loader};
use localrag_core::types::SourceType;

const EXTENSIONS: [&str; 2] = ["txt", "pdf"];

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
}

/// Every loadable file under `dir`, in file-name order.
pub fn discover(dir: &Path) -> Result<Vec<SourceRequest>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }
    let mut requests = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if extension(path).is_some_and(|ext| EXTENSIONS.contains(&ext.as_str())) {
            requests.push(SourceRequest::new(SourceType::Pdf, path.to_string_lossy()));
        }
    }
    Ok(requests)
}

pub struct FileLoader;

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self, source_type: SourceType, source_uri: &str) -> Result<LoadedSource> {
        if source_type != SourceType::Pdf {
            anyhow::bail!("file loader cannot load {source_type} sources");
        }
        let path = Path::new(source_uri).to_path_buf();
        let raw_text = match extension(&path).as_deref() {
            Some("pdf") => {
                let bytes = tokio::fs::read(&path).await.with_context(|| format!("reading {}", path.display()))?;
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await?
                    .with_context(|| format!("extracting text from {source_uri}"))?
            }
            _ => tokio::fs::read_to_string(&path).await.with_context(|| format!("reading {}", path.display()))?,
        };
        if raw_text.trim().is_empty() {
            tracing::warn!(path = %source_uri, "no text extracted; the file may be scanned");
        }
        let mut loaded = LoadedSource { raw_text, ..LoadedSource::default() };
        loaded.metadata.insert("path".into(), source_uri.to_string());
        Ok(loaded)
    }
}
