//! Boundary with source loaders.
//!
//! Loading is the caller's side of ingestion: failures are logged and skipped
//! here, and a source that produced no text simply yields zero chunks later.

use futures::future::join_all;

use crate::error::Error;
use crate::traits::Loader;
use crate::types::{Document, SourceType};

#[derive(Debug, Clone)]
pub struct SourceRequest {
    pub source_type: SourceType,
    pub source_uri: String,
}

impl SourceRequest {
    pub fn new(source_type: SourceType, source_uri: impl Into<String>) -> Self {
        Self { source_type, source_uri: source_uri.into() }
    }
}

#[derive(Debug)]
pub struct LoadFailure {
    pub request: SourceRequest,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
}

/// Load every request concurrently, keeping request order in the output.
pub async fn load_documents(loader: &dyn Loader, requests: &[SourceRequest]) -> LoadOutcome {
    let loads = requests.iter().map(|req| loader.load(req.source_type, &req.source_uri));
    let results = join_all(loads).await;

    let mut outcome = LoadOutcome::default();
    for (req, result) in requests.iter().zip(results) {
        match result {
            Ok(loaded) => {
                let mut doc = Document::new(req.source_type, req.source_uri.clone(), loaded.raw_text);
                doc.metadata.extend(loaded.metadata);
                outcome.documents.push(doc);
            }
            Err(e) => {
                tracing::warn!(source = %req.source_type, uri = %req.source_uri, error = %e, "skipping source that failed to load");
                outcome.failures.push(LoadFailure {
                    request: req.clone(),
                    error: Error::Load { uri: req.source_uri.clone(), reason: format!("{e:#}") },
                });
            }
        }
    }
    outcome
}
