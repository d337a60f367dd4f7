use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use localrag_core::traits::Embedder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings from a local Ollama server (`POST /api/embed`).
///
/// The dimension is discovered once at connect time with a probe request.
#[derive(Debug)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    id: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub async fn connect(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        let endpoint = format!("{}/api/embed", base_url.trim_end_matches('/'));
        let mut embedder = Self { client, endpoint, model: model.to_string(), id: format!("ollama:{model}"), dim: 0 };

        let probe = embedder.request(&["dimension probe".to_string()]).await?;
        embedder.dim = probe.first().map(Vec::len).unwrap_or(0);
        if embedder.dim == 0 {
            bail!("Ollama model '{model}' returned an empty embedding");
        }
        tracing::info!(model, dim = embedder.dim, "connected to Ollama embedder");
        Ok(embedder)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .with_context(|| format!("Failed to send embedding request to {}", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Ollama returned {status}: {body}");
        }
        let body = response.text().await.context("Failed to read embedding response")?;
        parse_response(&body, texts.len())
    }
}

fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: EmbedResponse = serde_json::from_str(body).context("Malformed embedding response")?;
    if parsed.embeddings.len() != expected {
        bail!("expected {expected} embeddings, got {}", parsed.embeddings.len());
    }
    Ok(parsed.embeddings)
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
