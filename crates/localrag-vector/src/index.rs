use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use localrag_core::config::EmbeddingSettings;
use localrag_core::error::{Error, Result};
use localrag_core::traits::Embedder;
use localrag_core::types::{Chunk, ChunkId, SearchHit, SourceKind};

use crate::cache::{hash_content, EmbeddingCache};

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub batch_size: usize,
    /// Maximum embedding batches awaiting the embedder at once.
    pub concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { batch_size: 32, concurrency: 2 }
    }
}

impl From<&EmbeddingSettings> for BuildOptions {
    fn from(s: &EmbeddingSettings) -> Self {
        Self { batch_size: s.batch_size.max(1), concurrency: s.concurrency.max(1) }
    }
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn unit_length(v: &Arc<[f32]>) -> Arc<[f32]> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if (norm - 1.0).abs() <= 1e-5 {
        Arc::clone(v)
    } else {
        Arc::from(l2_normalize(v.to_vec()))
    }
}

fn check_vector(v: &[f32], dim: usize) -> Result<()> {
    if v.len() != dim {
        return Err(Error::Embedding(format!("dim mismatch: got {} expected {}", v.len(), dim)));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::Embedding("embedder returned a non-finite value".into()));
    }
    Ok(())
}

/// Exact cosine-similarity index over one corpus generation.
///
/// Vectors are stored unit-length, so similarity is a dot product.
pub struct SemanticIndex {
    embedder: Arc<dyn Embedder>,
    ids: Vec<ChunkId>,
    vectors: Vec<Arc<[f32]>>,
}

impl SemanticIndex {
    /// Embed every chunk and build the index.
    ///
    /// Chunks that already carry an embedding of the right dimension, and
    /// texts found in `cache`, are not sent to the embedder. Attached vectors
    /// are validated and scaled to unit length like fresh ones. Any embedder
    /// failure, a wrong vector count or a wrong dimension fails the whole build.
    pub async fn build(
        chunks: &[Arc<Chunk>],
        embedder: Arc<dyn Embedder>,
        opts: BuildOptions,
        cache: Option<&EmbeddingCache>,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let dim = embedder.dim();
        let embedder_id = embedder.id().to_string();

        // Attached vectors of the wrong dimension are re-embedded.
        let mut vectors: Vec<Option<Arc<[f32]>>> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let reused = match &chunk.embedding {
                Some(v) if v.len() == dim => {
                    check_vector(v, dim)?;
                    Some(unit_length(v))
                }
                _ => None,
            };
            vectors.push(reused);
        }

        let missing: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        let hashes: HashMap<usize, String> = missing.iter().map(|&i| (i, hash_content(&chunks[i].text))).collect();
        if let Some(cache) = cache {
            let wanted: Vec<String> = hashes.values().cloned().collect();
            let hits = cache.get_many(&embedder_id, &wanted);
            for &i in &missing {
                if let Some(v) = hashes.get(&i).and_then(|h| hits.get(h)) {
                    vectors[i] = Some(Arc::clone(v));
                }
            }
        }

        let pending: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        tracing::debug!(chunks = chunks.len(), to_embed = pending.len(), "building semantic index");

        let batches: Vec<Vec<usize>> = pending.chunks(opts.batch_size.max(1)).map(<[usize]>::to_vec).collect();
        let embedded: Vec<(Vec<usize>, Vec<Vec<f32>>)> = stream::iter(batches)
            .map(|batch| {
                let embedder = Arc::clone(&embedder);
                let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
                async move {
                    let out = embedder
                        .embed_batch(&texts)
                        .await
                        .map_err(|e| Error::Embedding(format!("{e:#}")))?;
                    if out.len() != texts.len() {
                        return Err(Error::Embedding(format!(
                            "embedder returned {} vectors for {} texts",
                            out.len(),
                            texts.len()
                        )));
                    }
                    Ok::<_, Error>((batch, out))
                }
            })
            .buffered(opts.concurrency.max(1))
            .try_collect()
            .await?;

        let mut fresh = Vec::new();
        for (batch, out) in embedded {
            for (i, v) in batch.into_iter().zip(out) {
                check_vector(&v, dim)?;
                let v: Arc<[f32]> = Arc::from(l2_normalize(v));
                if let Some(h) = hashes.get(&i) {
                    fresh.push((h.clone(), Arc::clone(&v)));
                }
                vectors[i] = Some(v);
            }
        }
        if let Some(cache) = cache {
            cache.put_many(&embedder_id, fresh);
        }

        let vectors = vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Embedding("chunk left without an embedding".into())))
            .collect::<Result<Vec<_>>>()?;
        let ids = chunks.iter().map(|c| c.id.clone()).collect();
        Ok(Self { embedder, ids, vectors })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    /// The stored unit-length vector of the chunk at build position `i`.
    pub fn vector(&self, i: usize) -> Option<&Arc<[f32]>> {
        self.vectors.get(i)
    }

    /// Top-`k` chunks by cosine similarity, ties by build order.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await
            .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        let q = out.pop().ok_or_else(|| Error::Embedding("embedder returned no query vector".into()))?;
        check_vector(&q, self.dim())?;
        let q = l2_normalize(q);

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (v.iter().zip(&q).map(|(a, b)| a * b).sum::<f32>(), i))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(score, i)| SearchHit { id: self.ids[i].clone(), score, source: SourceKind::Semantic })
            .collect())
    }
}
