use anyhow::{bail, Result};
use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

use localrag_core::traits::Embedder;

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token lands in one of `dim` buckets with a sign
/// taken from the hash, so texts sharing vocabulary have positive cosine
/// similarity. Needs no model files; used in tests and as the offline default.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            bail!("hash embedder dimension must be at least 1");
        }
        Ok(Self { dim, id: format!("hash:d{dim}") })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
