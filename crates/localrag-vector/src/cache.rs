use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Content hash used as the cache key; identical text shares one vector.
pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

/// Write-through embedding cache keyed by `(embedder_id, content_hash)`.
///
/// Vectors from different embedders never mix, so swapping models simply
/// misses the cache.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<(String, String), Arc<[f32]>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Arc<[f32]>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        hashes
            .iter()
            .filter_map(|h| {
                entries.get(&(embedder_id.to_string(), h.clone())).map(|v| (h.clone(), Arc::clone(v)))
            })
            .collect()
    }

    pub fn put_many<I>(&self, embedder_id: &str, items: I)
    where
        I: IntoIterator<Item = (String, Arc<[f32]>)>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (hash, vector) in items {
            entries.insert((embedder_id.to_string(), hash), vector);
        }
    }

    /// Drop every entry whose content hash is not in `keep`, for all embedders.
    pub fn retain_hashes(&self, keep: &HashSet<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(_, hash), _| keep.contains(hash));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
