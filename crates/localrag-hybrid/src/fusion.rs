//! Weighted min-max score fusion of the lexical and semantic rankings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use localrag_core::config::RetrievalSettings;
use localrag_core::types::{ChunkId, SearchHit};

/// Caller-supplied weights. They need not sum to 1; a negative weight inverts
/// that list's contribution and is accepted as is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub lexical: f32,
    pub semantic: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { lexical: 0.5, semantic: 0.5 }
    }
}

impl From<&RetrievalSettings> for FusionWeights {
    fn from(s: &RetrievalSettings) -> Self {
        Self { lexical: s.lexical_weight, semantic: s.semantic_weight }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f32,
    /// Normalized lexical score, if the chunk appeared in the lexical list.
    pub lexical: Option<f32>,
    pub semantic: Option<f32>,
}

/// Scale scores into `[0, 1]`. A single entry, or a list whose scores are all
/// equal, maps every entry to 1.0.
pub fn min_max_normalize(hits: &[SearchHit]) -> Vec<f32> {
    let (min, max) = hits
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| (lo.min(h.score), hi.max(h.score)));
    let range = max - min;
    hits.iter()
        .map(|h| if range > 0.0 && range.is_finite() { (h.score - min) / range } else { 1.0 })
        .collect()
}

struct Entry {
    lexical: Option<(f32, usize)>,
    semantic: Option<(f32, usize)>,
}

fn rank_key(rank: Option<(f32, usize)>) -> usize {
    rank.map_or(usize::MAX, |(_, r)| r)
}

/// Fuse two ranked lists into at most `k` chunk ids, best first.
///
/// `fused = lw * lexical + sw * semantic` over normalized scores, with 0 for a
/// list the chunk is missing from. Ties go to the better semantic rank, then
/// the better lexical rank.
pub fn fuse(lexical: &[SearchHit], semantic: &[SearchHit], weights: FusionWeights, k: usize) -> Vec<FusedHit> {
    let mut entries: HashMap<&str, Entry> = HashMap::new();
    for (rank, (hit, norm)) in lexical.iter().zip(min_max_normalize(lexical)).enumerate() {
        let e = entries.entry(hit.id.as_str()).or_insert(Entry { lexical: None, semantic: None });
        e.lexical.get_or_insert((norm, rank));
    }
    for (rank, (hit, norm)) in semantic.iter().zip(min_max_normalize(semantic)).enumerate() {
        let e = entries.entry(hit.id.as_str()).or_insert(Entry { lexical: None, semantic: None });
        e.semantic.get_or_insert((norm, rank));
    }

    let mut fused: Vec<(FusedHit, usize, usize)> = entries
        .into_iter()
        .map(|(id, e)| {
            let l = e.lexical.map_or(0.0, |(s, _)| s);
            let s = e.semantic.map_or(0.0, |(s, _)| s);
            let hit = FusedHit {
                id: id.to_string(),
                score: weights.lexical * l + weights.semantic * s,
                lexical: e.lexical.map(|(s, _)| s),
                semantic: e.semantic.map(|(s, _)| s),
            };
            (hit, rank_key(e.semantic), rank_key(e.lexical))
        })
        .collect();

    fused.sort_by(|a, b| {
        b.0.score
            .total_cmp(&a.0.score)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    fused.truncate(k);
    fused.into_iter().map(|(hit, _, _)| hit).collect()
}
