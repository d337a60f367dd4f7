use localrag_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use localrag_embed::{embedder_from_settings, HashEmbedder};
use localrag_core::traits::Embedder;

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(384).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "HELLO, World!".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    assert_eq!(embs.len(), 3);
    let v1 = &embs[0];

    assert_eq!(v1.len(), 384);
    assert_eq!(embedder.dim(), 384);
    assert_eq!(embedder.id(), "hash:d384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Same tokens after case folding and punctuation splitting.
    for other in &embs[1..] {
        for (a, b) in v1.iter().zip(other.iter()) { assert!((a - b).abs() <= 1e-6); }
    }
}

#[tokio::test]
async fn settings_select_the_hash_embedder() {
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::Hash, dim: 64, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings).await.expect("embedder");
    assert_eq!(embedder.dim(), 64);
    let out = embedder.embed_batch(&["a b c".to_string()]).await.unwrap();
    assert_eq!(out[0].len(), 64);
}
