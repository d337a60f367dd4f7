use async_trait::async_trait;
use std::collections::HashSet;

use localrag_core::loader::{load_documents, SourceRequest};
use localrag_core::traits::LoadedSource;
use localrag_core::{ChunkConfig, Document, Error, IngestionPipeline, Loader, SourceType};

fn pipeline(size: usize, overlap: usize) -> IngestionPipeline {
    IngestionPipeline::new(ChunkConfig::new(size, overlap), 2).unwrap()
}

#[test]
fn single_short_document_becomes_one_chunk() {
    let doc = Document::new(SourceType::Pdf, "/docs/notes.pdf", "Short   text.\n");
    let report = pipeline(1000, 200).ingest(std::slice::from_ref(&doc));

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks.len(), 1);
    let chunk = &report.chunks[0];
    assert_eq!(chunk.text, "Short text.");
    assert_eq!(chunk.id, format!("{}:0", doc.id));
    assert_eq!(chunk.parent_document_id, doc.id);
    assert_eq!(chunk.title.as_deref(), Some("notes"));
    assert!(chunk.embedding.is_none());
}

#[test]
fn chunks_keep_document_order_and_sequence() {
    let docs: Vec<Document> = (0..8)
        .map(|i| Document::new(SourceType::Url, format!("https://site{i}.example/page"), "word ".repeat(60)))
        .collect();
    let report = pipeline(50, 10).ingest(&docs);

    assert!(report.failed.is_empty());
    let mut last_doc = 0;
    for chunk in &report.chunks {
        let doc_pos = docs.iter().position(|d| d.id == chunk.parent_document_id).unwrap();
        assert!(doc_pos >= last_doc, "chunks must follow input document order");
        last_doc = doc_pos;
    }
    for doc in &docs {
        let seqs: Vec<usize> = report
            .chunks
            .iter()
            .filter(|c| c.parent_document_id == doc.id)
            .map(|c| c.sequence_index)
            .collect();
        assert_eq!(seqs, (0..seqs.len()).collect::<Vec<_>>());
    }
}

#[test]
fn whitespace_only_document_is_reported_empty() {
    let docs = vec![
        Document::new(SourceType::Pdf, "a.pdf", "  \n\t "),
        Document::new(SourceType::Pdf, "b.pdf", "Real content here."),
    ];
    let report = pipeline(1000, 200).ingest(&docs);

    assert_eq!(report.empty, vec![docs[0].id.clone()]);
    assert_eq!(report.chunks.len(), 1);
    assert_eq!(report.chunks[0].parent_document_id, docs[1].id);
}

#[test]
fn panicking_document_does_not_abort_the_batch() {
    let docs = vec![
        Document::new(SourceType::Pdf, "ok-1.pdf", "first document"),
        Document::new(SourceType::Pdf, "bad.pdf", "POISON"),
        Document::new(SourceType::Pdf, "ok-2.pdf", "second document"),
    ];
    let pipeline = pipeline(1000, 200).with_normalizer(|text| {
        assert!(!text.contains("POISON"), "refusing poisoned input");
        text.to_string()
    });
    let report = pipeline.ingest(&docs);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].document_id, docs[1].id);
    assert!(report.failed[0].reason.contains("refusing poisoned input"));
    let parents: HashSet<_> = report.chunks.iter().map(|c| c.parent_document_id.clone()).collect();
    assert_eq!(parents, HashSet::from([docs[0].id.clone(), docs[2].id.clone()]));
}

#[test]
fn invalid_chunk_config_is_rejected() {
    let err = IngestionPipeline::new(ChunkConfig::new(100, 100), 1).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn zero_workers_still_runs() {
    let p = IngestionPipeline::new(ChunkConfig::default(), 0).unwrap();
    assert_eq!(p.workers(), 1);
}

struct FakeLoader;

#[async_trait]
impl Loader for FakeLoader {
    async fn load(&self, source_type: SourceType, source_uri: &str) -> anyhow::Result<LoadedSource> {
        if source_uri.contains("missing") {
            anyhow::bail!("no such source");
        }
        let mut loaded = LoadedSource { raw_text: format!("{source_type} text for {source_uri}"), ..LoadedSource::default() };
        loaded.metadata.insert("title".into(), format!("Title of {source_uri}"));
        Ok(loaded)
    }
}

#[tokio::test]
async fn load_failures_are_skipped_and_reported() {
    let requests = vec![
        SourceRequest::new(SourceType::Url, "https://a.example"),
        SourceRequest::new(SourceType::Pdf, "missing.pdf"),
        SourceRequest::new(SourceType::Youtube, "dQw4w9WgXcQ"),
    ];
    let outcome = load_documents(&FakeLoader, &requests).await;

    assert_eq!(outcome.documents.len(), 2);
    assert_eq!(outcome.documents[0].source_uri, "https://a.example");
    assert_eq!(outcome.documents[1].source_type, SourceType::Youtube);
    assert_eq!(outcome.documents[1].metadata.get("title").map(String::as_str), Some("Title of dQw4w9WgXcQ"));
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(&outcome.failures[0].error, Error::Load { uri, .. } if uri == "missing.pdf"));
}
