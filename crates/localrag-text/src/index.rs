use std::fmt::Display;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use localrag_core::error::{Error, Result};
use localrag_core::types::{Chunk, ChunkId, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, distinct_terms, register_tokenizer, LexicalFields, ORDINAL_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn index_err(e: impl Display) -> Error {
	Error::Index(e.to_string())
}

/// Immutable BM25 index over one corpus generation. Adding chunks means
/// building a new index.
pub struct LexicalIndex {
	reader: IndexReader,
	fields: LexicalFields,
	analyzer: TextAnalyzer,
	ids: Vec<ChunkId>,
}

impl LexicalIndex {
	pub fn build<'a, I>(chunks: I, analyzer: &TextAnalyzer) -> Result<Self>
	where
		I: IntoIterator<Item = &'a Chunk>,
	{
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index, analyzer.clone());

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(index_err)?;
		let mut ids = Vec::new();
		for chunk in chunks {
			let ordinal = ids.len() as u64;
			writer
				.add_document(doc!(fields.ordinal => ordinal, fields.text => chunk.text.clone()))
				.map_err(index_err)?;
			ids.push(chunk.id.clone());
		}
		writer.commit().map_err(index_err)?;

		let reader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(index_err)?;
		tracing::debug!(chunks = ids.len(), "lexical index built");
		Ok(Self { reader, fields, analyzer: analyzer.clone(), ids })
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// BM25 top-`k`, score descending, ties by insertion order.
	///
	/// A query with no indexable terms (empty, or only stop words) matches nothing.
	pub fn score(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut analyzer = self.analyzer.clone();
		let terms = distinct_terms(&mut analyzer, query);
		if terms.is_empty() {
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.fields.text, t);
				let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		// Collect every match so that ties at the k boundary resolve by ordinal.
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.ids.len())).map_err(index_err)?;
		let ordinals = searcher
			.segment_readers()
			.iter()
			.map(|segment| segment.fast_fields().u64(ORDINAL_FIELD))
			.collect::<tantivy::Result<Vec<_>>>()
			.map_err(index_err)?;
		let mut scored = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let ordinal = ordinals
				.get(addr.segment_ord as usize)
				.and_then(|column| column.first(addr.doc_id))
				.ok_or_else(|| Error::Index("ordinal missing for hit".into()))?;
			scored.push((score, ordinal as usize));
		}
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
		scored.truncate(k);

		Ok(scored
			.into_iter()
			.filter_map(|(score, ordinal)| {
				self.ids.get(ordinal).map(|id| SearchHit { id: id.clone(), score, source: SourceKind::Lexical })
			})
			.collect())
	}
}
