use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "localrag_text";
pub const ORDINAL_FIELD: &str = "ordinal";

pub struct LexicalFields {
	pub ordinal: Field,
	pub text: Field,
}

/// Nothing is stored: the ordinal is a fast field that maps a hit back to the corpus.
pub fn build_schema() -> (Schema, LexicalFields) {
	let mut schema_builder = Schema::builder();
	let ordinal = schema_builder.add_u64_field(ORDINAL_FIELD, FAST);
	let text_field_indexing = TextFieldIndexing::default()
		.set_tokenizer(TOKENIZER_NAME)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text = schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
	(schema_builder.build(), LexicalFields { ordinal, text })
}

/// Word-level, locale-agnostic analyzer: split on non-alphanumerics, lowercase,
/// drop tokens over 40 bytes and the configured stop words.
pub fn build_analyzer(stop_words: &[String]) -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.iter().cloned()))
		.build()
}

pub fn register_tokenizer(index: &Index, analyzer: TextAnalyzer) {
	index.tokenizers().register(TOKENIZER_NAME, analyzer);
}

/// Run `text` through `analyzer`, returning each distinct term once in first-seen order.
pub fn distinct_terms(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut terms: Vec<String> = Vec::new();
	let mut stream = analyzer.token_stream(text);
	while stream.advance() {
		let term = &stream.token().text;
		if !terms.iter().any(|t| t == term) {
			terms.push(term.clone());
		}
	}
	terms
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_drops_stop_words() {
		let mut analyzer = build_analyzer(&["the".to_string(), "of".to_string()]);
		assert_eq!(distinct_terms(&mut analyzer, "The Rust Book of the Rust"), vec!["rust", "book"]);
	}

	#[test]
	fn splits_on_punctuation() {
		let mut analyzer = build_analyzer(&[]);
		assert_eq!(distinct_terms(&mut analyzer, "hybrid-retrieval, BM25!"), vec!["hybrid", "retrieval", "bm25"]);
	}
}
