//! localrag-text
//!
//! BM25 lexical index over chunk text, held in RAM by tantivy. See `index`
//! for build/score and `tantivy_utils` for the schema and analyzer.
pub mod index;
pub mod tantivy_utils;

pub use index::LexicalIndex;
pub use tantivy::tokenizer::TextAnalyzer;
pub use tantivy_utils::build_analyzer;
