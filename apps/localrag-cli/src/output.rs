use serde::Serialize;

use localrag_core::types::SourceType;
use localrag_hybrid::RankedChunk;

#[derive(Debug, Serialize)]
pub struct ResultRow<'a> {
    pub rank: usize,
    pub score: f32,
    pub lexical: Option<f32>,
    pub semantic: Option<f32>,
    pub id: &'a str,
    pub title: Option<&'a str>,
    pub source_type: SourceType,
    pub source_uri: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QueryReport<'a> {
    pub query: &'a str,
    pub results: Vec<ResultRow<'a>>,
}

impl<'a> QueryReport<'a> {
    pub fn new(query: &'a str, ranked: &'a [RankedChunk]) -> Self {
        let results = ranked
            .iter()
            .enumerate()
            .map(|(i, r)| ResultRow {
                rank: i + 1,
                score: r.score,
                lexical: r.lexical,
                semantic: r.semantic,
                id: &r.chunk.id,
                title: r.chunk.title.as_deref(),
                source_type: r.chunk.source_type,
                source_uri: &r.chunk.source_uri,
                text: &r.chunk.text,
            })
            .collect();
        Self { query, results }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_text(&self, preview_chars: usize) -> String {
        let mut out = format!("query: {}\n", self.query);
        if self.results.is_empty() {
            out.push_str("  (no results)\n");
            return out;
        }
        for row in &self.results {
            let title = row.title.unwrap_or("untitled");
            out.push_str(&format!("  {}. score={:.4}  {}  [{}] {}\n", row.rank, row.score, title, row.source_type, row.source_uri));
            out.push_str(&format!("     {}\n", preview(row.text, preview_chars)));
        }
        out
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
