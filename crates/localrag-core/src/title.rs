//! Title resolution as an ordered list of strategies.
//!
//! Each strategy answers `Ok(Some(title))`, `Ok(None)` when it has nothing to
//! offer, or a typed [`TitleError`]. The first `Some` wins; misses and errors
//! both fall through to the next strategy.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::types::{Document, SourceType};

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));
static YOUTUBE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*YouTube\s*$").expect("static regex"));
static VIDEO_ID_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]v=([0-9A-Za-z_-]{11})").expect("static regex"));
static VIDEO_ID_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([0-9A-Za-z_-]{11})(?:[?&#/]|$)").expect("static regex"));
static BARE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").expect("static regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TitleError {
    #[error("unterminated <title> tag")]
    UnterminatedTag,
    #[error("no video id in '{0}'")]
    MissingVideoId(String),
    #[error("cannot parse '{0}' as a URL")]
    BadUrl(String),
}

pub trait TitleStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, doc: &Document) -> Result<Option<String>, TitleError>;
}

/// Uses the loader-provided `title` metadata entry.
pub struct MetadataTitle;

impl TitleStrategy for MetadataTitle {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn resolve(&self, doc: &Document) -> Result<Option<String>, TitleError> {
        Ok(doc.metadata.get("title").map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }
}

/// Reads the `<title>` tag of a fetched page stored under the `html` metadata key.
pub struct HtmlTitleTag;

impl TitleStrategy for HtmlTitleTag {
    fn name(&self) -> &'static str {
        "html-title"
    }

    fn resolve(&self, doc: &Document) -> Result<Option<String>, TitleError> {
        let Some(html) = doc.metadata.get("html") else { return Ok(None) };
        match TITLE_TAG.captures(html) {
            Some(caps) => {
                let raw = caps.get(1).map_or("", |m| m.as_str()).trim();
                let title = YOUTUBE_SUFFIX.replace(raw, "").trim().to_string();
                Ok(Some(title).filter(|t| !t.is_empty()))
            }
            None if html.to_ascii_lowercase().contains("<title") => Err(TitleError::UnterminatedTag),
            None => Ok(None),
        }
    }
}

/// Last resort derived from the source reference itself.
pub struct SourceFallback;

impl TitleStrategy for SourceFallback {
    fn name(&self) -> &'static str {
        "source-fallback"
    }

    fn resolve(&self, doc: &Document) -> Result<Option<String>, TitleError> {
        match doc.source_type {
            SourceType::Youtube => youtube_video_id(&doc.source_uri)
                .map(|id| Some(format!("YouTube Video {id}")))
                .ok_or_else(|| TitleError::MissingVideoId(doc.source_uri.clone())),
            SourceType::Pdf => Ok(std::path::Path::new(&doc.source_uri)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())),
            SourceType::Url => {
                let url = url::Url::parse(&doc.source_uri).map_err(|_| TitleError::BadUrl(doc.source_uri.clone()))?;
                Ok(url.host_str().map(str::to_string))
            }
        }
    }
}

pub struct TitleResolver {
    strategies: Vec<Box<dyn TitleStrategy>>,
}

impl Default for TitleResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(MetadataTitle), Box::new(HtmlTitleTag), Box::new(SourceFallback)])
    }
}

impl TitleResolver {
    pub fn new(strategies: Vec<Box<dyn TitleStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn resolve(&self, doc: &Document) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.resolve(doc) {
                Ok(Some(title)) => return Some(title),
                Ok(None) => {}
                Err(e) => tracing::debug!(strategy = strategy.name(), doc = %doc.id, error = %e, "title strategy failed"),
            }
        }
        None
    }
}

/// Extract the 11-character video id from a watch/short/embed URL or a bare id.
pub fn youtube_video_id(uri: &str) -> Option<String> {
    let uri = uri.trim();
    if BARE_VIDEO_ID.is_match(uri) {
        return Some(uri.to_string());
    }
    VIDEO_ID_QUERY
        .captures(uri)
        .or_else(|| VIDEO_ID_PATH.captures(uri))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_ids() {
        assert_eq!(youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://example.com/page"), None);
    }

    #[test]
    fn metadata_title_wins() {
        let doc = Document::new(SourceType::Youtube, "dQw4w9WgXcQ", "text")
            .with_metadata("title", "Never Gonna")
            .with_metadata("html", "<title>Other - YouTube</title>");
        assert_eq!(TitleResolver::default().resolve(&doc).as_deref(), Some("Never Gonna"));
    }

    #[test]
    fn html_title_drops_youtube_suffix() {
        let doc = Document::new(SourceType::Youtube, "dQw4w9WgXcQ", "text")
            .with_metadata("html", "<html><head><title>Rust in 100 Seconds - YouTube</title></head></html>");
        assert_eq!(TitleResolver::default().resolve(&doc).as_deref(), Some("Rust in 100 Seconds"));
    }

    #[test]
    fn unterminated_tag_falls_through_to_source() {
        let doc = Document::new(SourceType::Youtube, "https://youtu.be/dQw4w9WgXcQ", "text")
            .with_metadata("html", "<title>broken");
        assert_eq!(HtmlTitleTag.resolve(&doc), Err(TitleError::UnterminatedTag));
        assert_eq!(TitleResolver::default().resolve(&doc).as_deref(), Some("YouTube Video dQw4w9WgXcQ"));
    }

    #[test]
    fn fallbacks_per_source_type() {
        let pdf = Document::new(SourceType::Pdf, "/tmp/papers/attention.pdf", "text");
        assert_eq!(TitleResolver::default().resolve(&pdf).as_deref(), Some("attention"));
        let url = Document::new(SourceType::Url, "https://docs.rs/tantivy/latest", "text");
        assert_eq!(TitleResolver::default().resolve(&url).as_deref(), Some("docs.rs"));
        let bad = Document::new(SourceType::Url, "not a url", "text");
        assert_eq!(TitleResolver::default().resolve(&bad), None);
    }
}
