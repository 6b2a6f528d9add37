use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod chain;
pub mod config;
pub mod diagnostics;
pub mod model;

pub use chain::{Candidate, FallbackChain, Strategy, StrategyFailure};
pub use config::{ArticleConfig, PipelineConfig, SummarizeConfig, TranscriptConfig};
pub use diagnostics::{failure_messages, render_trail, Diagnostics};
pub use model::{
    CaptionFormat, CaptionTrack, CaptionTracks, Chunk, ExtractionAttempt, ExtractionResult,
    PartialSummary, TranscriptListing, TranscriptResult,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("tool failed: {0}")]
    Tool(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole request (connect + body).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Extra request headers. A `User-Agent` here overrides the backend default.
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub elapsed_ms: u128,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// Primary caption listing: manually-created and auto-generated transcripts of one video.
#[async_trait::async_trait]
pub trait TranscriptCatalog: Send + Sync {
    async fn list(&self, video_id: &str) -> Result<Vec<TranscriptListing>>;
    /// Fetch one listed transcript as flat text.
    async fn fetch(&self, listing: &TranscriptListing) -> Result<String>;
}

/// Fallback caption metadata: raw subtitle and automatic-caption tracks of one video.
#[async_trait::async_trait]
pub trait CaptionTrackSource: Send + Sync {
    async fn caption_tracks(&self, video_url: &str) -> Result<CaptionTracks>;
}

/// The injected `prompt -> text` capability. Opaque to the pipeline.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String>;
}

/// Whitespace-separated word count, the unit of the extraction acceptance threshold.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_request_builder_sets_knobs() {
        let req = FetchRequest::get("https://example.com/")
            .with_timeout_ms(20_000)
            .with_max_bytes(10)
            .with_header("User-Agent", "ua");
        assert_eq!(req.timeout(), Some(Duration::from_secs(20)));
        assert_eq!(req.max_bytes, Some(10));
        assert_eq!(req.headers.get("User-Agent").map(String::as_str), Some("ua"));
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one\ttwo\n\nthree "), 3);
    }
}
