//! Value types passed between extraction and summarization stages.
//!
//! Everything here is built and consumed within one call; nothing is shared across calls.

use serde::{Deserialize, Serialize};

/// One attempted strategy. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub strategy: String,
    pub succeeded: bool,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    /// Provenance tag for a successful attempt (which track, which path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Output of the first attempt that met the word threshold, or empty.
    pub text: String,
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The attempt whose output became `text`.
    pub fn accepted(&self) -> Option<&ExtractionAttempt> {
        if self.text.is_empty() {
            return None;
        }
        // The chain stops at the accepted attempt, so it is always the last one.
        self.attempts.last().filter(|a| a.succeeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    Vtt,
    Srv3,
    Ttml,
    Json3,
    M3u8,
    Unknown,
}

impl CaptionFormat {
    pub fn from_ext(ext: &str) -> Self {
        match ext.trim().to_ascii_lowercase().as_str() {
            "vtt" => Self::Vtt,
            "srv3" => Self::Srv3,
            "ttml" => Self::Ttml,
            "json3" => Self::Json3,
            "m3u8" => Self::M3u8,
            _ => Self::Unknown,
        }
    }

    /// Lower is preferred.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Vtt => 0,
            Self::Srv3 => 1,
            Self::Ttml => 2,
            Self::Json3 => 3,
            Self::M3u8 | Self::Unknown => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vtt => "vtt",
            Self::Srv3 => "srv3",
            Self::Ttml => "ttml",
            Self::Json3 => "json3",
            Self::M3u8 => "m3u8",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub format: CaptionFormat,
    pub source_url: String,
    pub is_auto_generated: bool,
}

/// Human-authored and automatic tracks of one video, as reported by a metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTracks {
    pub subtitles: Vec<CaptionTrack>,
    pub automatic: Vec<CaptionTrack>,
}

/// A transcript offered by the primary caption listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptListing {
    pub language_code: String,
    pub language: String,
    pub is_generated: bool,
    pub source_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    /// Which path produced `text`, or why nothing was found. Never empty.
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    pub attempts: Vec<ExtractionAttempt>,
}

/// A contiguous window of the source text. Offsets count chars, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub start_offset: usize,
    pub end_offset: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSummary {
    pub chunk_index: usize,
    pub content: String,
}
