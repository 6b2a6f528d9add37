//! Pipeline knobs. Passed explicitly into every entry point; nothing here reads the environment.
//!
//! The defaults are empirically tuned for one provider's context limits and are not
//! expected to carry over to other providers unchanged.

use serde::{Deserialize, Serialize};

/// Desktop Chrome UA used for raw fetches; some sites refuse non-browser agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub article: ArticleConfig,
    pub transcript: TranscriptConfig,
    pub summarize: SummarizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleConfig {
    /// Minimum words for a strategy's output to be accepted.
    pub min_words: usize,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_bytes: u64,
    /// The readability title is prepended unless it already appears within this many chars.
    pub title_window_chars: usize,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            min_words: 80,
            timeout_ms: 20_000,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_bytes: 8 * 1024 * 1024,
            title_window_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Language priority, most preferred first.
    pub languages: Vec<String>,
    pub timeout_ms: u64,
    pub ytdlp_bin: String,
    pub ytdlp_timeout_ms: u64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
            timeout_ms: 20_000,
            ytdlp_bin: "yt-dlp".to_string(),
            ytdlp_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Texts up to this many chars are summarized in one call.
    pub single_pass_chars: usize,
    /// Per-chunk budget; smaller than `single_pass_chars` since chunk prompts carry more instructions.
    pub chunk_chars: usize,
    pub overlap_chars: usize,
    /// Truncation budget for the last-resort call.
    pub fallback_chars: usize,
    /// Max in-flight chunk summarizations.
    pub concurrency: usize,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            single_pass_chars: 12_000,
            chunk_chars: 9_000,
            overlap_chars: 600,
            fallback_chars: 8_000,
            concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"article":{"min_words":10},"summarize":{"concurrency":1}}"#)
                .unwrap();
        assert_eq!(cfg.article.min_words, 10);
        assert_eq!(cfg.article.timeout_ms, 20_000);
        assert_eq!(cfg.summarize.concurrency, 1);
        assert_eq!(cfg.summarize.single_pass_chars, 12_000);
        assert_eq!(cfg.transcript.languages, vec!["en", "en-US", "en-GB"]);
    }
}
