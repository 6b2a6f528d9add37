//! Summaries of arbitrarily long text under a per-call size budget.
//!
//! Text within `single_pass_chars` is summarized in one call. Longer text is split with
//! [`chunk_text`](crate::chunk::chunk_text), every chunk is summarized on its own (up to
//! `concurrency` calls in flight), and one synthesis call merges the partial summaries in
//! chunk order. If either path fails, the text is cut to `fallback_chars` and summarized
//! once more; that call's failure is returned.

use crate::chunk::chunk_text;
use crate::text::{approx_tokens, truncate_chars};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use gistpipe_core::{Error, PartialSummary, Result, SummarizeConfig, Summarizer};
use serde::Serialize;
use std::sync::Arc;

/// What the text is; only changes prompt wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Article,
    Transcript,
}

impl SourceKind {
    fn noun(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Transcript => "transcript",
        }
    }
}

fn single_prompt(kind: SourceKind, style: &str, text: &str, truncated: bool) -> String {
    let label = match (kind, truncated) {
        (SourceKind::Article, false) => "Article",
        (SourceKind::Article, true) => "Article (truncated)",
        (SourceKind::Transcript, false) => "Transcript",
        (SourceKind::Transcript, true) => "Transcript (truncated)",
    };
    match kind {
        SourceKind::Article => format!(
            "Summarize the article below in the style: {style}.\n\
             - Keep it factual and concise.\n\
             - Include 5-8 bullets when applicable.\n\n\
             {label}:\n{text}\n"
        ),
        SourceKind::Transcript => format!(
            "Summarize this video transcript in the style: {style}.\n\
             - If 'Timestamps', group key moments with approximate timestamps every 1-3 minutes.\n\
             - If 'Bullet Points', return 7-10 bullets.\n\
             - If 'One-paragraph Recap', return 5-7 sentences.\n\n\
             {label}:\n{text}\n"
        ),
    }
}

fn chunk_prompt(kind: SourceKind, style: &str, text: &str) -> String {
    format!(
        "Summarize the following {noun} excerpt in the style: {style}.\n\
         - Be concise and factual.\n\
         - 5-8 bullets if applicable.\n\
         - Do NOT reference \"this chunk\" or \"this excerpt\"; write a standalone summary.\n\n\
         Chunk:\n{text}\n",
        noun = kind.noun()
    )
}

/// Partial summaries joined as `- s1\n\n- s2...`, in chunk order.
pub fn join_partials(partials: &[PartialSummary]) -> String {
    partials
        .iter()
        .map(|p| format!("- {}", p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn synthesis_prompt(kind: SourceKind, style: &str, partials: &[PartialSummary]) -> String {
    format!(
        "You are combining multiple partial summaries of one {noun} into a single {style} for an end user.\n\n\
         Instructions:\n\
         - Merge and deduplicate ideas.\n\
         - Keep it crisp and non-repetitive.\n\
         - Output 1-2 short paragraphs for \"Executive Summary\", or 7-10 bullets for bullet styles.\n\n\
         Partial summaries:\n{joined}\n\n\
         Now produce the final {style}:",
        noun = kind.noun(),
        joined = join_partials(partials)
    )
}

/// Which path produced a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum SummaryPath {
    SinglePass,
    Chunked { chunks: usize },
    /// The full path failed with `reason`; the summary covers only a prefix of the text.
    Truncated { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub text: String,
    #[serde(flatten)]
    pub path: SummaryPath,
}

pub struct ChunkedSummarizer {
    llm: Arc<dyn Summarizer>,
    cfg: SummarizeConfig,
    kind: SourceKind,
}

impl ChunkedSummarizer {
    pub fn new(llm: Arc<dyn Summarizer>, cfg: SummarizeConfig) -> Self {
        Self {
            llm,
            cfg,
            kind: SourceKind::Article,
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub async fn summarize(&self, text: &str, style: &str) -> Result<String> {
        Ok(self.summarize_report(text, style).await?.text)
    }

    pub async fn summarize_report(&self, text: &str, style: &str) -> Result<SummaryReport> {
        summarize_with(self.llm.as_ref(), &self.cfg, self.kind, text, style).await
    }
}

/// Summarize `text` (treated as an article) in `style`.
pub async fn summarize(
    text: &str,
    style: &str,
    llm: &dyn Summarizer,
    cfg: &SummarizeConfig,
) -> Result<String> {
    Ok(summarize_with(llm, cfg, SourceKind::Article, text, style)
        .await?
        .text)
}

async fn summarize_with(
    llm: &dyn Summarizer,
    cfg: &SummarizeConfig,
    kind: SourceKind,
    text: &str,
    style: &str,
) -> Result<SummaryReport> {
    if text.trim().is_empty() {
        return Err(Error::NotFound("no text to summarize".to_string()));
    }
    match full_summary(llm, cfg, kind, text, style).await {
        Ok(r) => Ok(r),
        Err(e) => {
            tracing::warn!(error = %e, fallback_chars = cfg.fallback_chars, "summarization failed; retrying on truncated text");
            let short = truncate_chars(text, cfg.fallback_chars);
            let out = llm
                .summarize(&single_prompt(kind, style, short, true))
                .await
                .map_err(|e2| match e2 {
                    Error::Llm(m) => Error::Llm(format!("truncated fallback: {m}")),
                    other => Error::Llm(format!("truncated fallback: {other}")),
                })?;
            Ok(SummaryReport {
                text: out,
                path: SummaryPath::Truncated {
                    reason: e.to_string(),
                },
            })
        }
    }
}

async fn full_summary(
    llm: &dyn Summarizer,
    cfg: &SummarizeConfig,
    kind: SourceKind,
    text: &str,
    style: &str,
) -> Result<SummaryReport> {
    let chars = text.chars().count();
    if chars <= cfg.single_pass_chars {
        tracing::info!(chars, approx_tokens = approx_tokens(text), "single-pass summary");
        let out = llm.summarize(&single_prompt(kind, style, text, false)).await?;
        return Ok(SummaryReport {
            text: out,
            path: SummaryPath::SinglePass,
        });
    }

    let chunks = chunk_text(text, cfg.chunk_chars, cfg.overlap_chars);
    tracing::info!(chars, chunks = chunks.len(), concurrency = cfg.concurrency, "chunked summary");

    // `buffered` yields in input order whatever order the calls finish in; the first error
    // drops the calls still in flight.
    let partials: Vec<PartialSummary> = stream::iter(chunks.iter().enumerate().map(|(i, c)| {
        let prompt = chunk_prompt(kind, style, &c.content);
        async move {
            let out = llm.summarize(&prompt).await?;
            tracing::debug!(chunk = i, chars = out.len(), "chunk summarized");
            // Trailing newlines would break the blank-line-separated bullet list.
            Ok::<_, Error>(PartialSummary {
                chunk_index: i,
                content: out.trim().to_string(),
            })
        }
    }))
    .buffered(cfg.concurrency.max(1))
    .try_collect()
    .await?;

    let out = llm
        .summarize(&synthesis_prompt(kind, style, &partials))
        .await?;
    Ok(SummaryReport {
        text: out,
        path: SummaryPath::Chunked {
            chunks: partials.len(),
        },
    })
}
