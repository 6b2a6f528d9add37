//! Ordered fallback chain: try strategies in sequence until one yields enough text.
//!
//! Each strategy is tried in isolation and reports either a [`Candidate`] or a
//! [`StrategyFailure`]; the driver records one attempt per strategy and stops at the first
//! candidate meeting the word threshold.

use crate::diagnostics::Diagnostics;
use crate::model::{ExtractionAttempt, ExtractionResult};
use crate::{word_count, Error};

#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub text: String,
    pub status: Option<u16>,
    pub bytes: Option<usize>,
    pub extra_url: Option<String>,
    pub detail: Option<String>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn with_extra_url(mut self, url: impl Into<String>) -> Self {
        self.extra_url = Some(url.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrategyFailure {
    pub message: String,
    pub status: Option<u16>,
    pub bytes: Option<usize>,
    pub extra_url: Option<String>,
}

impl StrategyFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn with_extra_url(mut self, url: impl Into<String>) -> Self {
        self.extra_url = Some(url.into());
        self
    }
}

impl From<Error> for StrategyFailure {
    fn from(e: Error) -> Self {
        Self::new(e.to_string())
    }
}

#[async_trait::async_trait]
pub trait Strategy<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, ctx: &mut C) -> Result<Candidate, StrategyFailure>;
}

pub struct FallbackChain<C: Send> {
    strategies: Vec<Box<dyn Strategy<C>>>,
    min_words: usize,
}

impl<C: Send + 'static> FallbackChain<C> {
    pub fn new(min_words: usize) -> Self {
        Self {
            strategies: Vec::new(),
            min_words,
        }
    }

    pub fn with(mut self, strategy: impl Strategy<C> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs strategies in order. Never fails: exhaustion yields empty text plus the trail.
    pub async fn run(&self, ctx: &mut C) -> ExtractionResult {
        let mut diag = Diagnostics::new();
        for strategy in &self.strategies {
            let name = strategy.name();
            match strategy.attempt(ctx).await {
                Ok(c) => {
                    let words = word_count(&c.text);
                    let accepted = words >= self.min_words.max(1);
                    diag.record(ExtractionAttempt {
                        strategy: name.to_string(),
                        succeeded: accepted,
                        word_count: words,
                        error: (!accepted)
                            .then(|| format!("{name}: {words} words (< {})", self.min_words)),
                        extra_url: c.extra_url,
                        status: c.status,
                        bytes: c.bytes,
                        detail: c.detail,
                    });
                    if accepted {
                        tracing::info!(strategy = name, words, "fallback chain accepted");
                        return ExtractionResult {
                            text: c.text,
                            attempts: diag.into_attempts(),
                        };
                    }
                }
                Err(f) => diag.record(ExtractionAttempt {
                    strategy: name.to_string(),
                    succeeded: false,
                    word_count: 0,
                    error: Some(f.message),
                    extra_url: f.extra_url,
                    status: f.status,
                    bytes: f.bytes,
                    detail: None,
                }),
            }
        }
        tracing::info!(attempts = diag.len(), "fallback chain exhausted");
        ExtractionResult {
            text: String::new(),
            attempts: diag.into_attempts(),
        }
    }
}
