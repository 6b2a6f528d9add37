//! Article text from a URL, via an ordered fallback chain.
//!
//! Strategies, first to reach `min_words` wins:
//! 1. `readable_fetch`: default fetch + boilerplate-removal extraction.
//! 2. `raw_fetch`: GET with a browser User-Agent + the same extraction.
//! 3. `readability`: the `readability` crate over the raw HTML (reused from step 2 when present).
//! 4. `amp`: `<url>/amp` + extraction.

use crate::extract;
use gistpipe_core::{
    ArticleConfig, Candidate, Error, ExtractionResult, FallbackChain, FetchBackend, FetchRequest,
    FetchResponse, Strategy, StrategyFailure,
};
use std::sync::Arc;

/// Per-call state shared by the strategies.
pub struct ArticleCtx {
    pub url: String,
    /// HTML fetched by `raw_fetch`, for `readability` to reuse.
    raw_html: Option<String>,
}

impl ArticleCtx {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            raw_html: None,
        }
    }
}

#[derive(Clone)]
struct Shared {
    fetcher: Arc<dyn FetchBackend>,
    cfg: ArticleConfig,
}

impl Shared {
    fn plain_request(&self, url: &str) -> FetchRequest {
        FetchRequest::get(url)
            .with_timeout_ms(self.cfg.timeout_ms)
            .with_max_bytes(self.cfg.max_bytes)
    }

    fn browser_request(&self, url: &str) -> FetchRequest {
        self.plain_request(url)
            .with_header("User-Agent", &self.cfg.user_agent)
            .with_header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .with_header("Accept-Language", "en-US,en;q=0.9")
    }

    /// Fetch and require a 2xx, keeping status/bytes on the failure for the trail.
    async fn fetch_ok(&self, req: &FetchRequest) -> Result<FetchResponse, StrategyFailure> {
        let resp = self.fetcher.fetch(req).await?;
        if !resp.is_success() {
            return Err(StrategyFailure::new(format!("HTTP {}", resp.status))
                .with_status(resp.status)
                .with_bytes(resp.bytes.len()));
        }
        Ok(resp)
    }
}

fn extracted(resp: &FetchResponse, html: &str) -> Result<Candidate, StrategyFailure> {
    match extract::extract_main_text(html) {
        Some(text) => Ok(Candidate::new(text)
            .with_status(resp.status)
            .with_bytes(resp.bytes.len())),
        None => Err(StrategyFailure::new("no main content found")
            .with_status(resp.status)
            .with_bytes(resp.bytes.len())),
    }
}

struct ReadableFetch(Shared);

#[async_trait::async_trait]
impl Strategy<ArticleCtx> for ReadableFetch {
    fn name(&self) -> &'static str {
        "readable_fetch"
    }

    async fn attempt(&self, ctx: &mut ArticleCtx) -> Result<Candidate, StrategyFailure> {
        let resp = self.0.fetch_ok(&self.0.plain_request(&ctx.url)).await?;
        extracted(&resp, &resp.text_lossy())
    }
}

struct RawFetch(Shared);

#[async_trait::async_trait]
impl Strategy<ArticleCtx> for RawFetch {
    fn name(&self) -> &'static str {
        "raw_fetch"
    }

    async fn attempt(&self, ctx: &mut ArticleCtx) -> Result<Candidate, StrategyFailure> {
        let resp = self.0.fetch_ok(&self.0.browser_request(&ctx.url)).await?;
        let html = resp.text_lossy();
        let out = extracted(&resp, &html);
        ctx.raw_html = Some(html);
        out
    }
}

struct Readability(Shared);

#[async_trait::async_trait]
impl Strategy<ArticleCtx> for Readability {
    fn name(&self) -> &'static str {
        "readability"
    }

    async fn attempt(&self, ctx: &mut ArticleCtx) -> Result<Candidate, StrategyFailure> {
        let (html, status, bytes) = match ctx.raw_html.take() {
            Some(html) => {
                let n = html.len();
                (html, None, n)
            }
            None => {
                let resp = self.0.fetch_ok(&self.0.browser_request(&ctx.url)).await?;
                (resp.text_lossy(), Some(resp.status), resp.bytes.len())
            }
        };
        let doc = url::Url::parse(&ctx.url)
            .ok()
            .and_then(|u| extract::readable_document(&html, &u));
        ctx.raw_html = Some(html);

        let fail = |msg: &str| {
            let f = StrategyFailure::new(msg).with_bytes(bytes);
            match status {
                Some(s) => f.with_status(s),
                None => f,
            }
        };
        let doc = doc.ok_or_else(|| fail("no readable content"))?;
        let text = with_title(doc.title.as_deref(), &doc.text, self.0.cfg.title_window_chars);
        if text.trim().is_empty() {
            return Err(fail("no readable content"));
        }

        let mut c = Candidate::new(text).with_bytes(bytes);
        if let Some(s) = status {
            c = c.with_status(s);
        }
        if status.is_none() {
            c = c.with_detail("reused raw html");
        }
        Ok(c)
    }
}

/// Prepend `title` unless it already appears within the first `window` chars of `body`.
pub fn with_title(title: Option<&str>, body: &str, window: usize) -> String {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return body.to_string();
    };
    let head = crate::text::truncate_chars(body, window);
    if head.contains(title) {
        body.to_string()
    } else if body.trim().is_empty() {
        title.to_string()
    } else {
        format!("{title}\n\n{body}")
    }
}

/// `https://a/b/` → `https://a/b/amp`.
pub fn amp_url(url: &str) -> String {
    format!("{}/amp", url.trim().trim_end_matches('/'))
}

struct Amp(Shared);

#[async_trait::async_trait]
impl Strategy<ArticleCtx> for Amp {
    fn name(&self) -> &'static str {
        "amp"
    }

    async fn attempt(&self, ctx: &mut ArticleCtx) -> Result<Candidate, StrategyFailure> {
        let amp = amp_url(&ctx.url);
        let resp = self
            .0
            .fetch_ok(&self.0.browser_request(&amp))
            .await
            .map_err(|f| f.with_extra_url(amp.clone()))?;
        extracted(&resp, &resp.text_lossy())
            .map(|c| c.with_extra_url(amp.clone()))
            .map_err(|f| f.with_extra_url(amp))
    }
}

/// Runs the four-strategy article chain.
pub struct ArticleExtractor {
    chain: FallbackChain<ArticleCtx>,
}

impl ArticleExtractor {
    pub fn new(fetcher: Arc<dyn FetchBackend>, cfg: ArticleConfig) -> Self {
        let shared = Shared {
            fetcher,
            cfg: cfg.clone(),
        };
        let chain = FallbackChain::new(cfg.min_words)
            .with(ReadableFetch(shared.clone()))
            .with(RawFetch(shared.clone()))
            .with(Readability(shared.clone()))
            .with(Amp(shared));
        Self { chain }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Never fails: every problem is an attempt in the returned trail.
    pub async fn extract(&self, url: &str) -> ExtractionResult {
        let mut ctx = ArticleCtx::new(url);
        if let Err(e) = validate_url(&ctx.url) {
            tracing::info!(url = %ctx.url, error = %e, "article url rejected");
            return ExtractionResult {
                text: String::new(),
                attempts: vec![gistpipe_core::ExtractionAttempt {
                    strategy: "validate_url".to_string(),
                    succeeded: false,
                    word_count: 0,
                    error: Some(e.to_string()),
                    extra_url: None,
                    status: None,
                    bytes: None,
                    detail: None,
                }],
            };
        }
        self.chain.run(&mut ctx).await
    }
}

fn validate_url(url: &str) -> gistpipe_core::Result<()> {
    let u = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
    match u.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!("unsupported scheme {other:?}"))),
    }
}
