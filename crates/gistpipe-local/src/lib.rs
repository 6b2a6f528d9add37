use gistpipe_core::{
    ArticleConfig, Error, FetchBackend, FetchRequest, FetchResponse, PipelineConfig, Result,
    SummarizeConfig, TranscriptConfig,
};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod article;
pub mod captions;
pub mod chunk;
pub mod extract;
pub mod openai_compat;
pub mod summarize;
pub mod text;
pub mod transcript;
pub mod youtube;

pub use article::ArticleExtractor;
pub use chunk::chunk_text;
pub use openai_compat::OpenAiCompatClient;
pub use summarize::{summarize, ChunkedSummarizer, SourceKind, SummaryPath, SummaryReport};
pub use text::{clean_summary_text, preview};
pub use transcript::TranscriptExtractor;
pub use youtube::{WatchPageCatalog, YtDlpCaptionSource};

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    allow_sensitive_headers: bool,
}

impl LocalFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Avoid “hang forever” on DNS/TLS/body stalls; per-request timeouts still apply.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            allow_sensitive_headers: false,
        })
    }

    pub fn with_default_user_agent() -> Result<Self> {
        Self::new(concat!("gistpipe-local/", env!("CARGO_PKG_VERSION")))
    }

    /// Forward Authorization/Cookie headers. Off by default: request secrets must not leak
    /// to arbitrary article hosts.
    pub fn allow_sensitive_headers(mut self, allow: bool) -> Self {
        self.allow_sensitive_headers = allow;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn is_sensitive_request_header(name: &reqwest::header::HeaderName) -> bool {
        // HeaderName::as_str() is canonical lower-case.
        matches!(
            name.as_str(),
            "authorization" | "cookie" | "proxy-authorization"
        )
    }

    fn apply_headers(
        &self,
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                if !self.allow_sensitive_headers && Self::is_sensitive_request_header(&name) {
                    continue;
                }
                rb = rb.header(name, value);
            }
        }
        rb
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let t0 = std::time::Instant::now();
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = self.apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(
            url = %req.url,
            status,
            bytes = bytes.len(),
            truncated,
            "fetched"
        );
        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            truncated,
            elapsed_ms: t0.elapsed().as_millis(),
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env(key).and_then(|s| s.parse::<T>().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let v: Vec<String> = env(key)?
        .split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect();
    (!v.is_empty()).then_some(v)
}

/// Build a [`PipelineConfig`] from `GISTPIPE_*` env vars, falling back to the defaults.
///
/// Only binaries should call this; library entry points take the config explicitly.
pub fn pipeline_config_from_env() -> PipelineConfig {
    let a = ArticleConfig::default();
    let t = TranscriptConfig::default();
    let s = SummarizeConfig::default();
    PipelineConfig {
        article: ArticleConfig {
            min_words: env_parse("GISTPIPE_MIN_WORDS", a.min_words),
            timeout_ms: env_parse("GISTPIPE_TIMEOUT_MS", a.timeout_ms).clamp(100, 300_000),
            user_agent: env("GISTPIPE_USER_AGENT").unwrap_or(a.user_agent),
            max_bytes: env_parse("GISTPIPE_MAX_BYTES", a.max_bytes),
            title_window_chars: a.title_window_chars,
        },
        transcript: TranscriptConfig {
            languages: env_list("GISTPIPE_LANGS").unwrap_or(t.languages),
            timeout_ms: env_parse("GISTPIPE_TIMEOUT_MS", t.timeout_ms).clamp(100, 300_000),
            ytdlp_bin: env("GISTPIPE_YTDLP_BIN").unwrap_or(t.ytdlp_bin),
            ytdlp_timeout_ms: env_parse("GISTPIPE_YTDLP_TIMEOUT_MS", t.ytdlp_timeout_ms),
        },
        summarize: SummarizeConfig {
            single_pass_chars: env_parse("GISTPIPE_SINGLE_PASS_CHARS", s.single_pass_chars),
            chunk_chars: env_parse("GISTPIPE_CHUNK_CHARS", s.chunk_chars),
            overlap_chars: env_parse("GISTPIPE_OVERLAP_CHARS", s.overlap_chars),
            fallback_chars: env_parse("GISTPIPE_FALLBACK_CHARS", s.fallback_chars),
            concurrency: env_parse("GISTPIPE_CONCURRENCY", s.concurrency).clamp(1, 32),
        },
    }
}
