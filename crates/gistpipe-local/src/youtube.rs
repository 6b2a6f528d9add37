//! YouTube caption listing.
//!
//! - [`video_id`]: URL → 11-char video id.
//! - [`WatchPageCatalog`]: primary listing, read from the `captionTracks` array embedded in
//!   the watch page; each track is fetched as timed-text XML.
//! - [`YtDlpCaptionSource`]: fallback metadata via `yt-dlp -J` (it already implements
//!   YouTube's moving-target extraction logic).

use crate::captions;
use gistpipe_core::{
    CaptionFormat, CaptionTrack, CaptionTrackSource, CaptionTracks, Error, FetchBackend,
    FetchRequest, Result, TranscriptCatalog, TranscriptListing,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

lazy_static::lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(r"^[0-9A-Za-z_-]{11}$").unwrap();
}

pub fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com"
        || h == "youtu.be"
        || h == "youtube-nocookie.com"
        || h.ends_with(".youtube.com")
        || h.ends_with(".youtube-nocookie.com")
}

fn valid_id(s: &str) -> Option<String> {
    let s = s.trim();
    VIDEO_ID_RE.is_match(s).then(|| s.to_string())
}

/// Video id of a YouTube URL, or of a bare 11-char id.
pub fn video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(id) = valid_id(input) {
        return Some(id);
    }
    let u = url::Url::parse(input).ok()?;
    let host = u.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    // youtu.be/<id>
    if host.eq_ignore_ascii_case("youtu.be") {
        return valid_id(u.path_segments()?.next()?);
    }

    // youtube.com/watch?v=<id>
    if u.path().starts_with("/watch") {
        return u
            .query_pairs()
            .find(|(k, _)| k == "v")
            .and_then(|(_, v)| valid_id(&v));
    }

    // youtube.com/{shorts,embed,live,v}/<id>
    let mut segs = u.path_segments()?;
    let a = segs.next().unwrap_or("");
    let b = segs.next().unwrap_or("");
    if matches!(a, "shorts" | "embed" | "live" | "v") {
        return valid_id(b);
    }
    None
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<RawName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawName {
    #[serde(default)]
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    #[serde(default)]
    text: String,
}

impl RawName {
    fn text(&self) -> Option<String> {
        self.simple_text.clone().or_else(|| {
            let s: String = self.runs.iter().map(|r| r.text.as_str()).collect();
            (!s.is_empty()).then_some(s)
        })
    }
}

/// The `captionTracks` listing embedded in a watch page, in page order.
pub fn parse_caption_tracks(watch_html: &str) -> Result<Vec<TranscriptListing>> {
    const KEY: &str = "\"captionTracks\":";
    let Some(pos) = watch_html.find(KEY) else {
        if watch_html.contains("class=\"g-recaptcha\"") {
            return Err(Error::Fetch("watch page is behind a captcha".to_string()));
        }
        return Err(Error::NotFound("no captionTracks in watch page".to_string()));
    };
    let rest = &watch_html[pos + KEY.len()..];
    // Parse just the array value; the rest of the page is not JSON.
    let raw: Vec<RawCaptionTrack> = serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<RawCaptionTrack>>()
        .next()
        .ok_or_else(|| Error::Parse("empty captionTracks".to_string()))?
        .map_err(|e| Error::Parse(format!("captionTracks: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|t| TranscriptListing {
            language: t
                .name
                .as_ref()
                .and_then(RawName::text)
                .unwrap_or_else(|| t.language_code.clone()),
            is_generated: t.kind.as_deref() == Some("asr"),
            language_code: t.language_code,
            source_url: t.base_url.replace("\\u0026", "&"),
        })
        .collect())
}

/// Drop any `fmt=` parameter so the endpoint serves classic `<transcript><text>` XML.
fn timedtext_url(base_url: &str) -> String {
    let Ok(mut u) = url::Url::parse(base_url) else {
        return base_url.to_string();
    };
    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    u.query_pairs_mut().clear().extend_pairs(kept);
    u.to_string()
}

/// Primary caption listing backed by the watch page.
pub struct WatchPageCatalog {
    fetcher: Arc<dyn FetchBackend>,
    user_agent: String,
    timeout_ms: u64,
    watch_base: String,
}

impl WatchPageCatalog {
    pub fn new(fetcher: Arc<dyn FetchBackend>, user_agent: &str, timeout_ms: u64) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.to_string(),
            timeout_ms,
            watch_base: "https://www.youtube.com".to_string(),
        }
    }

    /// Point watch-page requests at another origin (local fixtures).
    pub fn with_watch_base(mut self, base: &str) -> Self {
        self.watch_base = base.trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let req = FetchRequest::get(url)
            .with_timeout_ms(self.timeout_ms)
            .with_header("User-Agent", &self.user_agent)
            .with_header("Accept-Language", "en-US,en;q=0.9");
        let resp = self.fetcher.fetch(&req).await?;
        if !resp.is_success() {
            return Err(Error::Fetch(format!("HTTP {} for {url}", resp.status)));
        }
        Ok(resp.text_lossy())
    }
}

#[async_trait::async_trait]
impl TranscriptCatalog for WatchPageCatalog {
    async fn list(&self, video_id: &str) -> Result<Vec<TranscriptListing>> {
        let html = self
            .get_text(&format!("{}/watch?v={video_id}", self.watch_base))
            .await?;
        let mut listings = parse_caption_tracks(&html)?;
        for l in &mut listings {
            if l.source_url.starts_with('/') {
                l.source_url = format!("{}{}", self.watch_base, l.source_url);
            }
        }
        Ok(listings)
    }

    async fn fetch(&self, listing: &TranscriptListing) -> Result<String> {
        let body = self.get_text(&timedtext_url(&listing.source_url)).await?;
        let text = captions::parse_srv3(&body);
        if text.is_empty() {
            return Err(Error::Parse(format!(
                "empty or malformed transcript ({})",
                listing.language_code
            )));
        }
        Ok(text)
    }
}

#[derive(Debug, Default, Deserialize)]
struct InfoJson {
    #[serde(default)]
    subtitles: Option<BTreeMap<String, Vec<RawSub>>>,
    #[serde(default)]
    automatic_captions: Option<BTreeMap<String, Vec<RawSub>>>,
}

#[derive(Debug, Deserialize)]
struct RawSub {
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

fn typed_tracks(raw: Option<BTreeMap<String, Vec<RawSub>>>, auto: bool) -> Vec<CaptionTrack> {
    let mut out = Vec::new();
    for (lang, subs) in raw.unwrap_or_default() {
        for s in subs {
            let Some(url) = s.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            out.push(CaptionTrack {
                language_code: lang.clone(),
                format: CaptionFormat::from_ext(s.ext.as_deref().unwrap_or("")),
                source_url: url,
                is_auto_generated: auto,
            });
        }
    }
    out
}

/// Map yt-dlp `-J` output into typed tracks.
pub fn parse_ytdlp_info(json: &str) -> Result<CaptionTracks> {
    let info: InfoJson =
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("yt-dlp json: {e}")))?;
    Ok(CaptionTracks {
        subtitles: typed_tracks(info.subtitles, false),
        automatic: typed_tracks(info.automatic_captions, true),
    })
}

/// Fallback caption metadata via a local `yt-dlp` binary.
pub struct YtDlpCaptionSource {
    bin: String,
    timeout: Duration,
}

impl YtDlpCaptionSource {
    pub fn new(bin: &str, timeout_ms: u64) -> Self {
        Self {
            bin: bin.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait::async_trait]
impl CaptionTrackSource for YtDlpCaptionSource {
    async fn caption_tracks(&self, video_url: &str) -> Result<CaptionTracks> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.arg("-J")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(video_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotConfigured(format!("{} not found on PATH", self.bin))
            } else {
                Error::Tool(format!("{} spawn failed: {e}", self.bin))
            }
        })?;
        let out = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Tool(format!("{} timed out", self.bin)))?
            .map_err(|e| Error::Tool(format!("{} wait failed: {e}", self.bin)))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let first = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(Error::Tool(format!(
                "{} exited with {}: {first}",
                self.bin, out.status
            )));
        }
        parse_ytdlp_info(&String::from_utf8_lossy(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use crate::LocalFetcher;
    use axum::{extract::Query, routing::get, Router};

    #[test]
    fn video_id_variants() {
        for u in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ] {
            assert_eq!(video_id(u).as_deref(), Some("dQw4w9WgXcQ"), "{u}");
        }
    }

    #[test]
    fn video_id_rejects_non_video_urls() {
        for u in [
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/channel/UC123",
            "https://www.youtube.com/",
            "not a url",
            "",
        ] {
            assert_eq!(video_id(u), None, "{u}");
        }
    }

    #[test]
    fn parses_caption_tracks_from_watch_html() {
        let html = r#"<html><script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=es","name":{"simpleText":"Spanish"},"languageCode":"es","isTranslatable":true},{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=en&kind=asr","name":{"runs":[{"text":"English (auto-generated)"}]},"languageCode":"en","kind":"asr"}],"audioTracks":[]}}};</script></html>"#;
        let tracks = parse_caption_tracks(html).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "es");
        assert_eq!(tracks[0].language, "Spanish");
        assert!(!tracks[0].is_generated);
        assert_eq!(tracks[1].language, "English (auto-generated)");
        assert!(tracks[1].is_generated);
        assert!(tracks[1].source_url.contains("&lang=en"));
    }

    #[test]
    fn watch_html_without_captions_is_not_found() {
        let err = parse_caption_tracks("<html>nothing</html>").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn timedtext_url_drops_fmt() {
        assert_eq!(
            timedtext_url("https://www.youtube.com/api/timedtext?v=x&fmt=srv3&lang=en"),
            "https://www.youtube.com/api/timedtext?v=x&lang=en"
        );
    }

    #[test]
    fn parses_ytdlp_info_json() {
        let json = r#"{
          "id": "x",
          "subtitles": {"en": [{"ext": "json3", "url": "https://s/1"}, {"ext": "vtt", "url": "https://s/2"}, {"ext": "srv3"}]},
          "automatic_captions": {"en": [{"ext": "srv3", "url": "https://a/1"}], "de": [{"ext": "", "url": "https://a/2"}]}
        }"#;
        let t = parse_ytdlp_info(json).unwrap();
        assert_eq!(t.subtitles.len(), 2);
        assert_eq!(t.subtitles[0].format, CaptionFormat::Json3);
        assert_eq!(t.subtitles[1].format, CaptionFormat::Vtt);
        assert!(t.subtitles.iter().all(|c| !c.is_auto_generated));
        assert_eq!(t.automatic.len(), 2);
        assert!(t.automatic.iter().all(|c| c.is_auto_generated));
        assert!(t
            .automatic
            .iter()
            .any(|c| c.language_code == "de" && c.format == CaptionFormat::Unknown));

        let none = parse_ytdlp_info(r#"{"subtitles": null}"#).unwrap();
        assert!(none.subtitles.is_empty() && none.automatic.is_empty());
    }

    #[tokio::test]
    async fn ytdlp_missing_binary_is_not_configured() {
        let src = YtDlpCaptionSource::new("gistpipe-definitely-not-a-real-binary", 1_000);
        let err = src
            .caption_tracks("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn watch_page_catalog_lists_and_fetches() {
        let app = Router::new()
            .route(
                "/watch",
                get(|| async {
                    r#"<script>{"captionTracks":[{"baseUrl":"/api/timedtext?lang=en&fmt=srv3","languageCode":"en","name":{"simpleText":"English"}}]}</script>"#
                }),
            )
            .route(
                "/api/timedtext",
                get(|q: Query<BTreeMap<String, String>>| async move {
                    if q.contains_key("fmt") {
                        return "<timedtext format=\"3\"><body><p>wrong format</p></body></timedtext>".to_string();
                    }
                    "<transcript><text start=\"0\">Hello</text><text start=\"1\">from the page</text></transcript>".to_string()
                }),
            );
        let addr = serve(app).await;
        let base = format!("http://{addr}");
        let fetcher: Arc<dyn FetchBackend> = Arc::new(LocalFetcher::with_default_user_agent().unwrap());
        let catalog = WatchPageCatalog::new(fetcher, "test-agent", 2_000).with_watch_base(&base);

        let listings = catalog.list("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(listings.len(), 1);
        assert!(listings[0].source_url.starts_with(&base));
        let text = catalog.fetch(&listings[0]).await.unwrap();
        assert_eq!(text, "Hello from the page");
    }
}
