//! Video transcript acquisition.
//!
//! Two strategies over one [`FallbackChain`]:
//! - `caption_catalog`: the primary listing (manual per language, then auto-generated, then any);
//! - `caption_tracks`: typed track metadata, human subtitles before automatic captions,
//!   each set ranked by format.
//!
//! The result's `reason` is the winning strategy's provenance tag, or every failure joined
//! with `"; "`.

use crate::{captions, youtube};
use gistpipe_core::{
    failure_messages, CaptionFormat, CaptionTrack, CaptionTrackSource, Candidate, FallbackChain,
    FetchBackend, FetchRequest, Strategy, StrategyFailure, TranscriptCatalog, TranscriptConfig,
    TranscriptListing, TranscriptResult,
};
use std::sync::Arc;

pub struct TranscriptCtx {
    pub video_id: String,
    pub video_url: String,
    pub languages: Vec<String>,
}

struct CatalogStrategy {
    catalog: Arc<dyn TranscriptCatalog>,
}

impl CatalogStrategy {
    async fn try_fetch(&self, l: &TranscriptListing, errors: &mut Vec<String>) -> Option<String> {
        match self.catalog.fetch(l).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                errors.push(format!("{}: empty", l.language_code));
                None
            }
            Err(e) => {
                errors.push(format!("{}: {e}", l.language_code));
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl Strategy<TranscriptCtx> for CatalogStrategy {
    fn name(&self) -> &'static str {
        "caption_catalog"
    }

    async fn attempt(&self, ctx: &mut TranscriptCtx) -> Result<Candidate, StrategyFailure> {
        let listings = self
            .catalog
            .list(&ctx.video_id)
            .await
            .map_err(|e| StrategyFailure::new(format!("transcript listing failed: {e}")))?;
        let mut errors = Vec::new();

        // Manual tracks, one priority language at a time.
        for lang in &ctx.languages {
            let Some(l) = listings
                .iter()
                .find(|l| !l.is_generated && &l.language_code == lang)
            else {
                continue;
            };
            if let Some(text) = self.try_fetch(l, &mut errors).await {
                return Ok(Candidate::new(text).with_detail(format!("manual transcript ({lang})")));
            }
        }

        // Auto-generated: the first priority language that has one.
        let auto = ctx.languages.iter().find_map(|lang| {
            listings
                .iter()
                .find(|l| l.is_generated && &l.language_code == lang)
        });
        if let Some(l) = auto {
            if let Some(text) = self.try_fetch(l, &mut errors).await {
                return Ok(Candidate::new(text)
                    .with_detail(format!("auto-generated transcript ({})", l.language_code)));
            }
        }

        // Anything at all, in listing order.
        for l in &listings {
            if let Some(text) = self.try_fetch(l, &mut errors).await {
                return Ok(Candidate::new(text)
                    .with_detail(format!("any transcript ({})", l.language_code)));
            }
        }

        if errors.is_empty() {
            Err(StrategyFailure::new("no usable transcript tracks"))
        } else {
            Err(StrategyFailure::new(format!(
                "no usable transcript tracks ({})",
                errors.join(", ")
            )))
        }
    }
}

/// Tracks of `tracks` in a priority language, stably ordered by format rank.
pub fn ranked_candidates<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Vec<&'a CaptionTrack> {
    let mut out: Vec<&CaptionTrack> = languages
        .iter()
        .flat_map(|lang| tracks.iter().filter(move |t| &t.language_code == lang))
        .collect();
    out.sort_by_key(|t| t.format.rank());
    out
}

struct TrackStrategy {
    source: Arc<dyn CaptionTrackSource>,
    fetcher: Arc<dyn FetchBackend>,
    timeout_ms: u64,
}

impl TrackStrategy {
    /// Body of a successful GET, or `None`.
    async fn get(&self, url: &str) -> Option<String> {
        let req = FetchRequest::get(url).with_timeout_ms(self.timeout_ms);
        match self.fetcher.fetch(&req).await {
            Ok(resp) if resp.is_success() && !resp.bytes.is_empty() => Some(resp.text_lossy()),
            Ok(resp) => {
                tracing::debug!(url, status = resp.status, "caption fetch unusable");
                None
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "caption fetch failed");
                None
            }
        }
    }

    /// A VTT file, or an HLS playlist whose segments are VTT.
    async fn vtt_or_playlist(&self, url: &str, body: String) -> String {
        if !captions::is_hls_playlist(&body) {
            return captions::clean_vtt(&body);
        }
        let Ok(base) = url::Url::parse(url) else {
            return String::new();
        };
        let mut joined = Vec::new();
        for seg in captions::playlist_segment_urls(&base, &body) {
            if let Some(s) = self.get(seg.as_str()).await {
                joined.push(s);
            }
        }
        captions::clean_vtt(&joined.join("\n"))
    }

    async fn track_text(&self, track: &CaptionTrack) -> String {
        let Some(body) = self.get(&track.source_url).await else {
            return String::new();
        };
        let format = match track.format {
            CaptionFormat::Unknown => captions::sniff_format(&body),
            f => f,
        };
        match format {
            CaptionFormat::Vtt | CaptionFormat::M3u8 => {
                self.vtt_or_playlist(&track.source_url, body).await
            }
            other => captions::parse_payload(&other, &body),
        }
    }
}

#[async_trait::async_trait]
impl Strategy<TranscriptCtx> for TrackStrategy {
    fn name(&self) -> &'static str {
        "caption_tracks"
    }

    async fn attempt(&self, ctx: &mut TranscriptCtx) -> Result<Candidate, StrategyFailure> {
        let tracks = self
            .source
            .caption_tracks(&ctx.video_url)
            .await
            .map_err(|e| StrategyFailure::new(format!("caption metadata failed: {e}")))?;

        for (label, set) in [("subtitles", &tracks.subtitles), ("automatic_captions", &tracks.automatic)] {
            for track in ranked_candidates(set, &ctx.languages) {
                let text = self.track_text(track).await;
                if !text.trim().is_empty() {
                    return Ok(Candidate::new(text)
                        .with_extra_url(track.source_url.clone())
                        .with_detail(format!(
                            "captions ({label}:{}:{})",
                            track.language_code,
                            track.format.as_str()
                        )));
                }
            }
        }
        Err(StrategyFailure::new("no usable caption tracks"))
    }
}

/// Transcript extraction over a primary catalog and a track-metadata fallback.
pub struct TranscriptExtractor {
    chain: FallbackChain<TranscriptCtx>,
    languages: Vec<String>,
}

impl TranscriptExtractor {
    pub fn new(
        catalog: Arc<dyn TranscriptCatalog>,
        source: Arc<dyn CaptionTrackSource>,
        fetcher: Arc<dyn FetchBackend>,
        cfg: TranscriptConfig,
    ) -> Self {
        let chain = FallbackChain::new(1)
            .with(CatalogStrategy { catalog })
            .with(TrackStrategy {
                source,
                fetcher,
                timeout_ms: cfg.timeout_ms,
            });
        Self {
            chain,
            languages: cfg.languages,
        }
    }

    /// Watch-page catalog + `yt-dlp` metadata, both over `fetcher`.
    pub fn youtube(fetcher: Arc<dyn FetchBackend>, cfg: TranscriptConfig) -> Self {
        let catalog = youtube::WatchPageCatalog::new(
            fetcher.clone(),
            gistpipe_core::config::BROWSER_USER_AGENT,
            cfg.timeout_ms,
        );
        let source = youtube::YtDlpCaptionSource::new(&cfg.ytdlp_bin, cfg.ytdlp_timeout_ms);
        Self::new(Arc::new(catalog), Arc::new(source), fetcher, cfg)
    }

    pub async fn extract(&self, url: &str) -> TranscriptResult {
        self.extract_with_languages(url, &self.languages).await
    }

    pub async fn extract_with_languages(&self, url: &str, languages: &[String]) -> TranscriptResult {
        let Some(video_id) = youtube::video_id(url) else {
            tracing::info!(url, "couldn't parse video id");
            return TranscriptResult {
                text: String::new(),
                reason: "couldn't parse video id".to_string(),
                video_id: None,
                attempts: Vec::new(),
            };
        };
        let mut ctx = TranscriptCtx {
            video_url: youtube::watch_url(&video_id),
            video_id: video_id.clone(),
            languages: languages.to_vec(),
        };
        let res = self.chain.run(&mut ctx).await;

        let reason = match res.accepted() {
            Some(a) => a.detail.clone().unwrap_or_else(|| a.strategy.clone()),
            None => failure_messages(&res.attempts).join("; "),
        };
        TranscriptResult {
            text: res.text,
            reason,
            video_id: Some(video_id),
            attempts: res.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use crate::LocalFetcher;
    use axum::{http::StatusCode, routing::get, Router};
    use gistpipe_core::{CaptionTracks, Error, Result};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCatalog {
        listings: Vec<TranscriptListing>,
        list_error: Option<String>,
        /// language_code → text; missing means fetch fails.
        texts: Vec<(String, bool, String)>,
        fetched: Mutex<Vec<String>>,
    }

    fn listing(lang: &str, generated: bool) -> TranscriptListing {
        TranscriptListing {
            language_code: lang.to_string(),
            language: lang.to_string(),
            is_generated: generated,
            source_url: format!("https://captions.test/{lang}/{generated}"),
        }
    }

    #[async_trait::async_trait]
    impl TranscriptCatalog for FakeCatalog {
        async fn list(&self, _video_id: &str) -> Result<Vec<TranscriptListing>> {
            match &self.list_error {
                Some(e) => Err(Error::Fetch(e.clone())),
                None => Ok(self.listings.clone()),
            }
        }

        async fn fetch(&self, l: &TranscriptListing) -> Result<String> {
            self.fetched
                .lock()
                .unwrap()
                .push(format!("{}:{}", l.language_code, l.is_generated));
            self.texts
                .iter()
                .find(|(lang, g, _)| lang == &l.language_code && *g == l.is_generated)
                .map(|(_, _, t)| t.clone())
                .ok_or_else(|| Error::NotFound("no such track".to_string()))
        }
    }

    struct FakeSource(std::result::Result<CaptionTracks, String>);

    #[async_trait::async_trait]
    impl CaptionTrackSource for FakeSource {
        async fn caption_tracks(&self, _video_url: &str) -> Result<CaptionTracks> {
            self.0.clone().map_err(Error::Tool)
        }
    }

    fn no_source() -> Arc<dyn CaptionTrackSource> {
        Arc::new(FakeSource(Err("yt-dlp not installed".to_string())))
    }

    fn fetcher() -> Arc<dyn FetchBackend> {
        Arc::new(LocalFetcher::with_default_user_agent().unwrap())
    }

    fn cfg(langs: &[&str]) -> TranscriptConfig {
        TranscriptConfig {
            languages: langs.iter().map(|s| s.to_string()).collect(),
            timeout_ms: 2_000,
            ..TranscriptConfig::default()
        }
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn unparseable_url_makes_no_calls() {
        let catalog = Arc::new(FakeCatalog {
            list_error: Some("should not be called".to_string()),
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog.clone(), no_source(), fetcher(), cfg(&["en"]));
        let res = ex.extract("https://example.com/not-a-video").await;
        assert_eq!(res.text, "");
        assert_eq!(res.reason, "couldn't parse video id");
        assert!(res.attempts.is_empty());
        assert!(catalog.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_english_beats_manual_spanish() {
        let catalog = Arc::new(FakeCatalog {
            listings: vec![listing("es", false), listing("en", true)],
            texts: vec![
                ("es".to_string(), false, "hola a todos".to_string()),
                ("en".to_string(), true, "hello everyone".to_string()),
            ],
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog, no_source(), fetcher(), cfg(&["en"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "hello everyone");
        assert_eq!(res.reason, "auto-generated transcript (en)");
        assert_eq!(res.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn manual_tracks_follow_language_priority() {
        let catalog = Arc::new(FakeCatalog {
            listings: vec![listing("en-GB", false), listing("en", true), listing("en-US", false)],
            texts: vec![
                ("en-GB".to_string(), false, "british".to_string()),
                ("en".to_string(), true, "auto".to_string()),
                ("en-US".to_string(), false, "american".to_string()),
            ],
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog, no_source(), fetcher(), cfg(&["en", "en-US", "en-GB"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "american");
        assert_eq!(res.reason, "manual transcript (en-US)");
    }

    #[tokio::test]
    async fn any_track_is_the_last_resort_of_the_catalog() {
        let catalog = Arc::new(FakeCatalog {
            listings: vec![listing("fr", false), listing("de", true)],
            texts: vec![("de".to_string(), true, "guten tag".to_string())],
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog.clone(), no_source(), fetcher(), cfg(&["en"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "guten tag");
        assert_eq!(res.reason, "any transcript (de)");
        assert_eq!(*catalog.fetched.lock().unwrap(), vec!["fr:false", "de:true"]);
    }

    #[tokio::test]
    async fn total_failure_joins_both_reasons() {
        let catalog = Arc::new(FakeCatalog {
            list_error: Some("captions disabled".to_string()),
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog, no_source(), fetcher(), cfg(&["en"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "");
        assert_eq!(
            res.reason,
            "transcript listing failed: fetch failed: captions disabled; \
             caption metadata failed: tool failed: yt-dlp not installed"
        );
        assert_eq!(res.attempts.len(), 2);
    }

    #[test]
    fn candidates_are_language_filtered_and_format_ranked() {
        let t = |lang: &str, f: CaptionFormat| CaptionTrack {
            language_code: lang.to_string(),
            format: f,
            source_url: format!("{lang}.{}", f.as_str()),
            is_auto_generated: false,
        };
        let tracks = vec![
            t("en", CaptionFormat::Json3),
            t("de", CaptionFormat::Vtt),
            t("en", CaptionFormat::Srv3),
            t("en-US", CaptionFormat::Vtt),
            t("en", CaptionFormat::Unknown),
        ];
        let langs = vec!["en".to_string(), "en-US".to_string()];
        let urls: Vec<&str> = ranked_candidates(&tracks, &langs)
            .iter()
            .map(|t| t.source_url.as_str())
            .collect();
        assert_eq!(urls, vec!["en-US.vtt", "en.srv3", "en.json3", "en.unknown"]);
    }

    #[tokio::test]
    async fn fallback_follows_hls_playlist_and_prefers_subtitles() {
        let app = Router::new()
            .route(
                "/subs/en.m3u8",
                get(|| async { "#EXTM3U\n#EXT-X-TARGETDURATION:10\nseg1.vtt\n#EXTINF:10,\nseg2.vtt\nmissing.vtt\n#EXT-X-ENDLIST\n" }),
            )
            .route(
                "/subs/seg1.vtt",
                get(|| async { "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nHello there\n" }),
            )
            .route(
                "/subs/seg2.vtt",
                get(|| async { "WEBVTT\n\n2\n00:00:02.000 --> 00:00:03.000\nGeneral Kenobi\n" }),
            )
            .route("/subs/missing.vtt", get(|| async { (StatusCode::NOT_FOUND, "") }))
            .route(
                "/auto/en.srv3",
                get(|| async { "<timedtext><body><text>auto words</text></body></timedtext>" }),
            );
        let addr = serve(app).await;
        let track = |path: &str, f: CaptionFormat, auto: bool| CaptionTrack {
            language_code: "en".to_string(),
            format: f,
            source_url: format!("http://{addr}{path}"),
            is_auto_generated: auto,
        };
        let source = Arc::new(FakeSource(Ok(CaptionTracks {
            subtitles: vec![track("/subs/en.m3u8", CaptionFormat::Unknown, false)],
            automatic: vec![track("/auto/en.srv3", CaptionFormat::Srv3, true)],
        })));
        let catalog = Arc::new(FakeCatalog {
            listings: vec![],
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog, source, fetcher(), cfg(&["en"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "Hello there General Kenobi");
        assert_eq!(res.reason, "captions (subtitles:en:unknown)");
        assert_eq!(res.attempts[0].error.as_deref(), Some("no usable transcript tracks"));
        assert!(res.attempts[1].succeeded);
    }

    #[tokio::test]
    async fn fallback_moves_on_from_broken_tracks_to_automatic() {
        let app = Router::new()
            .route("/subs/en.vtt", get(|| async { (StatusCode::FORBIDDEN, "no") }))
            .route("/subs/en.srv3", get(|| async { "<transcript><text>unclosed" }))
            .route(
                "/auto/en.srv3",
                get(|| async { "<transcript><text>Hello</text><text> world</text></transcript>" }),
            );
        let addr = serve(app).await;
        let track = |path: &str, f: CaptionFormat, auto: bool| CaptionTrack {
            language_code: "en".to_string(),
            format: f,
            source_url: format!("http://{addr}{path}"),
            is_auto_generated: auto,
        };
        let source = Arc::new(FakeSource(Ok(CaptionTracks {
            subtitles: vec![
                track("/subs/en.srv3", CaptionFormat::Srv3, false),
                track("/subs/en.vtt", CaptionFormat::Vtt, false),
            ],
            automatic: vec![track("/auto/en.srv3", CaptionFormat::Srv3, true)],
        })));
        let catalog = Arc::new(FakeCatalog {
            list_error: Some("blocked".to_string()),
            ..FakeCatalog::default()
        });
        let ex = TranscriptExtractor::new(catalog, source, fetcher(), cfg(&["en"]));
        let res = ex.extract(URL).await;
        assert_eq!(res.text, "Hello world");
        assert_eq!(res.reason, "captions (automatic_captions:en:srv3)");
    }
}
