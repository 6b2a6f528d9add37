use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gistpipe_core::{render_trail, word_count, ExtractionAttempt, Summarizer};
use gistpipe_local::{
    clean_summary_text, openai_compat::OpenAiCompatClient, pipeline_config_from_env, preview,
    ArticleExtractor, ChunkedSummarizer, LocalFetcher, SourceKind, SummaryReport,
    TranscriptExtractor,
};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gistpipe")]
#[command(about = "Article/transcript extraction and chunked summarization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the main text of a web article (json|text).
    Article(ArticleCmd),
    /// Fetch the transcript of a YouTube video (json|text).
    Transcript(TranscriptCmd),
    /// Summarize text read from a file or stdin.
    Summarize(SummarizeCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct SummaryArgs {
    /// Summarize the extracted text (needs GISTPIPE_OPENAI_COMPAT_BASE_URL).
    #[arg(long)]
    summarize: bool,
    /// Free-form summary style, e.g. "Bullet Points", "Executive Summary", "Timestamps".
    #[arg(long)]
    style: Option<String>,
    /// Model name (overrides GISTPIPE_OPENAI_COMPAT_MODEL).
    #[arg(long)]
    model: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ArticleCmd {
    url: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Minimum words for a strategy's output to be accepted.
    #[arg(long)]
    min_words: Option<usize>,
    #[command(flatten)]
    summary: SummaryArgs,
}

#[derive(clap::Args, Debug)]
struct TranscriptCmd {
    url: String,
    /// Language priority, comma-separated (default: GISTPIPE_LANGS or en,en-US,en-GB).
    #[arg(long = "lang", value_delimiter = ',')]
    lang: Vec<String>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    #[command(flatten)]
    summary: SummaryArgs,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Article,
    Transcript,
}

#[derive(clap::Args, Debug)]
struct SummarizeCmd {
    /// Read text from this file instead of stdin.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "article")]
    kind: KindArg,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    model: Option<String>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn is_text(output: &str) -> bool {
    output.eq_ignore_ascii_case("text")
}

fn default_style(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Article => "Executive Summary",
        SourceKind::Transcript => "Timestamps",
    }
}

fn summarizer(fetcher: &LocalFetcher, model: Option<String>) -> Result<Arc<dyn Summarizer>> {
    let c = OpenAiCompatClient::from_env(fetcher.client().clone(), model)?;
    tracing::info!(base_url = c.base_url(), model = c.model(), "summarizing");
    Ok(Arc::new(c))
}

/// Summary of `text`, or the error message to report.
async fn run_summary(
    fetcher: &LocalFetcher,
    args: &SummaryArgs,
    kind: SourceKind,
    text: &str,
) -> std::result::Result<SummaryReport, String> {
    let cfg = pipeline_config_from_env().summarize;
    let llm = summarizer(fetcher, args.model.clone()).map_err(|e| e.to_string())?;
    let style = args.style.as_deref().unwrap_or(default_style(kind));
    ChunkedSummarizer::new(llm, cfg)
        .with_kind(kind)
        .summarize_report(&clean_summary_text(text), style)
        .await
        .map(|mut r| {
            r.text = clean_summary_text(&r.text);
            r
        })
        .map_err(|e| e.to_string())
}

fn print_failure(headline: &str, detail: Option<&str>, attempts: &[ExtractionAttempt]) {
    eprintln!("{headline}");
    if let Some(d) = detail {
        eprintln!("  {d}");
    }
    for line in render_trail(attempts) {
        eprintln!("  {line}");
    }
}

async fn cmd_article(args: ArticleCmd) -> Result<ExitCode> {
    let mut cfg = pipeline_config_from_env().article;
    if let Some(n) = args.min_words {
        cfg.min_words = n;
    }
    let fetcher = LocalFetcher::with_default_user_agent()?;
    let extractor = ArticleExtractor::new(Arc::new(fetcher.clone()), cfg);
    let res = extractor.extract(&args.url).await;
    let ok = !res.is_empty();

    let summary = if ok && args.summary.summarize {
        Some(run_summary(&fetcher, &args.summary, SourceKind::Article, &res.text).await)
    } else {
        None
    };
    let summary_ok = !matches!(summary, Some(Err(_)));

    if is_text(&args.output) {
        if !ok {
            print_failure("could not extract article", None, &res.attempts);
            return Ok(ExitCode::from(1));
        }
        match &summary {
            Some(Ok(r)) => println!("{}", r.text),
            Some(Err(e)) => eprintln!("summarization failed: {e}"),
            None => println!("{}", clean_summary_text(&res.text)),
        }
    } else {
        let text = clean_summary_text(&res.text);
        let v = serde_json::json!({
            "schema_version": 1,
            "kind": "article",
            "ok": ok && summary_ok,
            "url": args.url,
            "word_count": word_count(&text),
            "preview": preview(&text, 280),
            "text": text,
            "strategies": extractor.strategy_names(),
            "accepted_strategy": res.accepted().map(|a| a.strategy.clone()),
            "attempts": res.attempts,
            "summary": summary.as_ref().and_then(|s| s.as_ref().ok()),
            "summary_error": summary.as_ref().and_then(|s| s.as_ref().err()),
            "error": (!ok).then_some("could not extract article"),
        });
        println!("{v}");
        if !ok {
            print_failure("could not extract article", None, &res.attempts);
        }
    }
    Ok(if ok && summary_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn cmd_transcript(args: TranscriptCmd) -> Result<ExitCode> {
    let mut cfg = pipeline_config_from_env().transcript;
    if !args.lang.is_empty() {
        cfg.languages = args
            .lang
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    let fetcher = LocalFetcher::with_default_user_agent()?;
    let extractor = TranscriptExtractor::youtube(Arc::new(fetcher.clone()), cfg);
    let res = extractor.extract(&args.url).await;
    let ok = !res.text.is_empty();

    let summary = if ok && args.summary.summarize {
        Some(run_summary(&fetcher, &args.summary, SourceKind::Transcript, &res.text).await)
    } else {
        None
    };
    let summary_ok = !matches!(summary, Some(Err(_)));

    if is_text(&args.output) {
        if !ok {
            let detail = format!(
                "video id: {}; {}",
                res.video_id.as_deref().unwrap_or("n/a"),
                res.reason
            );
            print_failure("no transcript found", Some(&detail), &res.attempts);
            return Ok(ExitCode::from(1));
        }
        match &summary {
            Some(Ok(r)) => println!("{}", r.text),
            Some(Err(e)) => eprintln!("summarization failed: {e}"),
            None => println!("{}", clean_summary_text(&res.text)),
        }
    } else {
        let text = clean_summary_text(&res.text);
        let v = serde_json::json!({
            "schema_version": 1,
            "kind": "transcript",
            "ok": ok && summary_ok,
            "url": args.url,
            "video_id": res.video_id,
            "reason": res.reason,
            "word_count": word_count(&text),
            "text": text,
            "attempts": res.attempts,
            "summary": summary.as_ref().and_then(|s| s.as_ref().ok()),
            "summary_error": summary.as_ref().and_then(|s| s.as_ref().err()),
            "error": (!ok).then_some("no transcript found"),
        });
        println!("{v}");
        if !ok {
            print_failure("no transcript found", Some(&res.reason), &res.attempts);
        }
    }
    Ok(if ok && summary_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn cmd_summarize(args: SummarizeCmd) -> Result<ExitCode> {
    let text = match &args.file {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?,
        None => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .context("read stdin")?;
            s
        }
    };
    let kind = match args.kind {
        KindArg::Article => SourceKind::Article,
        KindArg::Transcript => SourceKind::Transcript,
    };
    let fetcher = LocalFetcher::with_default_user_agent()?;
    let sargs = SummaryArgs {
        summarize: true,
        style: args.style,
        model: args.model,
    };
    let res = run_summary(&fetcher, &sargs, kind, &text).await;

    if is_text(&args.output) {
        return Ok(match res {
            Ok(r) => {
                println!("{}", r.text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("summarization failed: {e}");
                ExitCode::from(1)
            }
        });
    }
    let ok = res.is_ok();
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "summary",
        "ok": ok,
        "input_chars": text.chars().count(),
        "summary": res.as_ref().ok(),
        "error": res.as_ref().err(),
    });
    println!("{v}");
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

/// Opt-in env file (`GISTPIPE_ENV_FILE`): `KEY=VALUE` lines, never overriding the process env.
fn load_env_file() {
    let Ok(p) = std::env::var("GISTPIPE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    load_env_file();

    // Logs go to stderr; stdout carries results only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gistpipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "gistpipe");
    match cli.command {
        Commands::Article(args) => cmd_article(args).await,
        Commands::Transcript(args) => cmd_transcript(args).await,
        Commands::Summarize(args) => cmd_summarize(args).await,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "gistpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            if is_text(&args.output) {
                println!("gistpipe {}", env!("CARGO_PKG_VERSION"));
            } else {
                println!("{v}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
