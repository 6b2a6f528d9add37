use axum::{routing::get, routing::post, Json, Router};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn article_html(words: usize) -> String {
    let body = (0..words)
        .map(|i| format!("token{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<html><head><title>Fixture</title></head><body>\
         <nav>Home Sections Subscribe</nav>\
         <article><h1>Fixture</h1><p>{body}</p></article>\
         <footer>All rights reserved</footer></body></html>"
    )
}

async fn run(args: &[&str], envs: &[(&str, String)]) -> std::process::Output {
    let bin = assert_cmd::cargo::cargo_bin!("gistpipe");
    let mut cmd = tokio::process::Command::new(bin);
    cmd.args(args)
        .env_remove("GISTPIPE_ENV_FILE")
        .env_remove("GISTPIPE_OPENAI_COMPAT_API_KEY")
        .env("RUST_LOG", "off");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    cmd.output().await.expect("run gistpipe")
}

#[tokio::test(flavor = "multi_thread")]
async fn article_json_carries_text_and_trail() {
    let app = Router::new().route(
        "/story",
        get(|| async { axum::response::Html(article_html(150)) }),
    );
    let addr = serve(app).await;
    let url = format!("http://{addr}/story");

    let out = run(&["article", &url], &[]).await;
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("article"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["accepted_strategy"].as_str(), Some("readable_fetch"));
    assert_eq!(
        v["strategies"],
        serde_json::json!(["readable_fetch", "raw_fetch", "readability", "amp"])
    );
    assert!(v["text"].as_str().unwrap_or("").contains("token149"));
    assert!(v["word_count"].as_u64().unwrap_or(0) >= 150);
    let attempts = v["attempts"].as_array().expect("attempts");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["status"].as_u64(), Some(200));
}

#[tokio::test(flavor = "multi_thread")]
async fn article_total_failure_exits_1_with_full_trail() {
    let app = Router::new().route(
        "/story",
        get(|| async { axum::response::Html(article_html(5)) }),
    );
    let addr = serve(app).await;
    let url = format!("http://{addr}/story");

    let out = run(&["article", &url, "--output", "text"], &[]).await;
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("could not extract article"));
    for name in ["readable_fetch", "raw_fetch", "readability", "amp"] {
        assert!(stderr.contains(name), "missing {name} in: {stderr}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn article_summarize_uses_openai_compat_provider() {
    let app = Router::new()
        .route(
            "/story",
            get(|| async { axum::response::Html(article_html(120)) }),
        )
        .route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                let prompt = body["messages"][1]["content"].as_str().unwrap_or("");
                let content = if prompt.contains("style: Bullet Points") {
                    "- first point\n\n\n\n- second point\n"
                } else {
                    "wrong style"
                };
                Json(serde_json::json!({"choices": [{"message": {"content": content}}]}))
            }),
        );
    let addr = serve(app).await;
    let url = format!("http://{addr}/story");

    let out = run(
        &["article", &url, "--summarize", "--style", "Bullet Points", "--output", "text"],
        &[
            ("GISTPIPE_OPENAI_COMPAT_BASE_URL", format!("http://{addr}")),
            ("GISTPIPE_OPENAI_COMPAT_MODEL", "fixture".to_string()),
        ],
    )
    .await;
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "- first point\n\n- second point\n"
    );
}
