use assert_cmd::Command;
use predicates::prelude::*;

fn gistpipe() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gistpipe"));
    // Keep runs hermetic.
    cmd.env_remove("GISTPIPE_ENV_FILE")
        .env_remove("GISTPIPE_OPENAI_COMPAT_BASE_URL")
        .env_remove("GISTPIPE_OPENAI_COMPAT_MODEL")
        .env_remove("GISTPIPE_OPENAI_COMPAT_API_KEY")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn version_json_contract() {
    let out = gistpipe().args(["version"]).output().expect("run version");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["name"].as_str(), Some("gistpipe"));
    assert_eq!(v["version"].as_str(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_text_output() {
    gistpipe()
        .args(["version", "--output", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("gistpipe "));
}

#[test]
fn transcript_with_unparseable_url_fails_without_network() {
    let out = gistpipe()
        .args(["transcript", "https://example.com/not-a-video"])
        .output()
        .expect("run transcript");
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["kind"].as_str(), Some("transcript"));
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["reason"].as_str(), Some("couldn't parse video id"));
    assert_eq!(v["error"].as_str(), Some("no transcript found"));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no transcript found"));
}

#[test]
fn summarize_without_provider_reports_not_configured() {
    gistpipe()
        .args(["summarize", "--output", "text"])
        .write_stdin("Some text worth summarizing.")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GISTPIPE_OPENAI_COMPAT_BASE_URL"));
}
