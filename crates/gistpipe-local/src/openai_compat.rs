use gistpipe_core::{Error, Result, Summarizer};
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str =
    "You are a careful summarizer. Be concise and factual. Never invent details that are not in the source text.";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `Summarizer` over any `/v1/chat/completions` endpoint (OpenAI, Groq, vLLM, llama.cpp...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
    max_tokens: Option<u64>,
    temperature: Option<f64>,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            timeout_ms: 60_000,
            max_tokens: Some(1024),
            temperature: Some(0.5),
        }
    }

    /// `GISTPIPE_OPENAI_COMPAT_BASE_URL`, `_API_KEY` (optional) and `_MODEL`.
    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let base_url = env("GISTPIPE_OPENAI_COMPAT_BASE_URL").ok_or_else(|| {
            Error::NotConfigured("missing GISTPIPE_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let model = model_override
            .or_else(|| env("GISTPIPE_OPENAI_COMPAT_MODEL"))
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing model (pass --model or set GISTPIPE_OPENAI_COMPAT_MODEL)".to_string(),
                )
            })?;
        let mut c = Self::new(client, &base_url, &model);
        c.api_key = env("GISTPIPE_OPENAI_COMPAT_API_KEY");
        Ok(c)
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(Error::Llm(format!("chat.completions HTTP {status}: {head}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(Error::Llm("empty completion".to_string()));
        }
        Ok(content)
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAiCompatClient {
    async fn summarize(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "chat.completions");
        self.chat(SYSTEM_PROMPT, prompt).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    #[tokio::test]
    async fn summarize_posts_chat_completion_and_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let user = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                let system = body["messages"][0]["role"].as_str().unwrap_or("").to_string();
                Json(json!({
                    "choices": [{"message": {"role": "assistant",
                        "content": format!("{auth}|{system}|{}|{}", body["model"], user)}}]
                }))
            }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(reqwest::Client::new(), &format!("http://{addr}/"), "tiny")
            .with_api_key(Some("k".to_string()));
        let out = c.summarize("hello").await.unwrap();
        assert_eq!(out, "Bearer k|system|\"tiny\"|hello");
    }

    #[tokio::test]
    async fn http_errors_become_llm_errors() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "too many input tokens") }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(reqwest::Client::new(), &format!("http://{addr}"), "tiny");
        let err = c.summarize("hello").await.unwrap_err();
        match err {
            Error::Llm(m) => {
                assert!(m.contains("413"));
                assert!(m.contains("too many input tokens"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": null}}]})) }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(reqwest::Client::new(), &format!("http://{addr}"), "tiny");
        assert!(matches!(c.summarize("x").await, Err(Error::Llm(_))));
    }
}
