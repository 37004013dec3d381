use crate::{FleetError, Result};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., http://localhost:8000/v1
    pub model: String,    // e.g., gpt-4o
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8000/v1".to_string()),
            model: std::env::var("LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
            api_key: std::env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
        }
    }
}

/// HTTP client for OpenAI-compatible backends.
///
/// Prefers the Responses API and falls back to Chat Completions, both in JSON mode.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| FleetError::LlmError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }

    /// Send a single user prompt and return the assistant text, which the
    /// backend is asked to format as a JSON object.
    pub async fn complete_json(&self, prompt: &str) -> Result<String> {
        let base = self.cfg.base_url.trim_end_matches('/');

        let responses_url = format!("{base}/responses");
        debug!(target: "llm_client", "POST {} via Responses API", responses_url);

        let body = json!({
            "model": self.cfg.model,
            "input": prompt,
            "temperature": self.cfg.temperature,
            "text": { "format": { "type": "json_object" } },
        });

        match self.post(&responses_url).json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    let val: serde_json::Value = resp.json().await.map_err(|e| {
                        FleetError::LlmError(format!("Failed to parse Responses JSON: {e}"))
                    })?;
                    if let Some(text) = extract_text_from_responses(&val) {
                        return Ok(text);
                    }
                    // fallthrough to chat if we couldn't parse
                } else if resp.status() == StatusCode::NOT_FOUND {
                    // Endpoint missing; try chat fallback
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(target: "llm_client", %status, body = %body, "Responses API error; trying chat.completions fallback");
                }
            }
            Err(err) => {
                warn!(target: "llm_client", error = %err, "Responses API request failed; trying chat.completions fallback");
            }
        }

        let chat_url = format!("{base}/chat/completions");
        debug!(target: "llm_client", "POST {} via Chat Completions", chat_url);

        let body = json!({
            "model": self.cfg.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.cfg.temperature,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .post(&chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FleetError::LlmError(format!("Chat Completions HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(FleetError::LlmError(format!(
                "Chat Completions error: status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            FleetError::LlmError(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        extract_text_from_chat_completions(&val).ok_or_else(|| {
            FleetError::LlmError("Missing choices[0].message.content in chat completions".into())
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.http.post(url).header("content-type", "application/json");
        match &self.cfg.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn extract_text_from_responses(v: &serde_json::Value) -> Option<String> {
    if let Some(s) = v.get("output_text").and_then(|x| x.as_str()) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    let mut acc = String::new();
    for item in v.get("output").and_then(|x| x.as_array())? {
        let Some(contents) = item.get("content").and_then(|c| c.as_array()) else {
            continue;
        };
        for c in contents {
            if let Some(t) = c.get("text").and_then(|v| v.as_str()) {
                acc.push_str(t);
            }
        }
    }
    if acc.is_empty() {
        extract_text_from_chat_completions(v)
    } else {
        Some(acc)
    }
}
