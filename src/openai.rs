//! OpenAI API client: JSON-mode chat completions and embeddings.

use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::config::Config;
use crate::error::PipelineError;

/// Character budget for any text sent to a model, a rough stand-in for the
/// 8k-token request limit.
pub const MAX_PROMPT_CHARS: usize = 32_000;
const TRUNCATION_MARKER: &str = "...[truncated]";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.openai_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.openai_key.clone(),
        }
    }

    /// POST /v1/chat/completions with `response_format: json_object`; the
    /// assistant message content is parsed as a JSON value.
    pub async fn chat_json(
        &self,
        model: &str,
        temperature: f64,
        system: &str,
        user: &str,
    ) -> Result<serde_json::Value, PipelineError> {
        let content = self
            .chat(
                model,
                json!({
                    "model": model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user}
                    ],
                    "response_format": {"type": "json_object"},
                    "temperature": temperature
                }),
            )
            .await?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Parse(format!("model returned invalid JSON: {e}")))
    }

    /// POST /v1/chat/completions, plain-text completion.
    pub async fn chat_text(
        &self,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        system: &str,
        user: &str,
    ) -> Result<String, PipelineError> {
        self.chat(
            model,
            json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ],
                "temperature": temperature,
                "max_tokens": max_tokens
            }),
        )
        .await
    }

    async fn chat(&self, model: &str, body: serde_json::Value) -> Result<String, PipelineError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::Transient(format!(
                "openai chat error ({model}): {status} {body}"
            )));
        }

        let body: serde_json::Value = res.json().await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PipelineError::Parse(format!("no message content in openai response: {body}"))
            })
    }

    /// POST /v1/embeddings — one dense vector per call. The vector dimension
    /// is fixed by the model; all stored vectors in a channel share it.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, PipelineError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "input": text
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::Transient(format!(
                "openai embedding error: {status} {body}"
            )));
        }

        let body: serde_json::Value = res.json().await?;
        if let Some(array) = body["data"][0]["embedding"].as_array() {
            let emb: Vec<f32> = array
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|v| v as f32)
                .collect();
            Ok(emb)
        } else {
            Err(PipelineError::Parse(format!(
                "no embedding in openai response: {body}"
            )))
        }
    }
}

/// Truncate `text` to the model character budget, appending a visible marker
/// at a char boundary.
pub fn truncate_for_model(text: &str) -> String {
    if text.len() <= MAX_PROMPT_CHARS {
        return text.to_string();
    }
    let mut end = MAX_PROMPT_CHARS;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        original_len = text.len(),
        truncated_len = end,
        "Truncating long message before model submission"
    );
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}
