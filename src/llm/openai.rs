use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::LanguageModel;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible legacy `/completions` endpoint
///
/// Served by `mlx_lm.server`, `llama.cpp` and vLLM among others. Unlike
/// `/chat/completions` it takes the prompt verbatim.
pub struct OpenAiCompletions {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompletions {
    /// Connect and confirm the server answers `/models`
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable
    pub async fn load(base_url: &str, api_key: Option<String>, model: String) -> Result<Self> {
        let this = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        };

        tracing::info!(model = %this.model, url = %this.base_url, "connecting to completions server");
        let mut req = this.client.get(format!("{}/models", this.base_url));
        if let Some(key) = &this.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.timeout(Duration::from_secs(10)).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Llm(format!(
                "completions server not ready: {}",
                resp.status()
            )));
        }

        Ok(this)
    }

    fn request_body(&self, prompt: &str, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "stream": false
        })
    }
}

fn parse_response(json: &Value) -> Result<String> {
    json["choices"][0]["text"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| Error::Llm("Invalid response format from completions server".to_string()))
}

#[async_trait]
impl LanguageModel for OpenAiCompletions {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        tracing::debug!(model = %self.model, max_tokens, "sending completions request");

        let mut req = self
            .client
            .post(format!("{}/completions", self.base_url))
            .json(&self.request_body(prompt, max_tokens))
            .timeout(REQUEST_TIMEOUT);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("completions API error: {error_text}")));
        }

        let json: Value = resp.json().await?;
        parse_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
