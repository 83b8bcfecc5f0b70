use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::LanguageModel;
use crate::{Error, Result};

/// Ollama can be slow on CPU
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama `/api/generate` in raw mode
pub struct OllamaModel {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    /// Connect and load `model` into server memory
    ///
    /// An empty generate request makes Ollama load the weights; `keep_alive`
    /// of -1 keeps them resident for the rest of the session.
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or the model is unknown
    pub async fn load(base_url: &str, model: String) -> Result<Self> {
        let this = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        };

        tracing::info!(model = %this.model, url = %this.base_url, "loading model");
        let resp = this
            .client
            .post(this.url())
            .json(&json!({ "model": this.model, "keep_alive": -1 }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Llm(format!(
                "Ollama could not load {}: {status} {error_text}",
                this.model
            )));
        }

        Ok(this)
    }

    fn url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn request_body(&self, prompt: &str, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "raw": true,
            "stream": false,
            "keep_alive": -1,
            "options": { "num_predict": max_tokens }
        })
    }
}

/// Extract the generated text from an Ollama response
fn parse_response(json: &Value) -> Result<String> {
    json["response"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| Error::Llm("Invalid response format from Ollama".to_string()))
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        tracing::debug!(model = %self.model, max_tokens, "sending request to Ollama");

        let resp = self
            .client
            .post(self.url())
            .json(&self.request_body(prompt, max_tokens))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Ollama API error: {error_text}")));
        }

        let json: Value = resp.json().await?;
        parse_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
