//! Text-to-speech (TTS) backends
//!
//! Synthesizers write `{prefix}_*.wav` files into the requested directory.
//! Whether those files are complete when [`SpeechSynthesizer::synthesize`]
//! returns is reported through [`Completion`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use crate::{Error, Result};

/// Default command template (mlx-audio CLI)
pub const DEFAULT_TTS_COMMAND: &str = "python3 -m mlx_audio.tts.generate --text {text} \
     --lang_code {language} --file_prefix {prefix} --output_path {output_dir}";

/// What the synthesizer knows about its output when it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every file is fully written
    Finished,
    /// Files may still be appearing or growing
    Detached,
}

/// One synthesis call
#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    /// Language code understood by the backend (e.g. "es")
    pub language: &'a str,
    /// Unique per-turn file name prefix
    pub prefix: &'a str,
    pub output_dir: &'a Path,
}

/// Speech synthesis backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request.text` into `{prefix}_*.wav` files
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Completion>;
}

/// Runs an external TTS program built from an argument template
///
/// `{text}`, `{language}`, `{prefix}` and `{output_dir}` are substituted
/// inside each argument, so text with spaces stays a single argument.
#[derive(Debug, Clone)]
pub struct CommandTts {
    program: String,
    args: Vec<String>,
}

impl CommandTts {
    /// Parse a whitespace-separated command template
    ///
    /// # Errors
    ///
    /// Returns error if the template is empty
    pub fn from_template(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("TTS command template is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Arguments with placeholders filled in
    #[must_use]
    pub fn expand(&self, request: &SpeechRequest<'_>) -> Vec<String> {
        let output_dir = request.output_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{output_dir}", &output_dir)
                    .replace("{language}", request.language)
                    .replace("{prefix}", request.prefix)
                    .replace("{text}", request.text)
            })
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandTts {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Completion> {
        let args = self.expand(request);
        tracing::debug!(program = %self.program, prefix = request.prefix, "running TTS command");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Tts(format!("failed to spawn {}: {e}", self.program)))?;

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(stderr = %stderr.trim_end(), "TTS stderr");
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(Error::Tts(format!("{} exited with code {code}", self.program)));
        }

        // The child may leave buffered writes behind it
        Ok(Completion::Detached)
    }
}

/// OpenAI-compatible `/audio/speech` endpoint
pub struct OpenAiTts {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    voice: String,
}

impl OpenAiTts {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`)
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>, model: String, voice: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            voice,
        }
    }

    /// File this backend writes for a request
    #[must_use]
    pub fn output_path(request: &SpeechRequest<'_>) -> PathBuf {
        request
            .output_dir
            .join(format!("{}_0.wav", request.prefix))
    }
}

#[derive(serde::Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[async_trait]
impl SpeechSynthesizer for OpenAiTts {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Completion> {
        let body = SpeechBody {
            model: &self.model,
            input: request.text,
            voice: &self.voice,
            response_format: "wav",
        };

        let mut http = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("speech API error {status}: {text}")));
        }

        let audio = response.bytes().await?;
        let path = Self::output_path(request);
        tokio::fs::write(&path, &audio).await?;
        tracing::debug!(path = %path.display(), bytes = audio.len(), "wrote speech");

        Ok(Completion::Finished)
    }
}
