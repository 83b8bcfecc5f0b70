//! Configuration management for the Julia assistant
//!
//! Precedence: command line / environment > config file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::llm::{DEFAULT_MAX_TOKENS, LanguageModel, OllamaModel, OpenAiCompletions};
use crate::prompt::{DEFAULT_PREAMBLE, ResponseFormatter};
use crate::voice::{
    ArtifactWatcher, CommandTts, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
    DEFAULT_SETTLE_DELAY, DEFAULT_TTS_COMMAND, OpenAiTts, PlaybackDispatcher, SpeechSynthesizer,
    StabilityPolicy,
};
use crate::{Error, Result};

use file::JuliaConfigFile;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3:8b-instruct-q4_0";
const DEFAULT_COMPLETIONS_URL: &str = "http://localhost:8080/v1";
const DEFAULT_COMPLETIONS_MODEL: &str = "mlx-community/Meta-Llama-3-8B-Instruct-4bit";
const DEFAULT_SPEECH_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LANGUAGE: &str = "es";

/// Language model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    /// OpenAI-compatible `/completions` server
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "mlx" | "llamacpp" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown LLM provider: {other}"))),
        }
    }
}

/// Speech synthesis backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    /// External program from a command template
    Command,
    /// OpenAI-compatible `/audio/speech` endpoint
    OpenAi,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Values supplied on the command line or through `JULIA_*` variables
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub llm_provider: Option<String>,
    pub llm_url: Option<String>,
    pub model: Option<String>,
    pub tts_provider: Option<String>,
    pub tts_url: Option<String>,
    pub language: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub player: Option<String>,
    pub api_key: Option<String>,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub url: String,
    pub model: String,
    pub max_tokens: u32,
    pub preamble: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub command: String,
    pub url: String,
    pub model: String,
    pub voice: String,
    pub language: String,
}

/// Audio discovery and playback configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub output_dir: PathBuf,
    pub player: Option<String>,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

/// Resolved assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub audio: AudioConfig,

    /// API key for OpenAI-compatible backends (from `OPENAI_API_KEY`)
    pub api_key: Option<String>,
}

impl Config {
    /// Load the config file and apply overrides
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn load(overrides: Overrides) -> Result<Self> {
        Self::resolve(file::load_config_file(), overrides)
    }

    /// Merge a parsed config file with overrides and defaults
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn resolve(fc: JuliaConfigFile, overrides: Overrides) -> Result<Self> {
        let llm_provider = overrides
            .llm_provider
            .or(fc.llm.provider)
            .map_or(Ok(LlmProvider::Ollama), |s| s.parse())?;

        let (default_url, default_model) = match llm_provider {
            LlmProvider::Ollama => (DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL),
            LlmProvider::OpenAi => (DEFAULT_COMPLETIONS_URL, DEFAULT_COMPLETIONS_MODEL),
        };

        let llm = LlmConfig {
            provider: llm_provider,
            url: overrides
                .llm_url
                .or(fc.llm.url)
                .unwrap_or_else(|| default_url.to_string()),
            model: overrides
                .model
                .or(fc.llm.model)
                .unwrap_or_else(|| default_model.to_string()),
            max_tokens: fc.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            preamble: fc
                .llm
                .preamble
                .unwrap_or_else(|| DEFAULT_PREAMBLE.to_string()),
        };

        let tts = TtsConfig {
            provider: overrides
                .tts_provider
                .or(fc.tts.provider)
                .map_or(Ok(TtsProvider::Command), |s| s.parse())?,
            command: fc
                .tts
                .command
                .unwrap_or_else(|| DEFAULT_TTS_COMMAND.to_string()),
            url: overrides
                .tts_url
                .or(fc.tts.url)
                .unwrap_or_else(|| DEFAULT_SPEECH_URL.to_string()),
            model: fc.tts.model.unwrap_or_else(|| "tts-1".to_string()),
            voice: fc.tts.voice.unwrap_or_else(|| "alloy".to_string()),
            language: overrides
                .language
                .or(fc.tts.language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        };

        let audio = AudioConfig {
            output_dir: overrides
                .output_dir
                .or_else(|| fc.audio.output_dir.as_deref().map(expand_home))
                .unwrap_or_else(default_output_dir),
            player: overrides.player.or(fc.audio.player),
            settle_delay: fc
                .audio
                .settle_delay_ms
                .map_or(DEFAULT_SETTLE_DELAY, Duration::from_millis),
            poll_interval: fc
                .audio
                .poll_interval_ms
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
            max_attempts: fc.audio.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        };

        Ok(Self {
            llm,
            tts,
            audio,
            api_key: overrides.api_key,
        })
    }

    /// Load the configured language model (done once per session)
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached
    pub async fn load_model(&self) -> Result<Box<dyn LanguageModel>> {
        Ok(match self.llm.provider {
            LlmProvider::Ollama => {
                Box::new(OllamaModel::load(&self.llm.url, self.llm.model.clone()).await?)
            }
            LlmProvider::OpenAi => Box::new(
                OpenAiCompletions::load(&self.llm.url, self.api_key.clone(), self.llm.model.clone())
                    .await?,
            ),
        })
    }

    /// Build the configured speech synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the command template is empty
    pub fn synthesizer(&self) -> Result<Box<dyn SpeechSynthesizer>> {
        Ok(match self.tts.provider {
            TtsProvider::Command => Box::new(CommandTts::from_template(&self.tts.command)?),
            TtsProvider::OpenAi => Box::new(OpenAiTts::new(
                &self.tts.url,
                self.api_key.clone(),
                self.tts.model.clone(),
                self.tts.voice.clone(),
            )),
        })
    }

    #[must_use]
    pub fn formatter(&self) -> ResponseFormatter {
        ResponseFormatter::new(self.llm.preamble.clone())
    }

    #[must_use]
    pub fn watcher(&self) -> ArtifactWatcher {
        ArtifactWatcher::new()
            .with_settle_delay(self.audio.settle_delay)
            .with_policy(StabilityPolicy {
                poll_interval: self.audio.poll_interval,
                max_attempts: self.audio.max_attempts,
            })
    }

    #[must_use]
    pub fn dispatcher(&self) -> PlaybackDispatcher {
        PlaybackDispatcher::default().with_player(self.audio.player.as_deref())
    }
}

/// `~/.julia/outputs`
#[must_use]
pub fn default_output_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".julia").join("outputs"),
        |d| d.home_dir().join(".julia").join("outputs"),
    )
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    Path::new(path).to_path_buf()
}
