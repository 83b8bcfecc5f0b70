//! TOML configuration file loading
//!
//! Supports `~/.config/julia/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JuliaConfigFile {
    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Audio discovery and playback configuration
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Backend ("ollama" or "openai")
    pub provider: Option<String>,

    /// Server base URL
    pub url: Option<String>,

    /// Model identifier (e.g. "llama3:8b-instruct-q4_0")
    pub model: Option<String>,

    /// Generation budget per reply
    pub max_tokens: Option<u32>,

    /// Persona preamble placed ahead of each prompt
    pub preamble: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Backend ("command" or "openai")
    pub provider: Option<String>,

    /// Command template for the command backend
    pub command: Option<String>,

    /// Speech API base URL for the openai backend
    pub url: Option<String>,

    /// Speech model (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Language code passed to the synthesizer
    pub language: Option<String>,
}

/// Audio output configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Directory synthesized files are written to
    pub output_dir: Option<String>,

    /// Preferred player command (e.g. "mpv --no-video")
    pub player: Option<String>,

    pub settle_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config_file(content: &str) -> Result<JuliaConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `JuliaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JuliaConfigFile {
    let Some(path) = config_file_path() else {
        return JuliaConfigFile::default();
    };

    if !path.exists() {
        return JuliaConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JuliaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JuliaConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/julia/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("julia").join("config.toml"))
}
