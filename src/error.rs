//! Error types for the Julia assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running an assistant turn
///
/// Playback problems are not errors: they are reported as a
/// [`crate::voice::PlaybackOutcome`] and never surface as an `Error`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
