//! Julia - offline voice assistant
//!
//! Typed input goes to a locally hosted language model; the reply is
//! synthesized to speech and played back, one turn at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   prompt   ┌──────────────┐   reply   ┌─────────────────┐
//! │     REPL     ├───────────►│ LanguageModel├──────────►│ SpeechSynthesizer│
//! └──────────────┘            └──────────────┘           └────────┬────────┘
//!                                                                 │ {prefix}_*.wav
//!                              ┌──────────────────┐      ┌────────▼────────┐
//!                              │PlaybackDispatcher│◄─────┤ ArtifactWatcher │
//!                              └──────────────────┘      └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod repl;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::LanguageModel;
pub use prompt::ResponseFormatter;
pub use session::{AssistantSession, PlayedArtifact, PrefixClock, TurnReport, VoiceOutput};
pub use voice::{
    ArtifactBatch, ArtifactWatcher, AudioArtifact, Completion, Platform, PlaybackDispatcher,
    PlaybackOutcome, SpeechRequest, SpeechSynthesizer, Stability,
};
