//! Voice output module
//!
//! Handles speech synthesis, readiness of the synthesized files, and playback.

mod playback;
mod tts;
mod watcher;

pub use playback::{
    AFPLAY_PATH, Invocation, Platform, PlaybackDispatcher, PlaybackOutcome, PlaybackTable,
    PlayerExit, PlayerHost, PlayerStrategy, SystemHost, escape_for_cmd,
};
pub use tts::{
    Completion, CommandTts, DEFAULT_TTS_COMMAND, OpenAiTts, SpeechRequest, SpeechSynthesizer,
};
pub use watcher::{
    ARTIFACT_EXTENSION, ArtifactBatch, ArtifactWatcher, AudioArtifact, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, FsProbe, SizeProbe, Stability, StabilityPolicy,
    order_chronologically,
};
