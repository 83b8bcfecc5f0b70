//! One assistant turn: reply, synthesize, wait for the audio, play it
//!
//! The session is built once, after the model has been loaded, and is then
//! borrowed for every turn. Turns are strictly sequential; artifacts of a
//! turn are stabilized and played one at a time, in chronological order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::Result;
use crate::config::Config;
use crate::llm::{DEFAULT_MAX_TOKENS, LanguageModel};
use crate::prompt::ResponseFormatter;
use crate::voice::{
    ArtifactWatcher, AudioArtifact, Completion, PlaybackDispatcher, PlaybackOutcome,
    SpeechRequest, SpeechSynthesizer, Stability,
};

/// Issues `reply_<millis>` prefixes that never repeat within a session
///
/// Consecutive turns inside the same millisecond (or a clock that steps
/// backwards) still get strictly increasing values.
#[derive(Debug, Default)]
pub struct PrefixClock {
    last: AtomicI64,
}

impl PrefixClock {
    /// Prefix from the current wall clock
    pub fn next(&self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Prefix for a given timestamp in milliseconds
    pub fn next_at(&self, now_ms: i64) -> String {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_ms.max(last.saturating_add(1)))
            })
            .unwrap_or(now_ms);
        let issued = now_ms.max(previous.saturating_add(1));
        format!("reply_{issued}")
    }
}

/// What happened to one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedArtifact {
    pub artifact: AudioArtifact,
    pub stability: Stability,
    pub outcome: PlaybackOutcome,
}

/// Summary of one turn
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Cleaned reply text
    pub reply: String,
    /// File prefix used for this turn's audio, if synthesis ran
    pub prefix: Option<String>,
    /// Artifacts in playback order; empty if none were produced
    pub artifacts: Vec<PlayedArtifact>,
}

/// Synthesis, readiness and playback of reply text
pub struct VoiceOutput {
    synthesizer: Box<dyn SpeechSynthesizer>,
    watcher: ArtifactWatcher,
    dispatcher: PlaybackDispatcher,
    output_dir: PathBuf,
    language: String,
    prefixes: PrefixClock,
}

impl VoiceOutput {
    /// Voice output with the default watcher and platform dispatcher
    #[must_use]
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        output_dir: PathBuf,
        language: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            watcher: ArtifactWatcher::new(),
            dispatcher: PlaybackDispatcher::default(),
            output_dir,
            language: language.into(),
            prefixes: PrefixClock::default(),
        }
    }

    /// Build from configuration (no model required)
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer is misconfigured
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.synthesizer()?,
            config.audio.output_dir.clone(),
            config.tts.language.clone(),
        )
        .with_watcher(config.watcher())
        .with_dispatcher(config.dispatcher()))
    }

    #[must_use]
    pub fn with_watcher(mut self, watcher: ArtifactWatcher) -> Self {
        self.watcher = watcher;
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: PlaybackDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &PlaybackDispatcher {
        &self.dispatcher
    }

    /// Synthesize `text` and play the resulting files in order
    ///
    /// Returns the prefix used and the per-artifact results.
    ///
    /// # Errors
    ///
    /// Returns error if the output directory cannot be created or synthesis
    /// fails
    pub async fn speak(&self, text: &str) -> Result<(String, Vec<PlayedArtifact>)> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let prefix = self.prefixes.next();
        let request = SpeechRequest {
            text,
            language: &self.language,
            prefix: &prefix,
            output_dir: &self.output_dir,
        };
        let completion = self.synthesizer.synthesize(&request).await?;

        if completion == Completion::Detached {
            self.watcher.settle().await;
        }

        let played = self.play_batch(&prefix, completion).await;
        Ok((prefix, played))
    }

    async fn play_batch(&self, prefix: &str, completion: Completion) -> Vec<PlayedArtifact> {
        let batch = self.watcher.discover(&self.output_dir, prefix);
        if batch.is_empty() {
            tracing::warn!(prefix, "No WAV created for reply.");
            return Vec::new();
        }

        let mut played = Vec::with_capacity(batch.len());
        for artifact in batch {
            let stability = match completion {
                Completion::Finished => Stability::Stable {
                    samples: 0,
                    size: artifact.size(),
                },
                Completion::Detached => self.watcher.await_stable(&artifact).await,
            };

            if let Stability::GaveUp { samples, last_size } = stability {
                tracing::warn!(
                    path = %artifact.path().display(),
                    samples,
                    last_size,
                    "audio file did not settle; playing it anyway"
                );
            }

            let outcome = self.dispatcher.play(artifact.path()).await;
            played.push(PlayedArtifact {
                artifact,
                stability,
                outcome,
            });
        }
        played
    }
}

/// Long-lived assistant state shared by every turn
pub struct AssistantSession {
    model: Box<dyn LanguageModel>,
    formatter: ResponseFormatter,
    voice: VoiceOutput,
    max_tokens: u32,
}

impl AssistantSession {
    /// Create a session around an already-loaded model
    #[must_use]
    pub fn new(model: Box<dyn LanguageModel>, voice: VoiceOutput) -> Self {
        Self {
            model,
            formatter: ResponseFormatter::default(),
            voice,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Load the configured model and assemble the session around it
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be loaded or the synthesizer is
    /// misconfigured
    pub async fn from_config(config: &Config) -> Result<Self> {
        let voice = VoiceOutput::from_config(config)?;
        let model = config.load_model().await?;

        Ok(Self::new(model, voice)
            .with_formatter(config.formatter())
            .with_max_tokens(config.llm.max_tokens))
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: ResponseFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn voice(&self) -> &VoiceOutput {
        &self.voice
    }

    /// Run one full turn for a user utterance
    ///
    /// # Errors
    ///
    /// Returns error if generation or synthesis fails. Missing audio and
    /// playback failures are reported in the [`TurnReport`] instead.
    pub async fn turn(&self, input: &str) -> Result<TurnReport> {
        let prompt = self.formatter.format_prompt(input);
        tracing::debug!(model = self.model.model(), "generating reply");
        let raw = self.model.generate(&prompt, self.max_tokens).await?;
        let reply = self.formatter.clean(&raw);

        if reply.is_empty() {
            tracing::warn!("Model returned an empty reply; nothing to speak.");
            return Ok(TurnReport {
                reply,
                prefix: None,
                artifacts: Vec::new(),
            });
        }

        let (prefix, artifacts) = self.voice.speak(&reply).await?;
        Ok(TurnReport {
            reply,
            prefix: Some(prefix),
            artifacts,
        })
    }
}
