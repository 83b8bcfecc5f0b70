//! Shared test utilities

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use julia_assistant::voice::{
    ArtifactWatcher, Invocation, PlaybackDispatcher, PlayerExit, PlayerHost, SizeProbe,
    StabilityPolicy,
};
use julia_assistant::{
    AssistantSession, Completion, Error, LanguageModel, Platform, SpeechRequest,
    SpeechSynthesizer, VoiceOutput,
};

/// Language model that replays canned replies and records prompts
#[derive(Clone, Default)]
pub struct FakeModel {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeModel {
    pub fn replying(replies: &[&str]) -> Self {
        let model = Self::default();
        for reply in replies {
            model.push(Ok((*reply).to_string()));
        }
        model
    }

    pub fn push(&self, reply: Result<String, String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> julia_assistant::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(Error::Llm(e)),
            None => Ok("Hola!".to_string()),
        }
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Synthesizer that drops fixed files named `{prefix}{suffix}` into the
/// output directory; reports them as still being written unless told
/// otherwise
#[derive(Clone)]
pub struct ScriptedTts {
    files: Vec<(String, Vec<u8>)>,
    completion: Completion,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for ScriptedTts {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            completion: Completion::Detached,
            requests: Arc::default(),
        }
    }
}

impl ScriptedTts {
    pub fn writing(suffixes: &[&str]) -> Self {
        Self {
            files: suffixes
                .iter()
                .map(|s| ((*s).to_string(), b"RIFF....WAVE".to_vec()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn completing(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    /// `(prefix, text)` of every call so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedTts {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> julia_assistant::Result<Completion> {
        self.requests
            .lock()
            .unwrap()
            .push((request.prefix.to_string(), request.text.to_string()));
        for (suffix, bytes) in &self.files {
            let path = request.output_dir.join(format!("{}{suffix}", request.prefix));
            std::fs::write(path, bytes)?;
        }
        Ok(self.completion)
    }
}

/// Size sequences keyed by file-name suffix; the last value repeats
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    scripts: Arc<Mutex<HashMap<String, Vec<u64>>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedProbe {
    pub fn script(self, suffix: &str, sizes: &[u64]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(suffix.to_string(), sizes.to_vec());
        self
    }

    pub fn calls(&self, suffix: &str) -> usize {
        self.calls.lock().unwrap().get(suffix).copied().unwrap_or(0)
    }
}

impl SizeProbe for ScriptedProbe {
    fn size(&self, path: &Path) -> io::Result<u64> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let scripts = self.scripts.lock().unwrap();
        let (suffix, sizes) = scripts
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix.as_str()))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        let mut calls = self.calls.lock().unwrap();
        let n = calls.entry(suffix.clone()).or_insert(0);
        let size = sizes.get(*n).or_else(|| sizes.last()).copied().unwrap_or(0);
        *n += 1;
        Ok(size)
    }
}

/// Player host with a fixed set of installed programs
#[derive(Default)]
pub struct RecordingHost {
    pub programs: HashSet<String>,
    /// File names whose playback exits non-zero
    pub failing: HashSet<String>,
    runs: Mutex<Vec<PathBuf>>,
}

impl RecordingHost {
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(|p| (*p).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Files handed to a player, in order
    pub fn played(&self) -> Vec<PathBuf> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerHost for RecordingHost {
    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn lookup(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }

    async fn run(&self, invocation: &Invocation) -> io::Result<PlayerExit> {
        let file = invocation
            .args
            .last()
            .map(PathBuf::from)
            .unwrap_or_default();
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.runs.lock().unwrap().push(file);

        Ok(if self.failing.iter().any(|f| name.ends_with(f.as_str())) {
            PlayerExit::Failed(Some(1))
        } else {
            PlayerExit::Success
        })
    }
}

/// Watcher with default timings, no cwd fallback and a scripted probe
pub fn watcher(probe: ScriptedProbe) -> ArtifactWatcher {
    ArtifactWatcher::new()
        .with_policy(StabilityPolicy::default())
        .with_fallback_dir(None)
        .with_probe(probe)
}

/// Linux dispatcher over a recording host
pub fn dispatcher(host: Arc<RecordingHost>) -> PlaybackDispatcher {
    PlaybackDispatcher::new(Platform::Linux).with_host(host as Arc<dyn PlayerHost>)
}

/// Session writing into `dir` with every external effect faked
pub fn session(
    dir: &Path,
    model: FakeModel,
    tts: ScriptedTts,
    probe: ScriptedProbe,
    host: Arc<RecordingHost>,
) -> AssistantSession {
    let voice = VoiceOutput::new(Box::new(tts), dir.to_path_buf(), "es")
        .with_watcher(watcher(probe))
        .with_dispatcher(dispatcher(host));
    AssistantSession::new(Box::new(model), voice)
}
