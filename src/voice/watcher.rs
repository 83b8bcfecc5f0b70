//! Discovery and stabilization of synthesized audio files
//!
//! A detached synthesizer may still be flushing its output after the call
//! returns, so readiness is inferred from the file size: once two
//! consecutive samples agree (and are non-zero) the write is assumed to be
//! done. The poll is bounded; a file that never settles is
//! still handed to playback, but the outcome says so.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Default interval between size samples
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of size samples before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between synthesis returning and the first directory scan
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// File extension of synthesized artifacts
pub const ARTIFACT_EXTENSION: &str = "wav";

/// A synthesized audio file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

impl AudioArtifact {
    /// Create an artifact from already-known attributes
    #[must_use]
    pub const fn new(path: PathBuf, modified: SystemTime, size: u64) -> Self {
        Self {
            path,
            modified,
            size,
        }
    }

    /// Read path metadata from the filesystem
    ///
    /// A filesystem that does not report modification times yields the Unix
    /// epoch so the artifact still sorts deterministically.
    ///
    /// # Errors
    ///
    /// Returns error if the file metadata cannot be read
    pub fn from_path(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self::new(path, modified, metadata.len()))
    }

    /// Path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time observed at discovery
    #[must_use]
    pub const fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Size in bytes observed at discovery
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.modified
            .cmp(&other.modified)
            .then_with(|| self.path.file_name().cmp(&other.path.file_name()))
    }
}

/// Sort artifacts by modification time, oldest first, ties broken by name
#[must_use]
pub fn order_chronologically(mut artifacts: Vec<AudioArtifact>) -> Vec<AudioArtifact> {
    artifacts.sort_by(AudioArtifact::chronological_cmp);
    artifacts
}

/// The artifacts produced for one request prefix, in playback order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactBatch {
    artifacts: Vec<AudioArtifact>,
}

impl ArtifactBatch {
    /// Build a batch; members are put into chronological order
    #[must_use]
    pub fn new(artifacts: Vec<AudioArtifact>) -> Self {
        Self {
            artifacts: order_chronologically(artifacts),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Iterate in playback order
    pub fn iter(&self) -> std::slice::Iter<'_, AudioArtifact> {
        self.artifacts.iter()
    }

    /// Paths in playback order
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.artifacts.iter().map(AudioArtifact::path).collect()
    }
}

impl IntoIterator for ArtifactBatch {
    type Item = AudioArtifact;
    type IntoIter = std::vec::IntoIter<AudioArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArtifactBatch {
    type Item = &'a AudioArtifact;
    type IntoIter = std::slice::Iter<'a, AudioArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}

/// Result of waiting for an artifact's size to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Two consecutive samples matched and were non-zero
    Stable { samples: u32, size: u64 },
    /// The sample budget ran out; the file may be truncated
    GaveUp { samples: u32, last_size: u64 },
}

impl Stability {
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Stable { .. })
    }

    /// Number of size samples taken
    #[must_use]
    pub const fn samples(&self) -> u32 {
        match self {
            Self::Stable { samples, .. } | Self::GaveUp { samples, .. } => *samples,
        }
    }
}

/// Sampling budget for [`ArtifactWatcher::await_stable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Delay between consecutive samples
    pub poll_interval: Duration,
    /// Total samples before giving up (at least one is always taken)
    pub max_attempts: u32,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Source of file size samples
pub trait SizeProbe: Send + Sync {
    /// Current size of the file in bytes
    ///
    /// # Errors
    ///
    /// Returns error if the size cannot be determined
    fn size(&self, path: &Path) -> io::Result<u64>;
}

/// Samples sizes from filesystem metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl SizeProbe for FsProbe {
    fn size(&self, path: &Path) -> io::Result<u64> {
        std::fs::metadata(path).map(|m| m.len())
    }
}

/// Turns asynchronously written files into an ordered, ready-to-play batch
pub struct ArtifactWatcher {
    policy: StabilityPolicy,
    settle_delay: Duration,
    fallback_dir: Option<PathBuf>,
    probe: Box<dyn SizeProbe>,
}

impl Default for ArtifactWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArtifactWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWatcher")
            .field("policy", &self.policy)
            .field("settle_delay", &self.settle_delay)
            .field("fallback_dir", &self.fallback_dir)
            .finish_non_exhaustive()
    }
}

impl ArtifactWatcher {
    /// Create a watcher with default timings, falling back to the current
    /// working directory when the output directory has no matches
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: StabilityPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            fallback_dir: std::env::current_dir().ok(),
            probe: Box::new(FsProbe),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: StabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Directory checked once when the primary directory has no matches
    #[must_use]
    pub fn with_fallback_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.fallback_dir = dir;
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: impl SizeProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub const fn policy(&self) -> StabilityPolicy {
        self.policy
    }

    /// Give the synthesizer time to create its first file
    pub async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    /// Find the `{prefix}_*.wav` files for one request
    ///
    /// Scans `directory` first and the fallback directory only if that finds
    /// nothing. An empty batch is a normal outcome.
    #[must_use]
    pub fn discover(&self, directory: &Path, prefix: &str) -> ArtifactBatch {
        let found = scan(directory, prefix);
        if !found.is_empty() {
            return ArtifactBatch::new(found);
        }

        let Some(fallback) = self.fallback_dir.as_deref() else {
            return ArtifactBatch::default();
        };
        if fallback == directory {
            return ArtifactBatch::default();
        }

        tracing::debug!(
            dir = %directory.display(),
            fallback = %fallback.display(),
            prefix,
            "no artifacts in output dir, checking fallback"
        );
        ArtifactBatch::new(scan(fallback, prefix))
    }

    /// Wait until the artifact's size stops changing, within the budget
    pub async fn await_stable(&self, artifact: &AudioArtifact) -> Stability {
        let path = artifact.path();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut previous = self.sample(path);
        let mut samples = 1;

        while samples < max_attempts {
            tokio::time::sleep(self.policy.poll_interval).await;
            let current = self.sample(path);
            samples += 1;

            if current == previous && current > 0 {
                tracing::debug!(path = %path.display(), samples, size = current, "artifact stable");
                return Stability::Stable {
                    samples,
                    size: current,
                };
            }
            previous = current;
        }

        Stability::GaveUp {
            samples,
            last_size: previous,
        }
    }

    fn sample(&self, path: &Path) -> u64 {
        self.probe.size(path).unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), error = %e, "size sample failed");
            0
        })
    }
}

/// List matching artifacts in one directory; unreadable directories are empty
fn scan(directory: &Path, prefix: &str) -> Vec<AudioArtifact> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %directory.display(), error = %e, "cannot read directory");
            return Vec::new();
        }
    };

    let stem = format!("{prefix}_");
    let suffix = format!(".{ARTIFACT_EXTENSION}");

    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry.file_name().to_str().is_some_and(|name| {
                name.starts_with(&stem) && name.ends_with(&suffix) && name.len() > stem.len()
            })
        })
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| AudioArtifact::from_path(entry.path()).ok())
        .collect()
}
