//! Audio playback through the platform's command-line players
//!
//! Each platform maps to an ordered list of player strategies. The first
//! strategy that resolves on this machine is invoked; availability is probed
//! by path existence or `PATH` lookup, never by trial execution. Playback
//! never returns an error: failures become a [`PlaybackOutcome`].

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;

/// Fixed location of the macOS system player
pub const AFPLAY_PATH: &str = "/usr/bin/afplay";

/// Operating system family used to pick player strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Unknown,
}

impl Platform {
    /// Platform of the running process
    #[must_use]
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier (as in `std::env::consts::OS`) to a platform
    #[must_use]
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Self::Linux,
            "windows" => Self::Windows,
            _ => Self::Unknown,
        }
    }
}

/// Result of trying to play one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The player ran and exited successfully
    Played { player: String },
    /// No strategy resolved on this platform
    NoPlayerAvailable,
    /// The chosen player failed to spawn or exited abnormally
    PlaybackError(String),
}

impl PlaybackOutcome {
    #[must_use]
    pub const fn is_played(&self) -> bool {
        matches!(self, Self::Played { .. })
    }
}

/// A resolved player command line (file path already appended)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    fn new(program: impl Into<PathBuf>, args: &[&str], file: &Path) -> Self {
        let mut args: Vec<OsString> = args.iter().map(OsString::from).collect();
        args.push(file.as_os_str().to_os_string());
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Caret-escape cmd.exe metacharacters in a path passed to `cmd /C`
///
/// Paths containing whitespace are left alone: they are quoted on the
/// command line, and cmd treats the metacharacters inside quotes as
/// literals. `%VAR%` sequences are still expanded by cmd in either case.
#[must_use]
pub fn escape_for_cmd(file: &Path) -> PathBuf {
    let raw = file.to_string_lossy();
    if raw.chars().any(char::is_whitespace) {
        return file.to_path_buf();
    }

    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    PathBuf::from(escaped)
}

/// How a player process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerExit {
    Success,
    /// Non-zero exit; `None` when terminated by a signal
    Failed(Option<i32>),
}

/// Machine capabilities the dispatcher needs
#[async_trait]
pub trait PlayerHost: Send + Sync {
    /// Whether a fixed path exists
    fn exists(&self, path: &Path) -> bool;

    /// Resolve a program name on `PATH`
    fn lookup(&self, program: &str) -> Option<PathBuf>;

    /// Run a player to completion
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned or waited on
    async fn run(&self, invocation: &Invocation) -> io::Result<PlayerExit>;
}

/// The real machine: `which` lookups and blocking child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

#[async_trait]
impl PlayerHost for SystemHost {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn lookup(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn run(&self, invocation: &Invocation) -> io::Result<PlayerExit> {
        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .status()
            .await?;

        Ok(if status.success() {
            PlayerExit::Success
        } else {
            PlayerExit::Failed(status.code())
        })
    }
}

type Resolver = Arc<dyn Fn(&dyn PlayerHost, &Path) -> Option<Invocation> + Send + Sync>;

/// One way of playing a file, if the machine supports it
#[derive(Clone)]
pub struct PlayerStrategy {
    name: String,
    resolve: Resolver,
}

impl std::fmt::Debug for PlayerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PlayerStrategy {
    /// Strategy from an arbitrary resolver function
    pub fn new(
        name: impl Into<String>,
        resolve: impl Fn(&dyn PlayerHost, &Path) -> Option<Invocation> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// Player at a fixed path, available when that path exists
    #[must_use]
    pub fn fixed_path(path: &'static str, args: &'static [&'static str]) -> Self {
        let name = Path::new(path)
            .file_name()
            .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
        Self::new(name, move |host, file| {
            host.exists(Path::new(path))
                .then(|| Invocation::new(path, args, file))
        })
    }

    /// Player found by `PATH` lookup
    #[must_use]
    pub fn on_path(program: &'static str, args: &'static [&'static str]) -> Self {
        Self::new(program, move |host, file| {
            host.lookup(program)
                .map(|resolved| Invocation::new(resolved, args, file))
        })
    }

    /// Platform handler that is always present (`open`, `cmd /C start`)
    #[must_use]
    pub fn builtin(program: &'static str, args: &'static [&'static str]) -> Self {
        Self::new(program, move |_, file| Some(Invocation::new(program, args, file)))
    }

    /// User-supplied command line such as `mpv --no-video`
    ///
    /// Returns `None` for an empty command.
    #[must_use]
    pub fn custom(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        let args: Vec<String> = parts.collect();

        Some(Self::new(program.clone(), move |host, file| {
            let resolved = if Path::new(&program).is_absolute() {
                host.exists(Path::new(&program))
                    .then(|| PathBuf::from(&program))
            } else {
                host.lookup(&program)
            };
            let resolved = resolved?;
            let mut argv: Vec<OsString> = args.iter().map(OsString::from).collect();
            argv.push(file.as_os_str().to_os_string());
            Some(Invocation {
                program: resolved,
                args: argv,
            })
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve against the host, or `None` if unavailable
    #[must_use]
    pub fn resolve(&self, host: &dyn PlayerHost, file: &Path) -> Option<Invocation> {
        (self.resolve)(host, file)
    }
}

/// Platform → ordered player strategies
#[derive(Debug, Clone, Default)]
pub struct PlaybackTable {
    entries: HashMap<Platform, Vec<PlayerStrategy>>,
}

impl PlaybackTable {
    /// Built-in players for each supported platform
    #[must_use]
    pub fn defaults() -> Self {
        let mut table = Self::default();
        table.insert(
            Platform::MacOs,
            vec![
                PlayerStrategy::fixed_path(AFPLAY_PATH, &[]),
                PlayerStrategy::builtin("open", &["-W"]),
            ],
        );
        table.insert(
            Platform::Linux,
            vec![
                PlayerStrategy::on_path("paplay", &[]),
                PlayerStrategy::on_path("aplay", &["-q"]),
                PlayerStrategy::on_path("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
                PlayerStrategy::on_path("play", &["-q"]),
            ],
        );
        table.insert(
            Platform::Windows,
            vec![PlayerStrategy::new("cmd", |_, file| {
                Some(Invocation::new(
                    "cmd",
                    &["/C", "start", "", "/WAIT"],
                    &escape_for_cmd(file),
                ))
            })],
        );
        table
    }

    /// Replace the strategies for a platform
    pub fn insert(&mut self, platform: Platform, strategies: Vec<PlayerStrategy>) {
        self.entries.insert(platform, strategies);
    }

    /// Put a strategy ahead of the existing ones for a platform
    pub fn prepend(&mut self, platform: Platform, strategy: PlayerStrategy) {
        self.entries.entry(platform).or_default().insert(0, strategy);
    }

    /// Strategies for a platform, empty if none are known
    #[must_use]
    pub fn strategies(&self, platform: Platform) -> &[PlayerStrategy] {
        self.entries.get(&platform).map_or(&[], Vec::as_slice)
    }
}

/// Plays artifacts with the best available player
#[derive(Clone)]
pub struct PlaybackDispatcher {
    platform: Platform,
    table: PlaybackTable,
    host: Arc<dyn PlayerHost>,
}

impl std::fmt::Debug for PlaybackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDispatcher")
            .field("platform", &self.platform)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Default for PlaybackDispatcher {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl PlaybackDispatcher {
    /// Dispatcher for a platform using the default table and the real host
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            table: PlaybackTable::defaults(),
            host: Arc::new(SystemHost),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn PlayerHost>) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn with_table(mut self, table: PlaybackTable) -> Self {
        self.table = table;
        self
    }

    /// Prefer a user-configured player command on this platform
    #[must_use]
    pub fn with_player(mut self, command: Option<&str>) -> Self {
        if let Some(strategy) = command.and_then(PlayerStrategy::custom) {
            self.table.prepend(self.platform, strategy);
        }
        self
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// The first strategy available for `file`, with its command line
    #[must_use]
    pub fn select(&self, file: &Path) -> Option<(&PlayerStrategy, Invocation)> {
        self.table
            .strategies(self.platform)
            .iter()
            .find_map(|s| s.resolve(self.host.as_ref(), file).map(|inv| (s, inv)))
    }

    /// Play one file; failures are logged and returned, never raised
    pub async fn play(&self, file: &Path) -> PlaybackOutcome {
        let Some((strategy, invocation)) = self.select(file) else {
            tracing::warn!(
                platform = ?self.platform,
                "No suitable audio player found; install one (e.g. afplay, paplay, aplay, ffplay) or set audio.player"
            );
            return PlaybackOutcome::NoPlayerAvailable;
        };

        let player = strategy.name().to_string();
        tracing::debug!("Playing via {player}: {}", file.display());

        match self.host.run(&invocation).await {
            Ok(PlayerExit::Success) => PlaybackOutcome::Played { player },
            Ok(PlayerExit::Failed(code)) => {
                let detail = code.map_or_else(
                    || format!("{player} terminated by signal"),
                    |c| format!("{player} exited with code {c}"),
                );
                tracing::warn!("Could not auto-play audio: {detail}");
                PlaybackOutcome::PlaybackError(detail)
            }
            Err(e) => {
                let detail = format!("failed to run {player}: {e}");
                tracing::warn!("Could not auto-play audio: {detail}");
                PlaybackOutcome::PlaybackError(detail)
            }
        }
    }
}
