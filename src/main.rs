use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use julia_assistant::config::{Overrides, file::config_file_path};
use julia_assistant::{AssistantSession, Config, PlaybackOutcome, VoiceOutput, logging, repl};

/// Julia - offline chat with spoken replies
#[derive(Parser)]
#[command(name = "julia", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv); `[DEBUG]` lines are shown by default
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language model backend ("ollama" or "openai")
    #[arg(long, env = "JULIA_LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// Language model server URL
    #[arg(long, env = "JULIA_LLM_URL")]
    llm_url: Option<String>,

    /// Model identifier
    #[arg(short, long, env = "JULIA_MODEL")]
    model: Option<String>,

    /// Speech backend ("command" or "openai")
    #[arg(long, env = "JULIA_TTS_PROVIDER")]
    tts_provider: Option<String>,

    /// Speech API URL (openai backend)
    #[arg(long, env = "JULIA_TTS_URL")]
    tts_url: Option<String>,

    /// Language code for speech synthesis
    #[arg(short, long, env = "JULIA_LANGUAGE")]
    language: Option<String>,

    /// Directory synthesized audio is written to
    #[arg(long, env = "JULIA_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Preferred audio player command
    #[arg(long, env = "JULIA_PLAYER")]
    player: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play an audio file through the platform player
    Play {
        /// WAV file to play
        file: PathBuf,
    },
    /// Synthesize text and play it, without the language model
    Say {
        /// Text to speak
        #[arg(default_value = "Hola, soy Julia. Esto es una prueba de voz.")]
        text: String,
    },
    /// Show the resolved configuration
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            llm_provider: self.llm_provider.clone(),
            llm_url: self.llm_url.clone(),
            model: self.model.clone(),
            tts_provider: self.tts_provider.clone(),
            tts_url: self.tts_url.clone(),
            language: self.language.clone(),
            output_dir: self.output_dir.clone(),
            player: self.player.clone(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.overrides())?;
    tracing::debug!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        output_dir = %config.audio.output_dir.display(),
        "loaded configuration"
    );

    match cli.command {
        Some(Command::Play { file }) => play(&config, &file).await,
        Some(Command::Say { text }) => say(&config, &text).await,
        Some(Command::Config) => {
            show_config(&config);
            Ok(())
        }
        None => chat(&config).await,
    }
}

/// Interactive session: load the model once, then loop
async fn chat(config: &Config) -> anyhow::Result<()> {
    let session = AssistantSession::from_config(config).await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let turns = repl::run(&session, stdin, tokio::io::stdout()).await?;
    tracing::debug!(turns, "session ended");

    Ok(())
}

/// Play one file through the dispatcher
async fn play(config: &Config, file: &std::path::Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let dispatcher = config.dispatcher();
    println!("Playing {} on {:?}...", file.display(), dispatcher.platform());

    match dispatcher.play(file).await {
        PlaybackOutcome::Played { player } => println!("Played via {player}"),
        PlaybackOutcome::NoPlayerAvailable => println!("No audio player available"),
        PlaybackOutcome::PlaybackError(detail) => println!("Playback failed: {detail}"),
    }

    Ok(())
}

/// Synthesize and play text without the model
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Synthesizing: \"{text}\"");

    let voice = VoiceOutput::from_config(config)?;
    let (prefix, played) = voice.speak(text).await?;

    println!(
        "{} file(s) for {prefix} in {}",
        played.len(),
        voice.output_dir().display()
    );
    for item in &played {
        println!(
            "  {} -> {:?} ({:?})",
            item.artifact.path().display(),
            item.outcome,
            item.stability
        );
    }

    Ok(())
}

fn show_config(config: &Config) {
    match config_file_path() {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not present)", path.display()),
        None => println!("Config file: unavailable"),
    }
    println!("LLM:        {:?} {} @ {}", config.llm.provider, config.llm.model, config.llm.url);
    println!("Max tokens: {}", config.llm.max_tokens);
    println!("TTS:        {:?} (language {})", config.tts.provider, config.tts.language);
    println!("Output dir: {}", config.audio.output_dir.display());
    println!(
        "Player:     {}",
        config.audio.player.as_deref().unwrap_or("platform default")
    );
    println!(
        "Readiness:  settle {:?}, poll {:?} x {}",
        config.audio.settle_delay, config.audio.poll_interval, config.audio.max_attempts
    );
}
