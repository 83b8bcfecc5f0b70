//! Turn pipeline integration tests
//!
//! Model, synthesizer, size sampling and players are all faked; files are
//! real and live in a temporary directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use julia_assistant::voice::ArtifactWatcher;
use julia_assistant::{Completion, PlaybackOutcome, Stability, VoiceOutput};

mod common;

use common::{FakeModel, RecordingHost, ScriptedProbe, ScriptedTts};

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF").unwrap();
    path
}

fn names(paths: &[&Path]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_discover_matches_prefix_only() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "reply_100_0.wav");
    touch(dir.path(), "reply_100_1.wav");
    touch(dir.path(), "other_5.wav");
    touch(dir.path(), "reply_1000_0.wav");
    touch(dir.path(), "reply_100_0.txt");
    std::fs::create_dir(dir.path().join("reply_100_9.wav")).unwrap();

    let watcher = ArtifactWatcher::new().with_fallback_dir(None);
    let batch = watcher.discover(dir.path(), "reply_100");

    assert_eq!(names(&batch.paths()), vec!["reply_100_0.wav", "reply_100_1.wav"]);
}

#[test]
fn test_discover_uses_fallback_when_output_dir_is_empty() {
    let out = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    touch(cwd.path(), "reply_200_0.wav");

    let watcher = ArtifactWatcher::new().with_fallback_dir(Some(cwd.path().to_path_buf()));
    let batch = watcher.discover(out.path(), "reply_200");

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.paths()[0], cwd.path().join("reply_200_0.wav"));
}

#[test]
fn test_discover_prefers_output_dir_over_fallback() {
    let out = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    touch(out.path(), "reply_300_0.wav");
    touch(cwd.path(), "reply_300_1.wav");

    let watcher = ArtifactWatcher::new().with_fallback_dir(Some(cwd.path().to_path_buf()));
    let batch = watcher.discover(out.path(), "reply_300");

    assert_eq!(batch.paths(), vec![out.path().join("reply_300_0.wav").as_path()]);
}

#[test]
fn test_discover_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = ArtifactWatcher::new().with_fallback_dir(None);

    assert!(watcher.discover(&dir.path().join("nope"), "reply_1").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_playback_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let growing: Vec<u64> = (1..=20).map(|n| n * 1000).collect();
    let probe = ScriptedProbe::default()
        .script("_0.wav", &growing)
        .script("_1.wav", &[100, 200, 200]);
    let host = Arc::new(RecordingHost::with_programs(&["aplay"]).failing_on("_0.wav"));
    let session = common::session(
        dir.path(),
        FakeModel::replying(&["Hola, soy Julia."]),
        ScriptedTts::writing(&["_0.wav", "_1.wav"]),
        probe.clone(),
        Arc::clone(&host),
    );

    let report = session.turn("hola").await.unwrap();
    let prefix = report.prefix.clone().unwrap();

    assert_eq!(report.artifacts.len(), 2);

    let first = &report.artifacts[0];
    assert_eq!(first.artifact.path(), dir.path().join(format!("{prefix}_0.wav")));
    assert_eq!(
        first.stability,
        Stability::GaveUp {
            samples: 10,
            last_size: 10_000
        }
    );
    assert!(matches!(first.outcome, PlaybackOutcome::PlaybackError(_)));

    let second = &report.artifacts[1];
    assert_eq!(second.artifact.path(), dir.path().join(format!("{prefix}_1.wav")));
    assert_eq!(second.stability, Stability::Stable { samples: 3, size: 200 });
    assert_eq!(
        second.outcome,
        PlaybackOutcome::Played {
            player: "aplay".to_string()
        }
    );

    assert_eq!(probe.calls("_0.wav"), 10);
    assert_eq!(probe.calls("_1.wav"), 3);
    assert_eq!(host.played().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_turn_formats_prompt_and_cleans_reply() {
    let dir = tempfile::tempdir().unwrap();
    let model = FakeModel::replying(&["  Hola!<|eot_id|>\n"]);
    let tts = ScriptedTts::writing(&["_0.wav"]);
    let session = common::session(
        dir.path(),
        model.clone(),
        tts.clone(),
        ScriptedProbe::default().script("_0.wav", &[64]),
        Arc::new(RecordingHost::with_programs(&["paplay"])),
    );

    let report = session.turn("hello").await.unwrap();

    assert_eq!(report.reply, "Hola!");
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("\n\nUser: hello\nAssistant:"));

    let requests = tts.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, "Hola!");
    assert_eq!(Some(requests[0].0.clone()), report.prefix);
}

#[tokio::test(start_paused = true)]
async fn test_turn_without_player_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::default());
    let session = common::session(
        dir.path(),
        FakeModel::default(),
        ScriptedTts::writing(&["_0.wav"]),
        ScriptedProbe::default().script("_0.wav", &[64]),
        Arc::clone(&host),
    );

    let report = session.turn("hello").await.unwrap();

    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].outcome, PlaybackOutcome::NoPlayerAvailable);
    assert!(host.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_turn_without_audio_reports_no_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::with_programs(&["aplay"]));
    let session = common::session(
        dir.path(),
        FakeModel::default(),
        ScriptedTts::default(),
        ScriptedProbe::default(),
        Arc::clone(&host),
    );

    let report = session.turn("hello").await.unwrap();

    assert_eq!(report.reply, "Hola!");
    assert!(report.prefix.is_some());
    assert!(report.artifacts.is_empty());
    assert!(host.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_reply_skips_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let tts = ScriptedTts::writing(&["_0.wav"]);
    let session = common::session(
        dir.path(),
        FakeModel::replying(&["<|eot_id|>  "]),
        tts.clone(),
        ScriptedProbe::default(),
        Arc::new(RecordingHost::with_programs(&["aplay"])),
    );

    let report = session.turn("hello").await.unwrap();

    assert!(report.reply.is_empty());
    assert!(report.prefix.is_none());
    assert!(tts.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_model_error_fails_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    model.push(Err("connection refused".to_string()));
    let tts = ScriptedTts::writing(&["_0.wav"]);
    let session = common::session(
        dir.path(),
        model,
        tts.clone(),
        ScriptedProbe::default(),
        Arc::new(RecordingHost::default()),
    );

    let err = session.turn("hello").await.unwrap_err();

    assert!(err.to_string().contains("connection refused"));
    assert!(tts.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_each_turn_gets_its_own_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::with_programs(&["aplay"]));
    let session = common::session(
        dir.path(),
        FakeModel::replying(&["uno", "dos"]),
        ScriptedTts::writing(&["_0.wav"]),
        ScriptedProbe::default().script("_0.wav", &[64]),
        Arc::clone(&host),
    );

    let first = session.turn("one").await.unwrap();
    let second = session.turn("two").await.unwrap();

    assert_ne!(first.prefix, second.prefix);
    assert_eq!(first.artifacts.len(), 1);
    assert_eq!(second.artifacts.len(), 1);
    assert_ne!(first.artifacts[0].artifact.path(), second.artifacts[0].artifact.path());
    assert_eq!(host.played().len(), 2);
}

fn voice(dir: &Path, tts: ScriptedTts, probe: ScriptedProbe, settle: Duration) -> VoiceOutput {
    let host = Arc::new(RecordingHost::with_programs(&["aplay"]));
    VoiceOutput::new(Box::new(tts), dir.to_path_buf(), "es")
        .with_watcher(common::watcher(probe).with_settle_delay(settle))
        .with_dispatcher(common::dispatcher(host))
}

#[tokio::test(start_paused = true)]
async fn test_detached_synthesis_waits_and_polls() {
    let dir = tempfile::tempdir().unwrap();
    let settle = Duration::from_millis(200);
    let probe = ScriptedProbe::default().script("_0.wav", &[4]);
    let voice = voice(
        dir.path(),
        ScriptedTts::writing(&["_0.wav"]).completing(Completion::Detached),
        probe.clone(),
        settle,
    );

    let start = tokio::time::Instant::now();
    let (_, played) = voice.speak("hola").await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(played.len(), 1);
    assert_eq!(played[0].stability, Stability::Stable { samples: 2, size: 4 });
    assert!(elapsed >= settle + Duration::from_millis(100));
    assert_eq!(probe.calls("_0.wav"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_finished_synthesis_skips_settle_and_polling() {
    let dir = tempfile::tempdir().unwrap();
    let probe = ScriptedProbe::default().script("_0.wav", &[4]);
    let voice = voice(
        dir.path(),
        ScriptedTts::writing(&["_0.wav"]).completing(Completion::Finished),
        probe.clone(),
        Duration::from_millis(200),
    );

    let start = tokio::time::Instant::now();
    let (_, played) = voice.speak("hola").await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(played.len(), 1);
    assert!(matches!(played[0].stability, Stability::Stable { samples: 0, .. }));
    assert!(played[0].outcome.is_played());
    assert!(elapsed.is_zero());
    assert_eq!(probe.calls("_0.wav"), 0);
}
