// Integration tests for the session controller
//
// These tests wire a controller to fakes and exercise it the way a
// presentation layer would: issue commands, read snapshots, watch the observer.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{server_error, BackendProbe, FakeApi, FakeBackend, FakeLoader, RecordingObserver, REPLY_AUDIO_URL};
use std::sync::Arc;
use std::time::Duration;
use svenska_practice::config::Config;
use svenska_practice::error::PracticeError;
use svenska_practice::playback::PlaybackHandle;
use svenska_practice::recording::RecordingState;
use svenska_practice::session::{
    Collaborators, Command, CommandOutcome, FileLevelStore, LevelStore, MemoryLevelStore,
    PersistedLevel, ProficiencyLevel, ScenarioKind, SessionController, SCENARIO_FAILED_TEXT,
};
use tokio::sync::Notify;
use tokio::time::Instant;

struct Harness {
    api: Arc<FakeApi>,
    loader: Arc<FakeLoader>,
    observer: Arc<RecordingObserver>,
    probe: Arc<BackendProbe>,
    controller: Arc<SessionController>,
}

fn harness_with(api: FakeApi, backend: FakeBackend, store: Arc<dyn LevelStore>) -> Harness {
    harness_with_loader(api, backend, store, FakeLoader::default())
}

fn harness_with_loader(
    api: FakeApi,
    backend: FakeBackend,
    store: Arc<dyn LevelStore>,
    loader: FakeLoader,
) -> Harness {
    let api = Arc::new(api);
    let loader = Arc::new(loader);
    let observer = Arc::new(RecordingObserver::default());
    let probe = backend.probe();

    let controller = SessionController::new(
        Collaborators {
            api: api.clone(),
            backend: Box::new(backend),
            loader: loader.clone(),
            store,
            observer: observer.clone(),
        },
        &Config::default(),
    );

    Harness {
        api,
        loader,
        observer,
        probe,
        controller: Arc::new(controller),
    }
}

fn harness(api: FakeApi, backend: FakeBackend) -> Harness {
    harness_with(api, backend, Arc::new(MemoryLevelStore::default()))
}

async fn speak_one_turn(h: &Harness) {
    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording(&PlaybackHandle::new()).await.unwrap();
}

// ============================================================================
// Recording and exchanges
// ============================================================================

#[tokio::test]
async fn test_600_byte_recording_never_reaches_pipeline() {
    // 278 samples * 2 bytes + 44 byte header = 600 bytes
    let h = harness(FakeApi::new(), FakeBackend::with_frames(vec![vec![100i16; 278]]));

    h.controller.start_recording().await.unwrap();
    let result = h.controller.stop_recording(&PlaybackHandle::new()).await;

    assert!(matches!(
        result,
        Err(PracticeError::TooShortRecording { size: 600, min: 1000 })
    ));
    assert_eq!(h.api.transcribe_calls(), 0);
    assert!(h.controller.snapshot().messages.is_empty());
    assert_eq!(h.observer.notices().len(), 1, "User is told the recording was too short");
    assert!(h.observer.pipeline_errors().is_empty());
}

#[tokio::test]
async fn test_dispatch_runs_a_full_turn() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(5));

    let started = h.controller.dispatch(Command::StartRecording).await.unwrap();
    assert!(matches!(started, CommandOutcome::Done));
    assert_eq!(h.controller.snapshot().recording, RecordingState::Recording);

    let playback = PlaybackHandle::new();
    let outcome = h
        .controller
        .dispatch(Command::StopRecording {
            playback: playback.clone(),
        })
        .await
        .unwrap();

    let CommandOutcome::Exchange(exchange) = outcome else {
        panic!("expected an exchange");
    };
    assert_eq!(exchange.transcript, "Hej, jag vill ha en kaffe");

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.messages.len(), 2);
    assert!(snapshot.messages.iter().all(|m| !m.placeholder));
    assert!(!snapshot.pipeline_busy);
    assert_eq!(snapshot.recording, RecordingState::Idle);
    assert!(playback.clip().is_some());
    assert_eq!(h.probe.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_volume_samples_reach_observer_while_recording() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(5));

    h.controller.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.controller.stop_recording(&PlaybackHandle::new()).await.unwrap();

    let samples = h.observer.volume_samples.load(std::sync::atomic::Ordering::SeqCst);
    assert!(samples >= 3, "expected several volume samples, got {}", samples);
}

#[tokio::test]
async fn test_permission_denied_is_reported_without_log_changes() {
    let h = harness(FakeApi::new(), FakeBackend::denying());

    let result = h.controller.start_recording().await;

    assert!(matches!(result, Err(PracticeError::PermissionDenied)));
    assert_eq!(h.controller.snapshot().recording, RecordingState::Idle);
    assert!(h.controller.snapshot().messages.is_empty());
    assert_eq!(h.observer.notices().len(), 1);
}

#[tokio::test]
async fn test_pipeline_failure_notifies_observer() {
    let api = FakeApi::new().with_reply(Err(server_error(500)));
    let h = harness(api, FakeBackend::speaking(5));

    h.controller.start_recording().await.unwrap();
    let result = h.controller.stop_recording(&PlaybackHandle::new()).await;

    assert!(matches!(result, Err(PracticeError::Server { status: 500, .. })));
    assert_eq!(h.observer.pipeline_errors().len(), 1);
    assert!(h.observer.notices().iter().any(|n| n.contains("500")));
    assert_eq!(h.controller.snapshot().messages.len(), 1, "User message stays");
}

#[tokio::test]
async fn test_cancel_recording_discards_audio() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(5));

    h.controller.start_recording().await.unwrap();
    h.controller.dispatch(Command::CancelRecording).await.unwrap();

    assert_eq!(h.controller.snapshot().recording, RecordingState::Idle);
    assert_eq!(h.probe.stops(), 1);
    assert_eq!(h.api.transcribe_calls(), 0);
}

// ============================================================================
// Proficiency level
// ============================================================================

#[tokio::test]
async fn test_level_restored_from_23_hour_old_record() {
    let record = PersistedLevel::new(ProficiencyLevel::B2, Utc::now() - ChronoDuration::hours(23));
    let h = harness_with(
        FakeApi::new(),
        FakeBackend::speaking(1),
        Arc::new(MemoryLevelStore::with_record(record)),
    );

    assert_eq!(h.controller.level(), ProficiencyLevel::B2);
}

#[tokio::test]
async fn test_25_hour_old_record_falls_back_to_default() {
    let record = PersistedLevel::new(ProficiencyLevel::B2, Utc::now() - ChronoDuration::hours(25));
    let h = harness_with(
        FakeApi::new(),
        FakeBackend::speaking(1),
        Arc::new(MemoryLevelStore::with_record(record)),
    );

    assert_eq!(h.controller.level(), ProficiencyLevel::default());
    assert_eq!(h.controller.level(), ProficiencyLevel::A2);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_level_changes_coalesce_into_one_write() {
    let store = Arc::new(MemoryLevelStore::default());
    let h = harness_with(FakeApi::new(), FakeBackend::speaking(1), store.clone());

    h.controller.select_level(ProficiencyLevel::B1).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.controller.select_level(ProficiencyLevel::B2).unwrap();
    h.controller
        .dispatch(Command::SelectLevel(ProficiencyLevel::C1))
        .await
        .unwrap();
    assert_eq!(store.writes(), 0, "Nothing written during the quiet period");

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(store.writes(), 1);
    assert_eq!(store.current().map(|r| r.current_level), Some(ProficiencyLevel::C1));
    assert_eq!(h.controller.snapshot().level, ProficiencyLevel::C1);
}

#[tokio::test(start_paused = true)]
async fn test_selected_level_is_written_to_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileLevelStore::new(dir.path()));
    let h = harness_with(FakeApi::new(), FakeBackend::speaking(1), store.clone());

    h.controller.select_level(ProficiencyLevel::C2).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"currentLevel\":\"C2\""), "unexpected record: {}", raw);
    assert!(raw.contains("\"timestamp\""));
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_new_scenario_clears_conversation() {
    let api = FakeApi::new().with_scenario(Ok("Du köper en tågbiljett.".to_string()));
    let h = harness(api, FakeBackend::speaking(5));
    speak_one_turn(&h).await;
    assert_eq!(h.controller.snapshot().messages.len(), 2);

    let outcome = h
        .controller
        .dispatch(Command::GenerateScenario(ScenarioKind::Random))
        .await
        .unwrap();

    assert!(matches!(outcome, CommandOutcome::Scenario(ref s) if s == "Du köper en tågbiljett."));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.scenario, "Du köper en tågbiljett.");
    assert!(snapshot.messages.is_empty());
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn test_short_custom_situation_makes_no_request() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(1));

    let result = h
        .controller
        .generate_scenario(ScenarioKind::Custom("  ab  ".to_string()))
        .await;

    assert!(matches!(result, Err(PracticeError::InvalidSituation { min: 3 })));
    assert_eq!(h.api.scenario_calls(), 0);
    assert_eq!(h.observer.notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_retries_then_shows_failure() {
    let api = FakeApi::new()
        .with_scenario(Err(server_error(503)))
        .with_scenario(Err(server_error(503)))
        .with_scenario(Err(PracticeError::Network("timeout".into())))
        .with_scenario(Err(server_error(503)));
    let h = harness(api, FakeBackend::speaking(1));
    let started = Instant::now();

    let result = h.controller.generate_scenario(ScenarioKind::Random).await;

    assert!(matches!(result, Err(PracticeError::RetryExhausted { attempts: 4, .. })));
    assert_eq!(h.api.scenario_calls(), 4, "Initial attempt plus three retries");
    // 1s + 2s + 3s of backoff
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert!(started.elapsed() < Duration::from_secs(7));

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.scenario, SCENARIO_FAILED_TEXT);
    assert!(!snapshot.is_loading);
    assert_eq!(h.observer.notices().len(), 1, "Notified once, after exhaustion");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_recovers_after_transient_failure() {
    let api = FakeApi::new()
        .with_scenario(Err(server_error(502)))
        .with_scenario(Ok("Du är hos läkaren.".to_string()));
    let h = harness(api, FakeBackend::speaking(1));

    let scenario = h.controller.generate_scenario(ScenarioKind::Random).await.unwrap();

    assert_eq!(scenario, "Du är hos läkaren.");
    assert_eq!(h.api.scenario_calls(), 2);
    assert!(h.observer.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_scenario_request_while_loading_is_rejected() {
    let api = FakeApi::new().with_scenario(Err(server_error(503)));
    let h = harness(api, FakeBackend::speaking(1));

    let first = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.generate_scenario(ScenarioKind::Random).await })
    };
    while h.api.scenario_calls() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(h.controller.snapshot().is_loading);

    let second = h.controller.generate_scenario(ScenarioKind::Random).await;
    assert!(matches!(second, Err(PracticeError::ConcurrentPipelineRejected)));

    first.await.unwrap().unwrap();
    assert!(!h.controller.snapshot().is_loading);
    assert_eq!(h.api.scenario_calls(), 2);
}

// ============================================================================
// Study aids
// ============================================================================

#[tokio::test]
async fn test_example_dialogue_needs_a_scenario() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(1));

    let early = h.controller.example_dialogue().await;
    assert!(matches!(early, Err(PracticeError::InvalidState(_))));

    let scenario = h.controller.generate_scenario(ScenarioKind::Random).await.unwrap();
    let outcome = h.controller.dispatch(Command::ExampleDialogue).await.unwrap();
    let CommandOutcome::Dialogue(dialogue) = outcome else {
        panic!("expected a dialogue");
    };
    assert!(dialogue.dialog.contains(&scenario));
    assert_eq!(dialogue.level, ProficiencyLevel::A2);
}

#[tokio::test]
async fn test_review_covers_committed_history() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(5));

    let early = h.controller.review_conversation().await;
    assert!(matches!(early, Err(PracticeError::InvalidState(_))));

    speak_one_turn(&h).await;
    let outcome = h.controller.dispatch(Command::ReviewConversation).await.unwrap();
    let CommandOutcome::Review(review) = outcome else {
        panic!("expected a review");
    };
    assert_eq!(review.message_count, 2);
    assert_eq!(h.api.review_requests.lock().unwrap()[0].messages.len(), 2);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_teardown_releases_everything() {
    let h = harness(FakeApi::new(), FakeBackend::speaking(5));
    speak_one_turn(&h).await;
    h.controller.start_recording().await.unwrap();

    h.controller.dispatch(Command::Teardown).await.unwrap();

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.recording, RecordingState::Idle);
    assert!(snapshot.messages.is_empty());
    assert_eq!(h.probe.stops(), 2, "Active capture released");
    assert_eq!(h.loader.released(), vec![REPLY_AUDIO_URL.to_string()]);
    assert!(h.controller.is_closed());

    let after = h.controller.start_recording().await;
    assert!(matches!(after, Err(PracticeError::InvalidState(_))));

    // Idempotent
    h.controller.teardown().await;
    assert_eq!(h.loader.released().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_scenario_retries() {
    let api = FakeApi::new()
        .with_scenario(Err(server_error(503)))
        .with_scenario(Err(server_error(503)))
        .with_scenario(Err(server_error(503)))
        .with_scenario(Err(server_error(503)));
    let h = harness(api, FakeBackend::speaking(1));

    let pending = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.generate_scenario(ScenarioKind::Random).await })
    };
    // First attempt failed; the retry is waiting out its 1s backoff
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.api.scenario_calls(), 1);

    let torn_down = Instant::now();
    h.controller.teardown().await;
    let result = pending.await.unwrap();

    assert!(matches!(result, Err(PracticeError::SessionInvalidated)));
    assert!(torn_down.elapsed() < Duration::from_millis(100), "Backoff abandoned");
    assert_eq!(h.api.scenario_calls(), 1, "No attempts after teardown");
    assert_ne!(h.controller.scenario(), SCENARIO_FAILED_TEXT);
    assert!(h.observer.notices().is_empty());
}

#[tokio::test]
async fn test_teardown_during_clip_download_leaves_nothing_cached() {
    let gate = Arc::new(Notify::new());
    let h = harness_with_loader(
        FakeApi::new(),
        FakeBackend::speaking(5),
        Arc::new(MemoryLevelStore::default()),
        FakeLoader::default().with_gate(gate.clone()),
    );
    h.controller.start_recording().await.unwrap();

    let turn = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.stop_recording(&PlaybackHandle::new()).await })
    };
    while h.loader.load_calls() == 0 {
        tokio::task::yield_now().await;
    }

    h.controller.teardown().await;
    gate.notify_one();
    let result = turn.await.unwrap();

    assert!(matches!(result, Err(PracticeError::SessionInvalidated)));
    assert_eq!(h.loader.released(), vec![REPLY_AUDIO_URL.to_string()]);
    assert!(h.controller.snapshot().messages.is_empty());
    assert!(h.observer.notices().is_empty());
}
