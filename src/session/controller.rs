use chrono::Utc;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::{Command, CommandOutcome, ScenarioKind};
use super::level::ProficiencyLevel;
use super::log::SharedLog;
use super::observer::SessionObserver;
use super::snapshot::SessionSnapshot;
use super::store::{restore_level, LevelStore, PersistedLevel};
use crate::api::{ExampleDialogue, PracticeApi, Review, ReviewRequest, ScenarioRequest};
use crate::audio::AudioBackend;
use crate::config::Config;
use crate::error::{PracticeError, Result};
use crate::pipeline::{BusyFlag, Exchange, ExchangeContext, RequestPipeline, RetryPolicy};
use crate::playback::{AudioResourceCache, ClipLoader, PlaybackHandle};
use crate::recording::{RecordingSession, RecordingState};

/// Scenario text shown when generation gave up
pub const SCENARIO_FAILED_TEXT: &str = "Could not create a scenario. Please try again.";

/// External services a controller is wired to
pub struct Collaborators {
    pub api: Arc<dyn PracticeApi>,
    pub backend: Box<dyn AudioBackend>,
    pub loader: Arc<dyn ClipLoader>,
    pub store: Arc<dyn LevelStore>,
    pub observer: Arc<dyn SessionObserver>,
}

struct ConversationState {
    level: ProficiencyLevel,
    scenario: String,
}

/// Owns the one conversation session and everything that mutates it.
///
/// Presentation code reads [`SessionSnapshot`]s and issues [`Command`]s;
/// every change is also pushed to the [`SessionObserver`].
pub struct SessionController {
    api: Arc<dyn PracticeApi>,
    store: Arc<dyn LevelStore>,
    observer: Arc<dyn SessionObserver>,
    log: SharedLog,
    pipeline: RequestPipeline,
    recorder: AsyncMutex<RecordingSession>,
    recording_state: watch::Receiver<RecordingState>,
    state: Mutex<ConversationState>,
    loading: BusyFlag,
    retry: RetryPolicy,
    min_unit_bytes: usize,
    min_situation_chars: usize,
    debounce: Duration,
    volume_task: Mutex<Option<JoinHandle<()>>>,
    persist_task: Mutex<Option<JoinHandle<()>>>,
    /// Cancelled on teardown; stops scenario retries and their backoff
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl SessionController {
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        let Collaborators {
            api,
            backend,
            loader,
            store,
            observer,
        } = collaborators;

        let level = match store.load() {
            Ok(Some(record)) => {
                match restore_level(&record, Utc::now(), config.persistence.freshness_window()) {
                    Some(level) => {
                        info!("Restored proficiency level {}", level);
                        level
                    }
                    None => {
                        debug!("Saved level is stale, using default");
                        ProficiencyLevel::default()
                    }
                }
            }
            Ok(None) => ProficiencyLevel::default(),
            Err(e) => {
                warn!("Failed to read saved level: {}", e);
                ProficiencyLevel::default()
            }
        };

        let log = SharedLog::new(Arc::clone(&observer));
        let cache = Arc::new(AudioResourceCache::new(loader, config.playback.cache_capacity));
        let pipeline = RequestPipeline::new(Arc::clone(&api), log.clone(), cache);
        let recorder = RecordingSession::new(backend, config.recording.clone(), Arc::clone(&observer));
        let recording_state = recorder.subscribe();

        Self {
            api,
            store,
            observer,
            log,
            pipeline,
            recorder: AsyncMutex::new(recorder),
            recording_state,
            state: Mutex::new(ConversationState {
                level,
                scenario: String::new(),
            }),
            loading: BusyFlag::new(),
            retry: RetryPolicy::from(&config.scenario),
            min_unit_bytes: config.recording.min_unit_bytes,
            min_situation_chars: config.scenario.min_situation_chars,
            debounce: config.persistence.debounce(),
            volume_task: Mutex::new(None),
            persist_task: Mutex::new(None),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(PracticeError::InvalidState("session is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn notify_failure(&self, error: &PracticeError) {
        self.observer.on_notice(&error.notice());
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (level, scenario) = {
            let state = self.state();
            (state.level, state.scenario.clone())
        };
        SessionSnapshot {
            level,
            scenario,
            messages: self.log.snapshot(),
            pipeline_busy: self.pipeline.is_busy(),
            is_loading: self.loading.is_busy(),
            recording: self.recording_state.borrow().clone(),
        }
    }

    pub fn level(&self) -> ProficiencyLevel {
        self.state().level
    }

    pub fn scenario(&self) -> String {
        self.state().scenario.clone()
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run one command
    pub async fn dispatch(&self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::StartRecording => self.start_recording().await.map(|_| CommandOutcome::Done),
            Command::StopRecording { playback } => self
                .stop_recording(&playback)
                .await
                .map(CommandOutcome::Exchange),
            Command::CancelRecording => {
                self.cancel_recording().await;
                Ok(CommandOutcome::Done)
            }
            Command::SelectLevel(level) => self.select_level(level).map(|_| CommandOutcome::Done),
            Command::GenerateScenario(kind) => self
                .generate_scenario(kind)
                .await
                .map(CommandOutcome::Scenario),
            Command::ExampleDialogue => self.example_dialogue().await.map(CommandOutcome::Dialogue),
            Command::ReviewConversation => self
                .review_conversation()
                .await
                .map(CommandOutcome::Review),
            Command::Teardown => {
                self.teardown().await;
                Ok(CommandOutcome::Done)
            }
        }
    }

    pub async fn start_recording(&self) -> Result<()> {
        self.ensure_open()?;

        let mut recorder = self.recorder.lock().await;
        if let Err(e) = recorder.start().await {
            self.notify_failure(&e);
            return Err(e);
        }
        self.observer.on_recording_started();

        if let Some(mut volume) = recorder.take_volume_stream() {
            let observer = Arc::clone(&self.observer);
            let task = tokio::spawn(async move {
                while let Some(sample) = volume.next().await {
                    observer.on_volume_sample(&sample);
                }
            });
            if let Some(previous) = lock(&self.volume_task).replace(task) {
                previous.abort();
            }
        }
        Ok(())
    }

    /// Stop recording and run the exchange for it.
    ///
    /// `playback` must be created in the same gesture that stopped the
    /// recording; it is filled once the partner reply arrives.
    pub async fn stop_recording(&self, playback: &PlaybackHandle) -> Result<Exchange> {
        self.ensure_open()?;

        let stopped = self.recorder.lock().await.stop().await;
        let unit = match stopped {
            Ok(unit) => unit,
            Err(e) => {
                self.notify_failure(&e);
                return Err(e);
            }
        };
        self.observer.on_recording_stopped(&unit);

        if let Err(e) = unit.ensure_min_size(self.min_unit_bytes) {
            info!("Discarding short recording: {}", e);
            self.notify_failure(&e);
            return Err(e);
        }

        let context = {
            let state = self.state();
            ExchangeContext {
                scenario: state.scenario.clone(),
                level: state.level,
            }
        };

        match self.pipeline.run(unit, context, playback).await {
            Ok(exchange) => Ok(exchange),
            Err(PracticeError::SessionInvalidated) => {
                debug!("Dropped exchange result for a cleared conversation");
                Err(PracticeError::SessionInvalidated)
            }
            Err(e) => {
                warn!("Exchange failed: {}", e);
                self.observer.on_pipeline_error(&e);
                self.notify_failure(&e);
                Err(e)
            }
        }
    }

    /// Abandon the current recording, e.g. when the view loses visibility.
    pub async fn cancel_recording(&self) {
        self.recorder.lock().await.cancel().await;
    }

    /// Change the level. The choice is saved after a quiet period; rapid
    /// changes produce a single write.
    pub fn select_level(&self, level: ProficiencyLevel) -> Result<()> {
        self.ensure_open()?;

        let changed = {
            let mut state = self.state();
            std::mem::replace(&mut state.level, level) != level
        };
        if changed {
            info!("Proficiency level set to {}", level);
            self.observer.on_level_changed(level);
        }
        self.schedule_persist(level);
        Ok(())
    }

    fn schedule_persist(&self, level: ProficiencyLevel) {
        let store = Arc::clone(&self.store);
        let delay = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let record = PersistedLevel::new(level, Utc::now());
            match store.save(&record) {
                Ok(()) => debug!("Saved proficiency level {}", level),
                Err(e) => warn!("Failed to save proficiency level: {}", e),
            }
        });
        if let Some(previous) = lock(&self.persist_task).replace(task) {
            previous.abort();
        }
    }

    /// Replace the scenario and start a fresh conversation.
    ///
    /// Failed attempts are retried with linear backoff. Once retries are
    /// exhausted the scenario shows a failure text and `RetryExhausted` is
    /// returned.
    pub async fn generate_scenario(&self, kind: ScenarioKind) -> Result<String> {
        self.ensure_open()?;

        let situation = match kind.situation().map(str::trim) {
            Some(text) if text.chars().count() < self.min_situation_chars => {
                let e = PracticeError::InvalidSituation {
                    min: self.min_situation_chars,
                };
                self.notify_failure(&e);
                return Err(e);
            }
            other => other.map(str::to_string),
        };

        let Some(_loading) = self.loading.try_acquire() else {
            return Err(PracticeError::ConcurrentPipelineRejected);
        };

        let generation = self.log.generation();
        let request = ScenarioRequest {
            level: self.level(),
            situation,
        };
        info!("Generating {} scenario", if request.situation.is_some() { "custom" } else { "random" });

        let api = &self.api;
        let request = &request;
        let result = self
            .retry
            .run("Scenario generation", &self.shutdown, move || async move {
                let scenario = api.generate_scenario(request).await?;
                let scenario = scenario.trim();
                if scenario.is_empty() {
                    return Err(PracticeError::EmptyReply);
                }
                Ok(scenario.to_string())
            })
            .await;

        if self.is_closed() || !self.log.is_current(generation) {
            return Err(PracticeError::SessionInvalidated);
        }

        match result {
            Ok(scenario) => {
                self.state().scenario = scenario.clone();
                self.log.clear();
                self.observer.on_scenario_changed(&scenario);
                Ok(scenario)
            }
            Err(e) => {
                warn!("Scenario generation failed: {}", e);
                self.state().scenario = SCENARIO_FAILED_TEXT.to_string();
                self.observer.on_scenario_changed(SCENARIO_FAILED_TEXT);
                self.notify_failure(&e);
                Err(e)
            }
        }
    }

    /// A model dialogue for the current scenario
    pub async fn example_dialogue(&self) -> Result<ExampleDialogue> {
        self.ensure_open()?;
        let (level, scenario) = {
            let state = self.state();
            (state.level, state.scenario.clone())
        };
        if scenario.is_empty() {
            return Err(PracticeError::InvalidState("no scenario selected".to_string()));
        }

        self.api.example_dialogue(level, &scenario).await.map_err(|e| {
            self.notify_failure(&e);
            e
        })
    }

    /// Feedback on the committed conversation so far
    pub async fn review_conversation(&self) -> Result<Review> {
        self.ensure_open()?;
        let messages = self.log.history();
        if messages.is_empty() {
            return Err(PracticeError::InvalidState("nothing to review yet".to_string()));
        }
        let request = {
            let state = self.state();
            ReviewRequest {
                messages,
                scenario: state.scenario.clone(),
                level: state.level,
            }
        };

        self.api.review(&request).await.map_err(|e| {
            self.notify_failure(&e);
            e
        })
    }

    /// Release everything the session holds. In-flight results are dropped
    /// when they arrive. Calling this twice is harmless.
    pub async fn teardown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Tearing down practice session");
        self.shutdown.cancel();

        self.recorder.lock().await.cancel().await;
        if let Some(task) = lock(&self.volume_task).take() {
            task.abort();
        }
        if let Some(task) = lock(&self.persist_task).take() {
            task.abort();
        }
        self.pipeline.cache().drain().await;
        self.log.clear();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for slot in [&self.volume_task, &self.persist_task] {
            if let Some(task) = lock(slot).take() {
                task.abort();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
