// In-memory stand-ins for the practice backend, the microphone and the clip
// loader, shared by the integration tests.
#![allow(dead_code)]

use anyhow::{bail, Result as AnyResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svenska_practice::api::{
    ExampleDialogue, PartnerReply, PracticeApi, RespondRequest, Review, ReviewRequest,
    ScenarioRequest,
};
use svenska_practice::audio::{AudioBackend, AudioFrame, Permission};
use svenska_practice::error::{PracticeError, Result};
use svenska_practice::playback::{AudioClip, ClipLoader};
use svenska_practice::recording::{RecordingState, RecordingUnit, VolumeSample};
use svenska_practice::session::{Message, ProficiencyLevel, SessionObserver};
use tokio::sync::{mpsc, Notify};

pub const REPLY_AUDIO_URL: &str = "http://localhost:8000/audio_cache/ai_response_1.mp3";

/// A unit of exactly `size` bytes
pub fn unit_of(size: usize) -> RecordingUnit {
    RecordingUnit::wav(vec![0u8; size], Duration::from_millis(500))
}

// ============================================================================
// Practice backend
// ============================================================================

#[derive(Default)]
pub struct FakeApi {
    transcripts: Mutex<VecDeque<Result<String>>>,
    replies: Mutex<VecDeque<Result<PartnerReply>>>,
    scenarios: Mutex<VecDeque<Result<String>>>,
    /// When set, transcription waits for a notification
    transcribe_gate: Option<Arc<Notify>>,
    pub transcribe_calls: AtomicUsize,
    pub scenario_calls: AtomicUsize,
    pub respond_requests: Mutex<Vec<RespondRequest>>,
    pub review_requests: Mutex<Vec<ReviewRequest>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(self, result: Result<String>) -> Self {
        self.transcripts.lock().unwrap().push_back(result);
        self
    }

    pub fn with_reply(self, result: Result<PartnerReply>) -> Self {
        self.replies.lock().unwrap().push_back(result);
        self
    }

    pub fn with_scenario(self, result: Result<String>) -> Self {
        self.scenarios.lock().unwrap().push_back(result);
        self
    }

    pub fn with_transcribe_gate(mut self, gate: Arc<Notify>) -> Self {
        self.transcribe_gate = Some(gate);
        self
    }

    pub fn scenario_calls(&self) -> usize {
        self.scenario_calls.load(Ordering::SeqCst)
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }
}

pub fn reply(text: &str, audio_url: Option<&str>) -> PartnerReply {
    PartnerReply {
        response: text.to_string(),
        audio_url: audio_url.map(str::to_string),
    }
}

#[async_trait::async_trait]
impl PracticeApi for FakeApi {
    async fn transcribe(&self, _unit: &RecordingUnit) -> Result<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.transcribe_gate {
            gate.notified().await;
        }
        let next = self.transcripts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("Hej, jag vill ha en kaffe".to_string()))
    }

    async fn respond(&self, request: &RespondRequest) -> Result<PartnerReply> {
        self.respond_requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(reply("Självklart! Något mer?", Some(REPLY_AUDIO_URL))))
    }

    async fn generate_scenario(&self, _request: &ScenarioRequest) -> Result<String> {
        self.scenario_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.scenarios.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("Du beställer kaffe på ett café.".to_string()))
    }

    async fn example_dialogue(&self, level: ProficiencyLevel, scenario: &str) -> Result<ExampleDialogue> {
        Ok(ExampleDialogue {
            level,
            dialog: format!("A: {}\nB: Ja, gärna.", scenario),
            audio_url: None,
            key_phrases: Some(vec!["gärna".to_string()]),
        })
    }

    async fn review(&self, request: &ReviewRequest) -> Result<Review> {
        self.review_requests.lock().unwrap().push(request.clone());
        Ok(Review {
            review: "Bra jobbat!".to_string(),
            level: request.level,
            message_count: request.messages.len(),
            strengths: None,
            improvements: None,
            score: Some(80),
        })
    }
}

pub fn server_error(status: u16) -> PracticeError {
    PracticeError::Server {
        status,
        body: "internal error".to_string(),
    }
}

// ============================================================================
// Microphone
// ============================================================================

/// Counters shared between a boxed backend and the test
#[derive(Debug, Default)]
pub struct BackendProbe {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub permission_requests: AtomicUsize,
}

impl BackendProbe {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Microphone that delivers a fixed set of frames as soon as it starts
pub struct FakeBackend {
    answer: Permission,
    permission: Permission,
    frames: Vec<Vec<i16>>,
    fail_start: bool,
    close_early: bool,
    capturing: bool,
    /// Held open until `stop`, like a live microphone
    sender: Option<mpsc::Sender<AudioFrame>>,
    probe: Arc<BackendProbe>,
}

impl FakeBackend {
    /// `frames` frames of 1600 samples (100ms at 16kHz)
    pub fn speaking(frames: usize) -> Self {
        Self::with_frames(vec![vec![4000i16; 1600]; frames])
    }

    pub fn with_frames(frames: Vec<Vec<i16>>) -> Self {
        Self {
            answer: Permission::Granted,
            permission: Permission::Prompt,
            frames,
            fail_start: false,
            close_early: false,
            capturing: false,
            sender: None,
            probe: Arc::new(BackendProbe::default()),
        }
    }

    pub fn denying() -> Self {
        let mut backend = Self::speaking(1);
        backend.answer = Permission::Denied;
        backend
    }

    pub fn failing_start() -> Self {
        let mut backend = Self::speaking(1);
        backend.fail_start = true;
        backend
    }

    /// Delivers its frames, then the device goes away mid-recording
    pub fn closing_early(frames: usize) -> Self {
        let mut backend = Self::speaking(frames);
        backend.close_early = true;
        backend
    }

    pub fn probe(&self) -> Arc<BackendProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait::async_trait]
impl AudioBackend for FakeBackend {
    fn permission(&self) -> Permission {
        self.permission
    }

    async fn request_permission(&mut self) -> AnyResult<Permission> {
        self.probe.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission = self.answer;
        Ok(self.permission)
    }

    async fn start(&mut self) -> AnyResult<mpsc::Receiver<AudioFrame>> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            bail!("device busy");
        }
        let (tx, rx) = mpsc::channel(self.frames.len().max(1));
        for (index, samples) in self.frames.iter().enumerate() {
            let _ = tx.try_send(AudioFrame {
                samples: samples.clone(),
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: index as u64 * 100,
            });
        }
        if !self.close_early {
            self.sender = Some(tx);
        }
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> AnyResult<()> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.sender = None;
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake-mic"
    }
}

// ============================================================================
// Clip loader
// ============================================================================

#[derive(Default)]
pub struct FakeLoader {
    pub fail: bool,
    gate: Option<Arc<Notify>>,
    pub loads: Mutex<Vec<String>>,
    pub released: Mutex<Vec<String>>,
}

impl FakeLoader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Hold every load until `gate` is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn load_calls(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClipLoader for FakeLoader {
    async fn load(&self, url: &str) -> AnyResult<AudioClip> {
        self.loads.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            bail!("404 Not Found: {}", url);
        }
        Ok(AudioClip {
            source_url: url.to_string(),
            bytes: vec![0xff, 0xfb, 0x90],
            sample_rate: Some(24000),
            channels: Some(1),
            duration: Some(Duration::from_millis(1200)),
            local_path: None,
        })
    }

    fn release(&self, clip: &AudioClip) {
        self.released.lock().unwrap().push(clip.source_url.clone());
    }
}

// ============================================================================
// Observer
// ============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub notices: Mutex<Vec<String>>,
    pub pipeline_errors: Mutex<Vec<String>>,
    pub states: Mutex<Vec<RecordingState>>,
    pub scenarios: Mutex<Vec<String>>,
    pub levels: Mutex<Vec<ProficiencyLevel>>,
    pub volume_samples: AtomicUsize,
    pub message_updates: AtomicUsize,
    pub recordings_stopped: AtomicUsize,
}

impl RecordingObserver {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn pipeline_errors(&self) -> Vec<String> {
        self.pipeline_errors.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<RecordingState> {
        self.states.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_recording_state(&self, state: &RecordingState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_recording_stopped(&self, _unit: &RecordingUnit) {
        self.recordings_stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn on_volume_sample(&self, _sample: &VolumeSample) {
        self.volume_samples.fetch_add(1, Ordering::SeqCst);
    }

    fn on_messages_changed(&self, _messages: &[Message]) {
        self.message_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_pipeline_error(&self, error: &PracticeError) {
        self.pipeline_errors.lock().unwrap().push(error.to_string());
    }

    fn on_scenario_changed(&self, scenario: &str) {
        self.scenarios.lock().unwrap().push(scenario.to_string());
    }

    fn on_level_changed(&self, level: ProficiencyLevel) {
        self.levels.lock().unwrap().push(level);
    }

    fn on_notice(&self, text: &str) {
        self.notices.lock().unwrap().push(text.to_string());
    }
}
