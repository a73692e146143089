use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{CaptureFailure, RecordingState};
use super::unit::RecordingUnit;
use super::volume::{volume_stream, LevelMeter, VolumeStream};
use crate::audio::{encode_wav, level, pcm_duration, AudioBackend, AudioFrame, Permission};
use crate::config::RecordingConfig;
use crate::error::{PracticeError, Result};
use crate::session::SessionObserver;

/// Audio gathered by the capture task
struct CapturedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

/// State of a capture between `start` and `stop`
struct ActiveCapture {
    started_at: Instant,
    cancel: CancellationToken,
    collector: JoinHandle<CapturedAudio>,
    volume: Option<VolumeStream>,
}

/// Manages the capture lifecycle of one input device.
///
/// The backend is released on every exit path: `stop`, `cancel`, a failed
/// start, and drop.
pub struct RecordingSession {
    backend: Box<dyn AudioBackend>,
    config: RecordingConfig,
    observer: Arc<dyn SessionObserver>,
    state: watch::Sender<RecordingState>,
    capture: Option<ActiveCapture>,
}

impl RecordingSession {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        config: RecordingConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        info!("Creating recording session on backend: {}", backend.name());
        let (state, _) = watch::channel(RecordingState::Idle);
        Self {
            backend,
            config,
            observer,
            state,
            capture: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state.borrow().clone()
    }

    /// Watch the capture state without holding the session
    pub fn subscribe(&self) -> watch::Receiver<RecordingState> {
        self.state.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    /// Start capturing. Only valid from `Idle`.
    pub async fn start(&mut self) -> Result<()> {
        let current = self.state();
        if !current.is_idle() {
            return Err(PracticeError::InvalidState(format!(
                "cannot start recording while {:?}",
                current
            )));
        }

        if self.backend.permission() != Permission::Granted {
            self.set_state(RecordingState::PermissionPending);
            match self.backend.request_permission().await {
                Ok(Permission::Granted) => debug!("Capture permission granted"),
                Ok(_) => {
                    warn!("Capture permission denied on {}", self.backend.name());
                    self.fail(CaptureFailure::PermissionDenied);
                    return Err(PracticeError::PermissionDenied);
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    error!("Permission request failed: {}", reason);
                    self.fail(CaptureFailure::Device(reason.clone()));
                    return Err(PracticeError::Capture(reason));
                }
            }
        }

        let audio_rx = match self.backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Failed to start audio capture: {}", reason);
                self.release_backend().await;
                self.fail(CaptureFailure::Device(reason.clone()));
                return Err(PracticeError::Capture(reason));
            }
        };

        let cancel = CancellationToken::new();
        let meter = LevelMeter::default();
        let collector = tokio::spawn(collect_frames(
            audio_rx,
            cancel.clone(),
            meter.clone(),
            self.config.sample_rate,
            self.config.channels,
        ));
        let volume = volume_stream(meter, cancel.clone(), self.config.volume_interval());

        self.capture = Some(ActiveCapture {
            started_at: Instant::now(),
            cancel,
            collector,
            volume: Some(volume),
        });
        self.set_state(RecordingState::Recording);

        info!("Recording started on {}", self.backend.name());
        Ok(())
    }

    /// Take the volume stream for the current capture. Yields `None` after the
    /// first call; each capture has exactly one stream.
    pub fn take_volume_stream(&mut self) -> Option<VolumeStream> {
        self.capture.as_mut().and_then(|c| c.volume.take())
    }

    /// Stop capturing and package the audio into a unit.
    pub async fn stop(&mut self) -> Result<RecordingUnit> {
        let Some(capture) = self.capture.take() else {
            return Err(PracticeError::InvalidState(format!(
                "cannot stop recording while {:?}",
                self.state()
            )));
        };

        self.set_state(RecordingState::Finalizing);
        capture.cancel.cancel();

        let collected = capture.collector.await;
        self.release_backend().await;

        let captured = match collected {
            Ok(captured) => captured,
            Err(e) => {
                let reason = format!("capture task failed: {}", e);
                error!("{}", reason);
                self.fail(CaptureFailure::Device(reason.clone()));
                return Err(PracticeError::Capture(reason));
            }
        };

        let duration = pcm_duration(captured.samples.len(), captured.sample_rate, captured.channels);
        let encoded = match encode_wav(&captured.samples, captured.sample_rate, captured.channels) {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Failed to encode recording: {}", reason);
                self.fail(CaptureFailure::Encoding(reason.clone()));
                return Err(PracticeError::Capture(reason));
            }
        };

        let unit = RecordingUnit::wav(encoded, duration);
        info!(
            "Recording stopped: {:.2}s audio, {} bytes (held for {:.2}s)",
            duration.as_secs_f64(),
            unit.size_bytes,
            capture.started_at.elapsed().as_secs_f64()
        );

        self.set_state(RecordingState::Idle);
        Ok(unit)
    }

    /// Abandon the current capture (e.g. the view lost visibility).
    /// Captured audio is discarded. No-op when idle.
    pub async fn cancel(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };

        info!("Cancelling recording on {}", self.backend.name());
        capture.cancel.cancel();
        capture.collector.abort();
        self.release_backend().await;
        self.set_state(RecordingState::Idle);
    }

    async fn release_backend(&mut self) {
        if let Err(e) = self.backend.stop().await {
            warn!("Failed to release {} cleanly: {:#}", self.backend.name(), e);
        }
    }

    fn set_state(&self, state: RecordingState) {
        self.observer.on_recording_state(&state);
        self.state.send_replace(state);
    }

    fn fail(&self, failure: CaptureFailure) {
        self.set_state(RecordingState::Error { failure });
        self.set_state(RecordingState::Idle);
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            warn!("Recording session dropped while capturing");
            capture.cancel.cancel();
            capture.collector.abort();
        }
    }
}

/// Accumulate frames until cancelled or the source closes, then drain what is
/// already buffered. A closed source cancels the capture token itself.
async fn collect_frames(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    cancel: CancellationToken,
    meter: LevelMeter,
    default_rate: u32,
    default_channels: u16,
) -> CapturedAudio {
    let mut captured = CapturedAudio {
        samples: Vec::new(),
        sample_rate: default_rate,
        channels: default_channels,
    };
    let mut format_known = false;

    let mut accept = |frame: AudioFrame, captured: &mut CapturedAudio| {
        if !format_known {
            captured.sample_rate = frame.sample_rate;
            captured.channels = frame.channels;
            format_known = true;
        } else if frame.sample_rate != captured.sample_rate || frame.channels != captured.channels {
            warn!(
                "Dropping frame with mismatched format: {}Hz/{}ch",
                frame.sample_rate, frame.channels
            );
            return;
        }
        meter.set(level::normalized_level(&frame.samples));
        captured.samples.extend_from_slice(&frame.samples);
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = audio_rx.recv() => match frame {
                Some(frame) => accept(frame, &mut captured),
                None => {
                    // Device went away; end the volume stream now rather than at `stop`
                    warn!("Capture source closed before stop");
                    meter.set(0.0);
                    cancel.cancel();
                    break;
                }
            },
        }
    }

    audio_rx.close();
    while let Ok(frame) = audio_rx.try_recv() {
        accept(frame, &mut captured);
    }

    captured
}
