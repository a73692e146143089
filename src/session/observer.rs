//! Callbacks the session core invokes so a presentation layer can follow along
//! without the core depending on any UI toolkit.

use tracing::{debug, info, warn};

use super::message::Message;
use crate::error::PracticeError;
use crate::recording::{RecordingState, RecordingUnit, VolumeSample};
use crate::session::ProficiencyLevel;

/// Every method has a no-op default, so subscribers implement only what they render.
pub trait SessionObserver: Send + Sync {
    fn on_recording_state(&self, _state: &RecordingState) {}

    fn on_recording_started(&self) {}

    fn on_recording_stopped(&self, _unit: &RecordingUnit) {}

    fn on_volume_sample(&self, _sample: &VolumeSample) {}

    fn on_messages_changed(&self, _messages: &[Message]) {}

    fn on_pipeline_error(&self, _error: &PracticeError) {}

    fn on_scenario_changed(&self, _scenario: &str) {}

    fn on_level_changed(&self, _level: ProficiencyLevel) {}

    /// Transient user-facing notice (toast)
    fn on_notice(&self, _text: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Observer that writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_recording_state(&self, state: &RecordingState) {
        debug!(?state, "Recording state changed");
    }

    fn on_recording_started(&self) {
        info!("Recording started");
    }

    fn on_recording_stopped(&self, unit: &RecordingUnit) {
        info!(
            bytes = unit.size_bytes,
            duration_ms = unit.duration_hint.as_millis() as u64,
            "Recording finished"
        );
    }

    fn on_messages_changed(&self, messages: &[Message]) {
        if let Some(last) = messages.last() {
            debug!(
                count = messages.len(),
                role = ?last.role,
                placeholder = last.placeholder,
                "Message log updated"
            );
        } else {
            debug!("Message log cleared");
        }
    }

    fn on_pipeline_error(&self, error: &PracticeError) {
        warn!("Exchange failed: {}", error);
    }

    fn on_scenario_changed(&self, scenario: &str) {
        info!("Scenario: {}", scenario);
    }

    fn on_level_changed(&self, level: ProficiencyLevel) {
        info!("Proficiency level set to {}", level);
    }

    fn on_notice(&self, text: &str) {
        info!("Notice: {}", text);
    }
}
