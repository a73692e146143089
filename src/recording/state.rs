use serde::Serialize;

/// Why a capture ended in the error state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum CaptureFailure {
    PermissionDenied,
    Device(String),
    Encoding(String),
}

/// Capture lifecycle: `Idle -> PermissionPending -> Recording -> Finalizing -> Idle`.
/// `Error` can be entered from any non-idle state and always falls back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    PermissionPending,
    Recording,
    Finalizing,
    Error { failure: CaptureFailure },
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }
}
