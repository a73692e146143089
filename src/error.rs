use thiserror::Error;

/// Every failure the practice session can surface.
///
/// None of these are fatal: the session stays usable after any single error.
#[derive(Debug, Error)]
pub enum PracticeError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Recording too short: {size} bytes (minimum {min})")]
    TooShortRecording { size: usize, min: usize },

    #[error("Transcription was empty")]
    EmptyTranscription,

    #[error("Server returned an empty reply")]
    EmptyReply,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error("Another request is already in progress")]
    ConcurrentPipelineRejected,

    #[error("Session changed while the request was in flight")]
    SessionInvalidated,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Situation description must be at least {min} characters")]
    InvalidSituation { min: usize },

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PracticeError>;

impl From<reqwest::Error> for PracticeError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => PracticeError::Server {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None => PracticeError::Network(e.to_string()),
        }
    }
}

impl From<std::io::Error> for PracticeError {
    fn from(e: std::io::Error) -> Self {
        PracticeError::Storage(e.to_string())
    }
}

impl PracticeError {
    /// Short user-facing text for a transient notice.
    pub fn notice(&self) -> String {
        match self {
            PracticeError::PermissionDenied => {
                "Microphone access was denied. Allow it and try again.".to_string()
            }
            PracticeError::TooShortRecording { .. } => {
                "That recording was too short. Hold the button while you speak.".to_string()
            }
            PracticeError::EmptyTranscription => {
                "I didn't catch that. Please try recording again.".to_string()
            }
            PracticeError::ConcurrentPipelineRejected => {
                "Please wait for the current reply to finish.".to_string()
            }
            PracticeError::RetryExhausted { .. } => {
                "Could not create a scenario. Please try again later.".to_string()
            }
            PracticeError::InvalidSituation { min } => {
                format!("Describe the situation in at least {} characters.", min)
            }
            PracticeError::Network(_) => "Network problem. Check your connection.".to_string(),
            PracticeError::Server { status, .. } => format!("The server failed ({}).", status),
            other => other.to_string(),
        }
    }
}
