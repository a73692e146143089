use std::time::Duration;

use crate::error::{PracticeError, Result};

/// A finalized, encoded capture ready for transcription.
///
/// Transient: consumed by the pipeline and dropped once transcription
/// succeeds or fails.
#[derive(Debug, Clone)]
pub struct RecordingUnit {
    pub encoded_audio: Vec<u8>,
    pub duration_hint: Duration,
    pub size_bytes: usize,
    pub mime_type: String,
}

impl RecordingUnit {
    pub fn new(encoded_audio: Vec<u8>, duration_hint: Duration, mime_type: impl Into<String>) -> Self {
        Self {
            size_bytes: encoded_audio.len(),
            encoded_audio,
            duration_hint,
            mime_type: mime_type.into(),
        }
    }

    pub fn wav(encoded_audio: Vec<u8>, duration_hint: Duration) -> Self {
        Self::new(encoded_audio, duration_hint, "audio/wav")
    }

    /// File name used for the multipart upload
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" | "audio/x-wav" => "recording.wav",
            "audio/webm" => "recording.webm",
            "audio/ogg" => "recording.ogg",
            _ => "recording.bin",
        }
    }

    /// Reject units too small to hold meaningful speech.
    pub fn ensure_min_size(&self, min_bytes: usize) -> Result<()> {
        if self.size_bytes < min_bytes {
            return Err(PracticeError::TooShortRecording {
                size: self.size_bytes,
                min: min_bytes,
            });
        }
        Ok(())
    }
}
