use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Not asked yet; `request_permission` will prompt
    Prompt,
    Granted,
    Denied,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for transcription
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

impl From<&crate::config::RecordingConfig> for AudioBackendConfig {
    fn from(cfg: &crate::config::RecordingConfig) -> Self {
        Self {
            target_sample_rate: cfg.sample_rate,
            target_channels: cfg.channels,
            buffer_duration_ms: cfg.buffer_duration_ms,
        }
    }
}

/// Audio capture backend trait
///
/// The recording session drives this through its whole lifecycle:
/// permission, start, and an unconditional `stop` on every exit path.
/// Implementations must also release the device when dropped.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Current permission state, without prompting
    fn permission(&self) -> Permission;

    /// Ask the platform for capture permission
    async fn request_permission(&mut self) -> Result<Permission>;

    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The channel
    /// closes when the source is exhausted or `stop` is called.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device. Must be idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
