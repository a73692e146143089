use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, Permission};
use super::convert::conform_frame;

/// A decoded WAV file held in memory.
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            bail!(
                "Unsupported WAV format: {}-bit {:?} (expected 16-bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Capture backend that plays a WAV file as if it were a microphone.
///
/// "Permission" is the ability to open the file. Frames are emitted every
/// `buffer_duration_ms`, paced in real time unless `realtime` is off.
pub struct WavFileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    realtime: bool,
    permission: Permission,
    file: Option<AudioFile>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            realtime: true,
            permission: Permission::Prompt,
            file: None,
            cancel: None,
            task: None,
        }
    }

    /// Emit all frames immediately instead of pacing them
    pub fn without_pacing(mut self) -> Self {
        self.realtime = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the source, once the file has been opened by `request_permission`
    pub fn duration(&self) -> Option<Duration> {
        self.file
            .as_ref()
            .map(|f| Duration::from_secs_f64(f.duration_seconds))
    }
}

#[async_trait::async_trait]
impl AudioBackend for WavFileBackend {
    fn permission(&self) -> Permission {
        self.permission
    }

    async fn request_permission(&mut self) -> Result<Permission> {
        let path = self.path.clone();
        let opened = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("WAV loader task panicked")?;

        match opened {
            Ok(file) => {
                self.file = Some(file);
                self.permission = Permission::Granted;
            }
            Err(e) => {
                warn!("Cannot open capture source {}: {:#}", self.path.display(), e);
                self.permission = Permission::Denied;
            }
        }

        Ok(self.permission)
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.task.is_some() {
            bail!("Already capturing");
        }
        if self.permission != Permission::Granted {
            bail!("Capture permission not granted");
        }
        let file = self
            .file
            .as_ref()
            .context("Capture source not opened")?;

        let channels = file.channels.max(1);
        let frame_len = ((file.sample_rate as u64 * self.config.buffer_duration_ms / 1000) as usize
            * channels as usize)
            .max(channels as usize);
        let chunks: Vec<Vec<i16>> = file.samples.chunks(frame_len).map(<[i16]>::to_vec).collect();
        let source_rate = file.sample_rate;
        let target_rate = self.config.target_sample_rate;
        let target_channels = self.config.target_channels;
        let interval = Duration::from_millis(self.config.buffer_duration_ms.max(1));
        let buffer_ms = self.config.buffer_duration_ms;
        let realtime = self.realtime;

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!("Starting WAV capture from {}", self.path.display());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for (index, samples) in chunks.into_iter().enumerate() {
                if realtime {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                } else if token.is_cancelled() {
                    break;
                }

                let frame = conform_frame(
                    AudioFrame {
                        samples,
                        sample_rate: source_rate,
                        channels,
                        timestamp_ms: index as u64 * buffer_ms,
                    },
                    target_rate,
                    target_channels,
                );

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("WAV capture source exhausted");
        });

        self.cancel = Some(cancel);
        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("WAV capture task ended abnormally: {}", e);
            }
            info!("Stopped WAV capture from {}", self.path.display());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

impl Drop for WavFileBackend {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
