use anyhow::{Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

use super::cache::{AudioClip, ClipLoader};
use super::probe::{probe_clip, url_extension};

/// Fetches partner clips over HTTP and spools them to disk while cached
pub struct HttpClipLoader {
    client: Client,
    spool_dir: PathBuf,
}

impl HttpClipLoader {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            spool_dir: spool_dir.into(),
        }
    }

    pub fn spool_dir(&self) -> &PathBuf {
        &self.spool_dir
    }
}

#[async_trait::async_trait]
impl ClipLoader for HttpClipLoader {
    async fn load(&self, url: &str) -> Result<AudioClip> {
        debug!("Fetching audio clip {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Audio fetch rejected: {}", url))?;
        let bytes = response.bytes().await?.to_vec();

        let ext = url_extension(url).map(str::to_string);
        let probe_bytes = bytes.clone();
        let probe_ext = ext.clone();
        let info = tokio::task::spawn_blocking(move || probe_clip(probe_bytes, probe_ext.as_deref()))
            .await
            .context("Probe task panicked")??;

        tokio::fs::create_dir_all(&self.spool_dir).await?;
        let local_path = self.spool_dir.join(format!(
            "{}.{}",
            Uuid::new_v4(),
            ext.as_deref().unwrap_or("bin")
        ));
        tokio::fs::write(&local_path, &bytes)
            .await
            .with_context(|| format!("Failed to spool clip to {:?}", local_path))?;

        Ok(AudioClip {
            source_url: url.to_string(),
            bytes,
            sample_rate: info.sample_rate,
            channels: info.channels,
            duration: info.duration,
            local_path: Some(local_path),
        })
    }

    fn release(&self, clip: &AudioClip) {
        if let Some(path) = &clip.local_path {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove spooled clip {:?}: {}", path, e);
            }
        }
    }
}
