//! Bounded cache of fetched partner clips.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// A decodable clip held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub source_url: String,
    pub bytes: Vec<u8>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub duration: Option<Duration>,
    /// Spooled copy on disk, removed on release
    pub local_path: Option<PathBuf>,
}

/// Fetches clips and frees whatever they hold
#[async_trait::async_trait]
pub trait ClipLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<AudioClip>;

    /// Called exactly once for every clip evicted or drained
    fn release(&self, clip: &AudioClip);
}

struct CacheEntry {
    clip: Arc<AudioClip>,
    last_access: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
    /// Set by `drain`; nothing is admitted afterwards
    closed: bool,
}

impl CacheInner {
    fn touch(&mut self, url: &str) -> Option<Arc<AudioClip>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(url).map(|entry| {
            entry.last_access = clock;
            Arc::clone(&entry.clip)
        })
    }

    fn oldest(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(url, _)| url.clone())
    }
}

/// URL-keyed clip cache holding at most `capacity` entries.
///
/// Inserting past capacity evicts the least recently used entry and
/// releases it through the loader. After `drain` the cache is closed: a load
/// that finishes later is released at once instead of being stored.
pub struct AudioResourceCache {
    loader: Arc<dyn ClipLoader>,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl AudioResourceCache {
    pub fn new(loader: Arc<dyn ClipLoader>, capacity: usize) -> Self {
        Self {
            loader,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached clip for `url`, loading it on a miss.
    pub async fn get(&self, url: &str) -> Result<Arc<AudioClip>> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                bail!("audio cache is closed");
            }
            if let Some(clip) = inner.touch(url) {
                debug!("Audio cache hit: {}", url);
                return Ok(clip);
            }
        }

        // Load without holding the lock so playback of other clips is not blocked
        let loaded = Arc::new(self.loader.load(url).await?);

        let mut inner = self.inner.lock().await;
        if inner.closed {
            debug!("Releasing audio loaded after teardown: {}", url);
            self.loader.release(&loaded);
            bail!("audio cache is closed");
        }
        if let Some(existing) = inner.touch(url) {
            // Someone else loaded the same URL meanwhile; keep theirs
            self.loader.release(&loaded);
            return Ok(existing);
        }

        while inner.entries.len() >= self.capacity {
            let Some(victim) = inner.oldest() else { break };
            if let Some(entry) = inner.entries.remove(&victim) {
                debug!("Evicting cached audio: {}", victim);
                self.loader.release(&entry.clip);
            }
        }

        inner.clock += 1;
        let last_access = inner.clock;
        inner.entries.insert(
            url.to_string(),
            CacheEntry {
                clip: Arc::clone(&loaded),
                last_access,
            },
        );
        Ok(loaded)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.inner.lock().await.entries.contains_key(url)
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Release every entry and close the cache. Called on teardown.
    pub async fn drain(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        let count = inner.entries.len();
        for (_, entry) in inner.entries.drain() {
            self.loader.release(&entry.clip);
        }
        if count > 0 {
            debug!("Released {} cached clips", count);
        }
    }
}
