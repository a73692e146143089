use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::cache::AudioClip;

/// What a playback handle currently holds
#[derive(Debug, Clone, Default)]
pub enum PlaybackSource {
    /// Created at gesture time, waiting for the reply
    #[default]
    Empty,
    /// Reply arrived; clip is being fetched
    Assigned { url: String },
    /// Clip decoded and ready to play
    Ready { url: String, clip: Arc<AudioClip> },
}

/// Playback slot for the partner's synthesized speech.
///
/// Must be constructed by the caller inside the user-gesture handler (the
/// moment the recording is stopped), before any request is made. Playback
/// environments commonly only let audio objects created during a user
/// interaction start playing later. The pipeline fills the slot once the
/// reply arrives.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    id: Uuid,
    source: Arc<watch::Sender<PlaybackSource>>,
}

impl PlaybackHandle {
    pub fn new() -> Self {
        let (source, _) = watch::channel(PlaybackSource::Empty);
        Self {
            id: Uuid::new_v4(),
            source: Arc::new(source),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> PlaybackSource {
        self.source.borrow().clone()
    }

    pub fn url(&self) -> Option<String> {
        match &*self.source.borrow() {
            PlaybackSource::Empty => None,
            PlaybackSource::Assigned { url } | PlaybackSource::Ready { url, .. } => Some(url.clone()),
        }
    }

    pub fn clip(&self) -> Option<Arc<AudioClip>> {
        match &*self.source.borrow() {
            PlaybackSource::Ready { clip, .. } => Some(Arc::clone(clip)),
            _ => None,
        }
    }

    /// Follow the slot as it is filled
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSource> {
        self.source.subscribe()
    }

    pub(crate) fn assign(&self, url: &str) {
        self.source.send_replace(PlaybackSource::Assigned {
            url: url.to_string(),
        });
    }

    pub(crate) fn attach(&self, clip: Arc<AudioClip>) {
        self.source.send_replace(PlaybackSource::Ready {
            url: clip.source_url.clone(),
            clip,
        });
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}
