//! Partner audio: the gesture-time playback slot and the clip cache behind it.

pub mod cache;
pub mod handle;
pub mod loader;
pub mod probe;

pub use cache::{AudioClip, AudioResourceCache, ClipLoader};
pub use handle::{PlaybackHandle, PlaybackSource};
pub use loader::HttpClipLoader;
pub use probe::{probe_clip, ClipInfo};
