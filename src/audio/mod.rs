pub mod backend;
pub mod convert;
pub mod encode;
pub mod file;
pub mod level;

pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame, Permission};
pub use encode::{encode_wav, pcm_duration};
pub use file::{AudioFile, WavFileBackend};
