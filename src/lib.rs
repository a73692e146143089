pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod playback;
pub mod recording;
pub mod session;

pub use api::{HttpPracticeApi, PracticeApi};
pub use audio::{AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, WavFileBackend};
pub use config::Config;
pub use error::{PracticeError, Result};
pub use http::{create_router, AppState};
pub use pipeline::{Exchange, RequestPipeline};
pub use playback::{AudioResourceCache, HttpClipLoader, PlaybackHandle};
pub use recording::{RecordingSession, RecordingState, RecordingUnit};
pub use session::{
    Collaborators, Command, CommandOutcome, FileLevelStore, ProficiencyLevel, ScenarioKind,
    SessionController, SessionObserver, SessionSnapshot, TracingObserver,
};
