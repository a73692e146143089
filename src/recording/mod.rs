//! Capture lifecycle: permission, recording, volume telemetry, and packaging
//! of the captured audio into a [`RecordingUnit`].

mod session;
mod state;
mod unit;
mod volume;

pub use session::RecordingSession;
pub use state::{CaptureFailure, RecordingState};
pub use unit::RecordingUnit;
pub use volume::{VolumeSample, VolumeStream};
