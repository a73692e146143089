//! The conversation session: message log, proficiency level, persistence and
//! the controller that ties recording and the request pipeline together.

mod command;
mod controller;
mod level;
mod log;
mod message;
mod observer;
mod snapshot;
mod store;

pub use command::{Command, CommandOutcome, ScenarioKind};
pub use controller::{Collaborators, SessionController, SCENARIO_FAILED_TEXT};
pub use level::ProficiencyLevel;
pub use log::{MessageLog, PendingMessage, SharedLog};
pub use message::{Message, MessageId, Role};
pub use observer::{NoopObserver, SessionObserver, TracingObserver};
pub use snapshot::SessionSnapshot;
pub use store::{
    restore_level, FileLevelStore, LevelStore, MemoryLevelStore, PersistedLevel, SESSION_STATE_FILE,
};
