use serde::Serialize;

use super::level::ProficiencyLevel;
use super::message::Message;
use crate::recording::RecordingState;

/// Read-only view of the conversation session for presentation code
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub level: ProficiencyLevel,

    pub scenario: String,

    /// Conversation so far, including any in-flight placeholders
    pub messages: Vec<Message>,

    /// An exchange is in flight
    pub pipeline_busy: bool,

    /// A scenario is being generated
    pub is_loading: bool,

    pub recording: RecordingState,
}
