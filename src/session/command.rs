use serde::{Deserialize, Serialize};

use super::level::ProficiencyLevel;
use crate::api::{ExampleDialogue, Review};
use crate::pipeline::Exchange;
use crate::playback::PlaybackHandle;

/// How a new scenario is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "situation", rename_all = "lowercase")]
pub enum ScenarioKind {
    Random,
    /// Built around a situation the user described
    Custom(String),
}

impl ScenarioKind {
    pub fn situation(&self) -> Option<&str> {
        match self {
            ScenarioKind::Random => None,
            ScenarioKind::Custom(situation) => Some(situation),
        }
    }
}

/// Everything presentation code can ask of a session
#[derive(Debug, Clone)]
pub enum Command {
    StartRecording,
    /// The handle must be created in the gesture that stopped the recording
    StopRecording { playback: PlaybackHandle },
    CancelRecording,
    SelectLevel(ProficiencyLevel),
    GenerateScenario(ScenarioKind),
    ExampleDialogue,
    ReviewConversation,
    Teardown,
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Done,
    Exchange(Exchange),
    Scenario(String),
    Dialogue(ExampleDialogue),
    Review(Review),
}
