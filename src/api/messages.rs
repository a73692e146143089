use serde::{Deserialize, Serialize};

use crate::session::ProficiencyLevel;

/// Speaker tag the backend uses in chat history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Ai,
}

/// One committed line of the conversation, as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

/// Response of `POST /api/transcribe`
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub transcription: String,
}

/// Body of `POST /api/get_ai_response`
#[derive(Debug, Clone, Serialize)]
pub struct RespondRequest {
    /// The user's transcribed line
    pub text: String,
    /// Committed history before `text`
    pub history: Vec<HistoryEntry>,
    pub scenario: String,
    pub level: ProficiencyLevel,
}

/// The partner's line and its synthesized speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerReply {
    pub response: String,
    #[serde(rename = "audioUrl", default)]
    pub audio_url: Option<String>,
}

/// Body of `POST /api/scenarios/random` and `POST /api/example_dialogue`
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRequest {
    pub level: ProficiencyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub situation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioResponse {
    pub scenario: String,
}

/// A model dialogue for the current scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleDialogue {
    pub level: ProficiencyLevel,
    pub dialog: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub key_phrases: Option<Vec<String>>,
}

/// Body of `POST /api/review/performance`
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequest {
    pub messages: Vec<HistoryEntry>,
    pub scenario: String,
    pub level: ProficiencyLevel,
}

/// Feedback on a finished conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review: String,
    pub level: ProficiencyLevel,
    pub message_count: usize,
    #[serde(default)]
    pub strengths: Option<Vec<String>>,
    #[serde(default)]
    pub improvements: Option<Vec<String>>,
    #[serde(default)]
    pub score: Option<i32>,
}
