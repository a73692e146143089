use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a line of the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Partner,
}

/// Position-stable identifier of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// A single line of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    pub role: Role,

    /// Spoken text, or the loading text while `placeholder` is set
    pub text: String,

    /// Synthesized speech for partner lines
    pub audio_url: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Provisional entry shown while a request is in flight
    pub placeholder: bool,
}

/// Text shown while a placeholder is pending
pub(crate) fn placeholder_text(role: Role) -> &'static str {
    match role {
        Role::User => "...",
        Role::Partner => "Thinking...",
    }
}
