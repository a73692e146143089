//! Request/response contracts of the practice backend.
//!
//! Transcription, text generation and speech synthesis all happen server-side;
//! the session core only sees the [`PracticeApi`] trait.

pub mod client;
pub mod messages;

pub use client::HttpPracticeApi;
pub use messages::{
    ExampleDialogue, HistoryEntry, HistoryRole, PartnerReply, RespondRequest, Review,
    ReviewRequest, ScenarioRequest,
};

use crate::error::Result;
use crate::recording::RecordingUnit;
use crate::session::ProficiencyLevel;

#[async_trait::async_trait]
pub trait PracticeApi: Send + Sync {
    /// Speech to text for one recording
    async fn transcribe(&self, unit: &RecordingUnit) -> Result<String>;

    /// Partner reply plus synthesized speech. `audio_url` is absolute.
    async fn respond(&self, request: &RespondRequest) -> Result<PartnerReply>;

    async fn generate_scenario(&self, request: &ScenarioRequest) -> Result<String>;

    async fn example_dialogue(&self, level: ProficiencyLevel, scenario: &str) -> Result<ExampleDialogue>;

    async fn review(&self, request: &ReviewRequest) -> Result<Review>;
}
