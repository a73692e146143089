use super::state::AppState;
use crate::api::{ExampleDialogue, Review};
use crate::error::PracticeError;
use crate::playback::PlaybackHandle;
use crate::session::{MessageId, ProficiencyLevel, ScenarioKind, SessionSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SelectLevelRequest {
    pub level: ProficiencyLevel,
}

#[derive(Debug, Serialize)]
pub struct ScenarioResponse {
    pub scenario: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub transcript: String,
    pub reply: String,
    pub audio_url: Option<String>,
    pub user_message: MessageId,
    pub partner_message: MessageId,
    /// Handle the partner audio was attached to
    pub playback_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Short text suitable for a transient notice
    pub notice: String,
}

/// HTTP status for a session error
pub fn error_status(error: &PracticeError) -> StatusCode {
    match error {
        PracticeError::PermissionDenied => StatusCode::FORBIDDEN,
        PracticeError::TooShortRecording { .. }
        | PracticeError::EmptyTranscription
        | PracticeError::EmptyReply
        | PracticeError::InvalidSituation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PracticeError::ConcurrentPipelineRejected
        | PracticeError::SessionInvalidated
        | PracticeError::InvalidState(_) => StatusCode::CONFLICT,
        PracticeError::Network(_) | PracticeError::Server { .. } => StatusCode::BAD_GATEWAY,
        PracticeError::RetryExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PracticeError::Capture(_)
        | PracticeError::Storage(_)
        | PracticeError::Json(_)
        | PracticeError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: PracticeError) -> Response {
    let status = error_status(&error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            notice: error.notice(),
        }),
    )
        .into_response()
}

fn status(text: &str) -> Response {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: text.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot())
}

/// POST /session/level
pub async fn select_level(
    State(state): State<AppState>,
    Json(req): Json<SelectLevelRequest>,
) -> Response {
    match state.controller.select_level(req.level) {
        Ok(()) => (StatusCode::OK, Json(state.controller.snapshot())).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/scenario
pub async fn generate_scenario(
    State(state): State<AppState>,
    Json(kind): Json<ScenarioKind>,
) -> Response {
    match state.controller.generate_scenario(kind).await {
        Ok(scenario) => (StatusCode::OK, Json(ScenarioResponse { scenario })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/record/start
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.controller.start_recording().await {
        Ok(()) => status("recording"),
        Err(e) => error_response(e),
    }
}

/// POST /session/record/stop
/// Stop the microphone and run the exchange for what was said
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    // This request is the user gesture, so the playback slot is made here
    let playback = PlaybackHandle::new();

    match state.controller.stop_recording(&playback).await {
        Ok(exchange) => {
            info!("Exchange complete, playback {}", playback.id());
            (
                StatusCode::OK,
                Json(StopRecordingResponse {
                    transcript: exchange.transcript,
                    reply: exchange.reply.response,
                    audio_url: exchange.reply.audio_url,
                    user_message: exchange.user_message,
                    partner_message: exchange.partner_message,
                    playback_id: playback.id().to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /session/record/cancel
pub async fn cancel_recording(State(state): State<AppState>) -> Response {
    state.controller.cancel_recording().await;
    status("idle")
}

/// GET /session/example
pub async fn example_dialogue(State(state): State<AppState>) -> Response {
    match state.controller.example_dialogue().await {
        Ok(dialogue) => (StatusCode::OK, Json::<ExampleDialogue>(dialogue)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/review
pub async fn review_conversation(State(state): State<AppState>) -> Response {
    match state.controller.review_conversation().await {
        Ok(review) => (StatusCode::OK, Json::<Review>(review)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
