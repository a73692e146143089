use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Session state
        .route("/session", get(handlers::get_session))
        .route("/session/level", post(handlers::select_level))
        .route("/session/scenario", post(handlers::generate_scenario))
        // Recording control
        .route("/session/record/start", post(handlers::start_recording))
        .route("/session/record/stop", post(handlers::stop_recording))
        .route("/session/record/cancel", post(handlers::cancel_recording))
        // Study aids
        .route("/session/example", get(handlers::example_dialogue))
        .route("/session/review", post(handlers::review_conversation))
        // The presentation layer is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
