//! Local control API for a presentation layer
//!
//! - GET /health - Health check
//! - GET /session - Current session snapshot
//! - POST /session/level - Change proficiency level
//! - POST /session/scenario - Generate a random or custom scenario
//! - POST /session/record/{start,stop,cancel} - Drive the microphone
//! - GET /session/example - Example dialogue for the scenario
//! - POST /session/review - Review the conversation so far

mod handlers;
mod routes;
mod state;

pub use handlers::error_status;
pub use routes::create_router;
pub use state::AppState;
