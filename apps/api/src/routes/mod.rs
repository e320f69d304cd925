pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::rating::handlers::handle_rate_resume;
use crate::sessions::handlers::handle_session_history;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/resumes/rate",
            post(handle_rate_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/sessions/history", get(handle_session_history))
        .with_state(state)
}
