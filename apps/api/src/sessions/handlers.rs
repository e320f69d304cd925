use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::sessions::SessionRecord;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Option<String>,
}

/// GET /api/v1/sessions/history
pub async fn handle_session_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SessionRecord>, AppError> {
    let user_id = params
        .user_id
        .unwrap_or_else(|| state.config.default_user_id.clone());

    let record = state
        .sessions
        .get_history(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No session found for user {user_id}")))?;

    Ok(Json(record))
}
