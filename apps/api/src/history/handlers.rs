use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::history::progress::{compute_progress, ProgressReport};
use crate::models::history::HistoryEntry;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

fn require_user(params: &UserIdQuery) -> Result<&str, AppError> {
    let user_id = params.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".to_string()));
    }
    Ok(user_id)
}

/// GET /api/v1/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let user_id = require_user(&params)?;
    Ok(Json(state.history.list_history(user_id).await?))
}

/// GET /api/v1/history/progress
pub async fn handle_progress(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ProgressReport>, AppError> {
    let user_id = require_user(&params)?;
    let history = state.history.list_history(user_id).await?;
    Ok(Json(compute_progress(&history)))
}
