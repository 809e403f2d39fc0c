//! Axum route handlers for the Interview API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::Evaluation;
use crate::interview::session::SessionView;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    pub user_id: String,
    #[serde(default)]
    pub job_role: String,
    /// Kept as free text so a blank value is a validation error, not a decode error.
    #[serde(default)]
    pub experience_level: String,
}

/// `question_index` is the question the client is showing; requests for a
/// question the session has already left are rejected with 409.
#[derive(Debug, Deserialize)]
pub struct StageAnswerRequest {
    pub question_index: u32,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub question_index: u32,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub question: String,
    pub answer: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interviews
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state
        .engine
        .start(&req.user_id, &req.job_role, &req.experience_level)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.engine.get(id).await?))
}

/// PUT /api/v1/interviews/:id/answer
pub async fn handle_stage_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StageAnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        state
            .engine
            .stage_answer(id, req.question_index, &req.answer)
            .await?,
    ))
}

/// POST /api/v1/interviews/:id/next
///
/// Evaluates the staged answer (blank answers are recorded as unanswered)
/// and moves to the next question, or finishes after the last one.
pub async fn handle_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.engine.advance(id, req.question_index).await?))
}

/// POST /api/v1/interviews/:id/finish
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.engine.finish(id).await?))
}

/// POST /api/v1/feedback
///
/// Live feedback preview for a question/answer pair. Never touches a session.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Json<Evaluation> {
    Json(state.engine.evaluate(&req.question, &req.answer).await)
}
