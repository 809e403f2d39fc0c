pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::history::handlers as history;
use crate::interview::handlers as interview;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview API
        .route("/api/v1/interviews", post(interview::handle_start))
        .route("/api/v1/interviews/:id", get(interview::handle_get))
        .route(
            "/api/v1/interviews/:id/answer",
            put(interview::handle_stage_answer),
        )
        .route("/api/v1/interviews/:id/next", post(interview::handle_next))
        .route(
            "/api/v1/interviews/:id/finish",
            post(interview::handle_finish),
        )
        .route("/api/v1/feedback", post(interview::handle_evaluate))
        // History API
        .route("/api/v1/history", get(history::handle_list_history))
        .route("/api/v1/history/progress", get(history::handle_progress))
        .with_state(state)
}
