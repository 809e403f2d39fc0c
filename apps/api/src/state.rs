use crate::history::recorder::HistoryRecorder;
use crate::interview::engine::InterviewEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: InterviewEngine,
    /// Same recorder the engine writes through; handlers only read from it.
    pub history: HistoryRecorder,
}
