use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::interview::models::{ExperienceLevel, Mistake, QuestionRecord};
use crate::interview::session::{FinishReason, SessionSummary};

/// Immutable snapshot of a finished interview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub job_role: String,
    pub experience_level: ExperienceLevel,
    pub questions: Vec<QuestionRecord>,
    pub score: u8,
    pub mistakes: Vec<Mistake>,
    /// Seconds spent in the session.
    pub total_time: u64,
    pub finish_reason: FinishReason,
}

impl HistoryEntry {
    pub fn from_summary(summary: &SessionSummary, date: DateTime<Utc>) -> Self {
        Self {
            id: summary.session_id,
            user_id: summary.user_id.clone(),
            date,
            job_role: summary.job_role.clone(),
            experience_level: summary.experience_level,
            questions: summary.questions.clone(),
            score: summary.score,
            mistakes: summary.mistakes.clone(),
            total_time: summary.total_time_secs,
            finish_reason: summary.finish_reason,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    pub job_role: String,
    pub experience_level: String,
    pub score: i16,
    pub total_time_secs: i64,
    pub finish_reason: String,
    pub questions: Value,
    pub mistakes: Value,
}
