//! History backends. Every backend is append-only and lists newest first.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::interview::models::ExperienceLevel;
use crate::models::history::{HistoryEntry, HistoryRow};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt history record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;

    /// All entries for `user_id`, newest first. Has no side effects.
    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, HistoryError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            INSERT INTO interview_history
                (id, user_id, recorded_at, job_role, experience_level, score,
                 total_time_secs, finish_reason, questions, mistakes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.date)
        .bind(&entry.job_role)
        .bind(entry.experience_level.as_str())
        .bind(i16::from(entry.score))
        .bind(i64::try_from(entry.total_time).unwrap_or(i64::MAX))
        .bind(entry.finish_reason.as_str())
        .bind(serde_json::to_value(&entry.questions)?)
        .bind(serde_json::to_value(&entry.mistakes)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, user_id, recorded_at, job_role, experience_level, score,
                   total_time_secs, finish_reason, questions, mistakes
            FROM interview_history
            WHERE user_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: HistoryRow) -> Result<HistoryEntry, HistoryError> {
    let experience_level = ExperienceLevel::parse(&row.experience_level).ok_or_else(|| {
        HistoryError::Corrupt(format!(
            "entry {} has unknown experience level '{}'",
            row.id, row.experience_level
        ))
    })?;
    let score = u8::try_from(row.score)
        .map_err(|_| HistoryError::Corrupt(format!("entry {} has score {}", row.id, row.score)))?;

    Ok(HistoryEntry {
        id: row.id,
        user_id: row.user_id,
        date: row.recorded_at,
        job_role: row.job_role,
        experience_level,
        questions: serde_json::from_value(row.questions)?,
        score,
        mistakes: serde_json::from_value(row.mistakes)?,
        total_time: u64::try_from(row.total_time_secs).unwrap_or(0),
        finish_reason: serde_json::from_value(Value::String(row.finish_reason))?,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Redis: one list per user, LPUSH keeps it newest first
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisHistoryStore {
    client: redis::Client,
}

impl RedisHistoryStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

fn redis_key(user_id: &str) -> String {
    format!("interview:history:{user_id}")
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.lpush(redis_key(&entry.user_id), payload).await?;
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Vec<String> = conn.lrange(redis_key(user_id), 0, -1).await?;
        raw.iter()
            .map(|item| serde_json::from_str(item).map_err(HistoryError::from))
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}
