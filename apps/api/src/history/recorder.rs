use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::history::store::{HistoryError, HistoryStore};
use crate::interview::session::SessionSummary;
use crate::models::history::HistoryEntry;

/// Turns finished sessions into history entries and appends them to the store.
/// No dedup and no cap: history grows for as long as the store keeps it.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, summary: &SessionSummary) -> Result<HistoryEntry, HistoryError> {
        let entry = HistoryEntry::from_summary(summary, Utc::now());
        self.store.append(&entry).await?;
        info!(
            "Recorded interview {} for user {}: score {}",
            entry.id, entry.user_id, entry.score
        );
        Ok(entry)
    }

    /// Newest first. Safe to call repeatedly.
    pub async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.store.list(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::history::store::testing::FailingHistoryStore;
    use crate::history::store::MemoryHistoryStore;
    use crate::interview::models::{ExperienceLevel, Mistake};
    use crate::interview::session::FinishReason;

    fn summary(user_id: &str, score: u8) -> SessionSummary {
        SessionSummary {
            session_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            job_role: "QA Engineer".to_string(),
            experience_level: ExperienceLevel::Junior,
            questions: Vec::new(),
            mistakes: vec![Mistake::unanswered()],
            score,
            total_time_secs: 42,
            finish_reason: FinishReason::EndedEarly,
        }
    }

    #[tokio::test]
    async fn test_record_appends_snapshot_of_summary() {
        let recorder = HistoryRecorder::new(Arc::new(MemoryHistoryStore::new()));
        let s = summary("dana", 90);

        let entry = recorder.record(&s).await.unwrap();

        assert_eq!(entry.id, s.session_id);
        assert_eq!(entry.score, 90);
        assert_eq!(entry.total_time, 42);
        assert_eq!(entry.mistakes, s.mistakes);
        assert_eq!(recorder.list_history("dana").await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_read_idempotent() {
        let recorder = HistoryRecorder::new(Arc::new(MemoryHistoryStore::new()));
        recorder.record(&summary("dana", 10)).await.unwrap();
        recorder.record(&summary("dana", 60)).await.unwrap();

        let first = recorder.list_history("dana").await.unwrap();
        let second = recorder.list_history("dana").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].score, 60);
        assert_eq!(first[1].score, 10);
    }

    #[tokio::test]
    async fn test_record_surfaces_store_failure() {
        let recorder = HistoryRecorder::new(Arc::new(FailingHistoryStore));
        assert!(recorder.record(&summary("dana", 10)).await.is_err());
    }
}
