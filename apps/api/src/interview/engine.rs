//! Interview engine: owns the active sessions and drives them.
//!
//! Flow per transition:
//!   lock session → state-machine step → unlock → (await evaluation |
//!   await next question | record history) → lock → apply (generation-checked).
//!
//! The session lock is never held across an LLM or storage call.
//! Timer ticks arrive over an mpsc channel from one `Ticker` per session and
//! are applied by a single dispatcher task; expiry and the follow-up advance
//! happen under the same lock acquisition, so one expiry yields one advance.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::InterviewSettings;
use crate::errors::AppError;
use crate::history::recorder::HistoryRecorder;
use crate::interview::feedback::FeedbackRequester;
use crate::interview::models::{Evaluation, ExperienceLevel};
use crate::interview::questions::QuestionGenerator;
use crate::interview::session::{
    AdvancePlan, FinishReason, HistoryStatus, InterviewSession, SessionState, SessionSummary,
    SessionView, StepOutcome, TickEffect,
};
use crate::interview::timer::{Ticker, TimerEvent};

/// Finished sessions stay readable this long before being pruned.
const FINISHED_RETENTION_MINUTES: i64 = 30;
const TIMER_CHANNEL_CAPACITY: usize = 256;

/// One registered session plus its tick source.
struct ActiveSession {
    job_role: String,
    level: ExperienceLevel,
    session: Mutex<InterviewSession>,
    ticker: Mutex<Option<Ticker>>,
}

impl ActiveSession {
    async fn stop_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.stop();
        }
    }

    async fn view(&self) -> SessionView {
        self.session.lock().await.view()
    }
}

/// Work left over after a tick was applied under the session lock.
enum TickFollowUp {
    Drive(AdvancePlan),
    Conclude(SessionSummary),
}

struct EngineInner {
    settings: InterviewSettings,
    questions: QuestionGenerator,
    feedback: FeedbackRequester,
    recorder: HistoryRecorder,
    sessions: RwLock<HashMap<Uuid, Arc<ActiveSession>>>,
    timer_tx: mpsc::Sender<TimerEvent>,
}

#[derive(Clone)]
pub struct InterviewEngine {
    inner: Arc<EngineInner>,
}

impl InterviewEngine {
    /// Must be called inside a tokio runtime: spawns the tick dispatcher.
    pub fn new(
        settings: InterviewSettings,
        questions: QuestionGenerator,
        feedback: FeedbackRequester,
        recorder: HistoryRecorder,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(TIMER_CHANNEL_CAPACITY);
        let inner = Arc::new(EngineInner {
            settings,
            questions,
            feedback,
            recorder,
            sessions: RwLock::new(HashMap::new()),
            timer_tx,
        });
        spawn_dispatcher(Arc::downgrade(&inner), timer_rx);
        Self { inner }
    }

    /// `NotStarted → InProgress`: validates, fetches the first question and
    /// starts the session's ticker.
    pub async fn start(
        &self,
        user_id: &str,
        job_role: &str,
        experience_level: &str,
    ) -> Result<SessionView, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id is required".to_string()));
        }

        let mut session = InterviewSession::new(user_id.trim(), self.inner.settings);
        let generation = session.start(job_role, experience_level)?;
        let job_role = session.job_role().to_string();
        let level = session
            .experience_level()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("started session has no level")))?;

        let question = self.inner.questions.next_question(&job_role, level).await;
        session.set_question(generation, question);

        let id = session.id();
        let active = Arc::new(ActiveSession {
            job_role,
            level,
            session: Mutex::new(session),
            ticker: Mutex::new(None),
        });

        self.prune_finished().await;
        self.inner.sessions.write().await.insert(id, active.clone());
        *active.ticker.lock().await = Some(Ticker::spawn(
            id,
            self.inner.settings.tick_period,
            self.inner.timer_tx.clone(),
        ));

        Ok(active.view().await)
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionView, AppError> {
        Ok(self.lookup(id).await?.view().await)
    }

    pub async fn stage_answer(
        &self,
        id: Uuid,
        question_index: u32,
        answer: &str,
    ) -> Result<SessionView, AppError> {
        let active = self.lookup(id).await?;
        let mut session = active.session.lock().await;
        session.stage_answer(question_index, answer)?;
        Ok(session.view())
    }

    /// Explicit "next" on `question_index`: evaluates the staged answer (if
    /// any) and moves on. Conflicts if the session is already past it.
    pub async fn advance(&self, id: Uuid, question_index: u32) -> Result<SessionView, AppError> {
        let active = self.lookup(id).await?;
        let plan = active.session.lock().await.advance(question_index)?;
        self.drive(&active, plan).await;
        Ok(active.view().await)
    }

    /// Explicit early termination.
    pub async fn finish(&self, id: Uuid) -> Result<SessionView, AppError> {
        let active = self.lookup(id).await?;
        let summary = active
            .session
            .lock()
            .await
            .finish_early(FinishReason::EndedEarly)?;
        self.conclude(&active, summary).await;
        Ok(active.view().await)
    }

    /// Stateless evaluation for live feedback; touches no session.
    pub async fn evaluate(&self, question: &str, answer: &str) -> Evaluation {
        self.inner.feedback.evaluate(question, answer).await
    }

    async fn lookup(&self, id: Uuid) -> Result<Arc<ActiveSession>, AppError> {
        self.inner
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))
    }

    async fn drive(&self, active: &ActiveSession, plan: AdvancePlan) {
        let outcome = match plan {
            AdvancePlan::Step(outcome) => outcome,
            AdvancePlan::Evaluate(ticket) => {
                let evaluation = self
                    .inner
                    .feedback
                    .evaluate(&ticket.question, &ticket.answer)
                    .await;
                let mut session = active.session.lock().await;
                match session.complete_advance(&ticket, evaluation) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Discarding evaluation for interview {}: {e}", session.id());
                        return;
                    }
                }
            }
        };

        match outcome {
            StepOutcome::NextQuestion { generation, index } => {
                let question = self
                    .inner
                    .questions
                    .next_question(&active.job_role, active.level)
                    .await;
                let mut session = active.session.lock().await;
                if session.set_question(generation, question) {
                    debug!("Interview {} moved to question {index}", session.id());
                } else {
                    debug!(
                        "Dropping late question {index} for interview {}",
                        session.id()
                    );
                }
            }
            StepOutcome::Finished(summary) => self.conclude(active, summary).await,
        }
    }

    /// Stops the ticker and records the summary. A storage failure is kept on
    /// the session for the client to see; the score stands either way.
    async fn conclude(&self, active: &ActiveSession, summary: SessionSummary) {
        active.stop_ticker().await;
        if summary.is_abandoned() {
            info!(
                "Interview {} timed out with no answers; not recording it",
                summary.session_id
            );
            return;
        }
        let status = match self.inner.recorder.record(&summary).await {
            Ok(_) => HistoryStatus::Saved,
            Err(e) => {
                error!(
                    "Failed to save interview {} to history: {e}",
                    summary.session_id
                );
                HistoryStatus::Failed(e.to_string())
            }
        };
        active.session.lock().await.mark_history(status);
    }

    async fn apply_tick(&self, id: Uuid) {
        let Some(active) = self.inner.sessions.read().await.get(&id).cloned() else {
            return;
        };

        let follow_up = {
            let mut session = active.session.lock().await;
            match session.tick() {
                TickEffect::Ignored | TickEffect::Running => None,
                TickEffect::QuestionExpired => {
                    info!(
                        "Question {} of interview {id} timed out",
                        session.current_index()
                    );
                    match session.begin_advance() {
                        Ok(plan) => Some(TickFollowUp::Drive(plan)),
                        Err(e) => {
                            debug!("Timeout advance skipped for interview {id}: {e}");
                            None
                        }
                    }
                }
                TickEffect::TimeUp => {
                    info!("Interview {id} ran out of total time");
                    match session.finish_early(FinishReason::TimeUp) {
                        Ok(summary) => Some(TickFollowUp::Conclude(summary)),
                        Err(e) => {
                            debug!("Time-up finish skipped for interview {id}: {e}");
                            None
                        }
                    }
                }
            }
        };

        if let Some(follow_up) = follow_up {
            let engine = self.clone();
            tokio::spawn(async move {
                match follow_up {
                    TickFollowUp::Drive(plan) => engine.drive(&active, plan).await,
                    TickFollowUp::Conclude(summary) => engine.conclude(&active, summary).await,
                }
            });
        }
    }

    /// Drops finished sessions older than the retention window. Busy
    /// sessions are skipped and picked up next time.
    async fn prune_finished(&self) {
        let cutoff = Utc::now() - chrono::Duration::minutes(FINISHED_RETENTION_MINUTES);
        let mut sessions = self.inner.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, active| match active.session.try_lock() {
            Ok(session) => !(session.state() == SessionState::Finished
                && session.finished_at().is_some_and(|at| at < cutoff)),
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!("Pruned {pruned} finished interview session(s)");
        }
    }
}

fn spawn_dispatcher(inner: Weak<EngineInner>, mut rx: mpsc::Receiver<TimerEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            InterviewEngine { inner }.apply_tick(event.session_id).await;
        }
        debug!("Timer dispatcher stopped");
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::history::store::testing::FailingHistoryStore;
    use crate::history::store::{HistoryStore, MemoryHistoryStore};
    use crate::interview::models::{EvaluationStatus, MistakeType};
    use crate::llm_client::testing::ScriptedGenerator;

    const EVAL_ONE_MISTAKE: &str = "Feedback: Decent.\nModel Answer: Better.\nMistakes:\n- \"um\" (Type: clarity) - Filler word.";

    fn settings(count: u32, question_secs: u64) -> InterviewSettings {
        InterviewSettings {
            question_count: count,
            question_time: Duration::from_secs(question_secs),
            total_time: Duration::from_secs(1200),
            tick_period: Duration::from_secs(1),
        }
    }

    fn engine_with(
        settings: InterviewSettings,
        reply: &str,
        store: Arc<dyn HistoryStore>,
    ) -> InterviewEngine {
        let generator = Arc::new(ScriptedGenerator::always(reply));
        InterviewEngine::new(
            settings,
            QuestionGenerator::new(generator.clone()),
            FeedbackRequester::new(generator),
            HistoryRecorder::new(store),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_start_validates_inputs() {
        let engine = engine_with(settings(3, 60), "Q", Arc::new(MemoryHistoryStore::new()));
        assert!(matches!(
            engine.start("u", "", "junior").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.start("u", "Engineer", " ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            engine.start("", "Engineer", "junior").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_start_fetches_first_question() {
        let engine = engine_with(
            settings(3, 60),
            "What is backpressure?",
            Arc::new(MemoryHistoryStore::new()),
        );
        let view = engine.start("u", "Engineer", "junior").await.unwrap();
        assert_eq!(view.state, SessionState::InProgress);
        assert_eq!(view.current_question_index, 1);
        assert_eq!(view.question, "What is backpressure?");
        assert_eq!(view.time_left_secs, 60);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let engine = engine_with(settings(3, 60), "Q", Arc::new(MemoryHistoryStore::new()));
        assert!(matches!(
            engine.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_full_session_records_history() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(settings(2, 60), EVAL_ONE_MISTAKE, store.clone());
        let view = engine.start("u", "Engineer", "senior").await.unwrap();

        engine.stage_answer(view.id, 1, "um, a queue").await.unwrap();
        let view = engine.advance(view.id, 1).await.unwrap();
        assert_eq!(view.current_question_index, 2);
        assert_eq!(view.mistakes.len(), 1);
        assert_eq!(view.mistakes[0].kind, MistakeType::Clarity);

        let view = engine.advance(view.id, 2).await.unwrap();
        assert_eq!(view.state, SessionState::Finished);
        // one clarity mistake + one unanswered out of two
        assert_eq!(view.score, Some(0));
        assert_eq!(view.history_saved, Some(true));

        let history = store.list("u").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, view.id);
        assert_eq!(history[0].questions.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_immediately_scores_zero() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(settings(10, 60), "Q", store.clone());
        let view = engine.start("u", "Engineer", "mid-level").await.unwrap();

        let view = engine.finish(view.id).await.unwrap();

        assert_eq!(view.score, Some(0));
        assert_eq!(view.mistakes.len(), 10);
        assert_eq!(view.finish_reason, Some(FinishReason::EndedEarly));
        assert_eq!(store.list("u").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_score() {
        let engine = engine_with(settings(3, 60), "Q", Arc::new(FailingHistoryStore));
        let view = engine.start("u", "Engineer", "junior").await.unwrap();

        let view = engine.finish(view.id).await.unwrap();

        assert_eq!(view.score, Some(0));
        assert_eq!(view.history_saved, Some(false));
        assert!(view.save_error.is_some());
    }

    #[tokio::test]
    async fn test_actions_on_finished_session_conflict() {
        let engine = engine_with(settings(3, 60), "Q", Arc::new(MemoryHistoryStore::new()));
        let view = engine.start("u", "Engineer", "junior").await.unwrap();
        engine.finish(view.id).await.unwrap();

        assert!(matches!(
            engine.advance(view.id, 1).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            engine.stage_answer(view.id, 1, "late").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            engine.finish(view.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expiry_advances_exactly_once() {
        let engine = engine_with(settings(10, 3), "Q", Arc::new(MemoryHistoryStore::new()));
        let view = engine.start("u", "Engineer", "junior").await.unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        settle().await;
        let after_first = engine.get(view.id).await.unwrap();
        assert_eq!(after_first.current_question_index, 2);
        assert_eq!(after_first.mistakes.len(), 1);
        assert_eq!(after_first.time_left_secs, 3);
        assert_eq!(after_first.elapsed_total_secs, 3);

        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        let after_second = engine.get(view.id).await.unwrap();
        assert_eq!(after_second.current_question_index, 3);
        assert_eq!(after_second.mistakes.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_evaluates_staged_answer() {
        let engine = engine_with(
            settings(10, 3),
            EVAL_ONE_MISTAKE,
            Arc::new(MemoryHistoryStore::new()),
        );
        let view = engine.start("u", "Engineer", "junior").await.unwrap();
        engine
            .stage_answer(view.id, 1, "um, a bounded channel")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        settle().await;

        let view = engine.get(view.id).await.unwrap();
        assert_eq!(view.current_question_index, 2);
        assert_eq!(view.answered_count, 1);
        assert_eq!(
            view.mistakes.iter().map(|m| m.kind).collect::<Vec<_>>(),
            vec![MistakeType::Clarity]
        );
        let evaluation = view.last_evaluation.unwrap();
        assert_eq!(evaluation.status, EvaluationStatus::Evaluated);
        assert_eq!(evaluation.feedback, "Decent.");
        assert_eq!(view.staged_answer, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_for_expired_question_conflicts() {
        let engine = engine_with(settings(10, 3), "Q", Arc::new(MemoryHistoryStore::new()));
        let view = engine.start("u", "Engineer", "junior").await.unwrap();

        tokio::time::sleep(Duration::from_millis(3100)).await;
        settle().await;
        assert_eq!(engine.get(view.id).await.unwrap().current_question_index, 2);

        // The client still shows question 1 when it clicks "next".
        assert!(matches!(
            engine.advance(view.id, 1).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            engine.stage_answer(view.id, 1, "for question one").await,
            Err(AppError::Conflict(_))
        ));

        let view = engine.get(view.id).await.unwrap();
        assert_eq!(view.current_question_index, 2);
        assert_eq!(view.mistakes.len(), 1);
        assert_eq!(view.staged_answer, "");
    }

    fn short_total_budget() -> InterviewSettings {
        InterviewSettings {
            question_count: 10,
            question_time: Duration::from_secs(120),
            total_time: Duration::from_secs(5),
            tick_period: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_time_up_finishes_session() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(short_total_budget(), EVAL_ONE_MISTAKE, store.clone());
        let view = engine.start("u", "Engineer", "junior").await.unwrap();
        engine.stage_answer(view.id, 1, "um, yes").await.unwrap();
        engine.advance(view.id, 1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        settle().await;

        let view = engine.get(view.id).await.unwrap();
        assert_eq!(view.state, SessionState::Finished);
        assert_eq!(view.finish_reason, Some(FinishReason::TimeUp));
        // one clarity mistake + nine unanswered out of ten
        assert_eq!(view.score, Some(0));
        assert_eq!(view.history_saved, Some(true));
        assert_eq!(store.list("u").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_session_is_not_recorded() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = engine_with(short_total_budget(), "Q", store.clone());
        let view = engine.start("u", "Engineer", "junior").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        settle().await;

        let view = engine.get(view.id).await.unwrap();
        assert_eq!(view.state, SessionState::Finished);
        assert_eq!(view.finish_reason, Some(FinishReason::TimeUp));
        assert_eq!(view.history_saved, None);
        assert!(store.list("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stateless_evaluate_does_not_touch_sessions() {
        let engine = engine_with(
            settings(3, 60),
            EVAL_ONE_MISTAKE,
            Arc::new(MemoryHistoryStore::new()),
        );
        let evaluation = engine.evaluate("What is a deadlock?", "um, two locks").await;
        assert_eq!(evaluation.mistakes.len(), 1);
        assert_eq!(evaluation.feedback, "Decent.");
        assert!(engine.inner.sessions.read().await.is_empty());
    }
}
