//! Question/Answer Session State Machine.
//!
//! `NotStarted → InProgress → Finished`. The machine is synchronous; the one
//! suspending step (answer evaluation) is split in two: `begin_advance` hands
//! out an `EvaluationTicket`, the caller awaits the evaluation without holding
//! the session, and `complete_advance` applies it. Every question transition
//! bumps `generation`; a ticket or question reply from an older generation is
//! rejected, so a late response can never touch the next question.
//!
//! Invariant at `Finished`: exactly `question_count` question records exist,
//! each `Answered` or `Unanswered`, and every `Unanswered` record has a
//! matching `unanswered` mistake.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::InterviewSettings;
use crate::interview::models::{
    Evaluation, ExperienceLevel, Mistake, QuestionOutcome, QuestionRecord,
};
use crate::interview::scoring::compute_score;
use crate::interview::timer::{QuestionTimer, TickOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("Session is {0}, not in progress")]
    NotInProgress(SessionState),

    #[error("An answer for question {0} is already being evaluated")]
    AdvanceInFlight(u32),

    #[error("Request targets question {requested} but the session is on question {current}")]
    QuestionMismatch { requested: u32, current: u32 },

    #[error("Evaluation for generation {ticket} is stale (session is at generation {current})")]
    StaleEvaluation { ticket: u64, current: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::NotStarted => "not started",
            SessionState::InProgress => "in progress",
            SessionState::Finished => "finished",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Advanced past the last question.
    Completed,
    /// The user ended the session.
    EndedEarly,
    /// The total time budget ran out.
    TimeUp,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Completed => "completed",
            FinishReason::EndedEarly => "ended_early",
            FinishReason::TimeUp => "time_up",
        }
    }
}

/// What a timer tick means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    /// Not in progress; nothing changed.
    Ignored,
    Running,
    /// The per-question countdown just hit zero and no advance is in flight.
    QuestionExpired,
    /// The total budget is used up.
    TimeUp,
}

/// The answer that must be evaluated before the session can move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationTicket {
    pub generation: u64,
    pub question_index: u32,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A new question is due; request it for `generation`.
    NextQuestion { generation: u64, index: u32 },
    Finished(SessionSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvancePlan {
    /// The transition completed without contacting the feedback service.
    Step(StepOutcome),
    Evaluate(EvaluationTicket),
}

/// Everything that survives a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub user_id: String,
    pub job_role: String,
    pub experience_level: ExperienceLevel,
    pub questions: Vec<QuestionRecord>,
    pub mistakes: Vec<Mistake>,
    pub score: u8,
    pub total_time_secs: u64,
    pub finish_reason: FinishReason,
}

impl SessionSummary {
    /// Ran out of time without a single answered question: the client walked
    /// away. Such sessions are not recorded.
    pub fn is_abandoned(&self) -> bool {
        self.finish_reason == FinishReason::TimeUp
            && self
                .questions
                .iter()
                .all(|q| q.outcome == QuestionOutcome::Unanswered)
    }
}

/// Whether the finished session made it into history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStatus {
    NotRecorded,
    Saved,
    Failed(String),
}

/// Serializable snapshot served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub user_id: String,
    pub state: SessionState,
    pub job_role: String,
    pub experience_level: Option<ExperienceLevel>,
    pub question_count: u32,
    pub current_question_index: u32,
    pub question: String,
    pub staged_answer: String,
    pub time_left_secs: u64,
    pub elapsed_total_secs: u64,
    pub question_time_secs: u64,
    pub total_time_secs: u64,
    pub evaluating: bool,
    pub answered_count: u32,
    pub mistakes: Vec<Mistake>,
    pub last_evaluation: Option<Evaluation>,
    pub score: Option<u8>,
    pub finish_reason: Option<FinishReason>,
    pub history_saved: Option<bool>,
    pub save_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct InterviewSession {
    id: Uuid,
    user_id: String,
    settings: InterviewSettings,
    state: SessionState,
    job_role: String,
    experience_level: Option<ExperienceLevel>,
    current_index: u32,
    question: String,
    staged_answer: String,
    timer: QuestionTimer,
    mistakes: Vec<Mistake>,
    records: Vec<QuestionRecord>,
    generation: u64,
    in_flight: Option<u64>,
    last_evaluation: Option<Evaluation>,
    score: Option<u8>,
    finish_reason: Option<FinishReason>,
    history: HistoryStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl InterviewSession {
    pub fn new(user_id: impl Into<String>, settings: InterviewSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            settings,
            state: SessionState::NotStarted,
            job_role: String::new(),
            experience_level: None,
            current_index: 0,
            question: String::new(),
            staged_answer: String::new(),
            timer: QuestionTimer::new(settings.question_time.as_secs()),
            mistakes: Vec::new(),
            records: Vec::new(),
            generation: 0,
            in_flight: None,
            last_evaluation: None,
            score: None,
            finish_reason: None,
            history: HistoryStatus::NotRecorded,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn mistakes(&self) -> &[Mistake] {
        &self.mistakes
    }

    pub fn records(&self) -> &[QuestionRecord] {
        &self.records
    }

    pub fn score(&self) -> Option<u8> {
        self.score
    }

    pub fn job_role(&self) -> &str {
        &self.job_role
    }

    pub fn experience_level(&self) -> Option<ExperienceLevel> {
        self.experience_level
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn answered_count(&self) -> u32 {
        self.records
            .iter()
            .filter(|r| r.outcome == QuestionOutcome::Answered)
            .count() as u32
    }

    /// `NotStarted → InProgress`. Returns the generation the first question
    /// must be requested for.
    pub fn start(&mut self, job_role: &str, experience_level: &str) -> Result<u64, SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::NotInProgress(self.state));
        }
        let job_role = job_role.trim();
        if job_role.is_empty() || experience_level.trim().is_empty() {
            return Err(SessionError::Validation(
                "Please fill in both job role and experience level".to_string(),
            ));
        }
        let level = ExperienceLevel::parse(experience_level).ok_or_else(|| {
            SessionError::Validation(format!(
                "experience_level must be one of junior, mid-level, senior (got '{}')",
                experience_level.trim()
            ))
        })?;

        self.job_role = job_role.to_string();
        self.experience_level = Some(level);
        self.state = SessionState::InProgress;
        self.current_index = 1;
        self.timer.reset(self.question_budget());
        self.started_at = Some(Utc::now());

        info!(
            "Interview {} started: {} ({}), {} questions",
            self.id, self.job_role, level, self.settings.question_count
        );
        Ok(self.generation)
    }

    /// Applies a generated question. Ignored (returns false) if the session
    /// has moved past the generation it was requested for.
    pub fn set_question(&mut self, generation: u64, question: String) -> bool {
        if self.state != SessionState::InProgress || generation != self.generation {
            return false;
        }
        self.question = question;
        true
    }

    /// Stages the answer for `question_index`. Rejected once the session has
    /// moved on, or while the current answer is being evaluated.
    pub fn stage_answer(&mut self, question_index: u32, answer: &str) -> Result<(), SessionError> {
        self.require_in_progress()?;
        self.require_question(question_index)?;
        if self.in_flight.is_some() {
            return Err(SessionError::AdvanceInFlight(self.current_index));
        }
        self.staged_answer = answer.to_string();
        Ok(())
    }

    /// Client-requested advance. `question_index` is the question the client
    /// was looking at; if a timer expiry already moved the session on, the
    /// request is rejected instead of skipping the next question.
    pub fn advance(&mut self, question_index: u32) -> Result<AdvancePlan, SessionError> {
        self.require_in_progress()?;
        self.require_question(question_index)?;
        self.begin_advance()
    }

    pub fn tick(&mut self) -> TickEffect {
        if self.state != SessionState::InProgress {
            return TickEffect::Ignored;
        }
        let outcome = self.timer.tick();
        if self.timer.elapsed_total() >= self.settings.total_time.as_secs() {
            return TickEffect::TimeUp;
        }
        match outcome {
            TickOutcome::Expired if self.in_flight.is_none() => TickEffect::QuestionExpired,
            _ => TickEffect::Running,
        }
    }

    /// First half of `InProgress → InProgress`, for whatever question is
    /// current. Used by timer expiry; clients go through `advance`.
    ///
    /// A blank staged answer is recorded as `unanswered` and the session moves
    /// on immediately. Otherwise the caller gets a ticket to evaluate.
    pub fn begin_advance(&mut self) -> Result<AdvancePlan, SessionError> {
        self.require_in_progress()?;
        if self.in_flight.is_some() {
            return Err(SessionError::AdvanceInFlight(self.current_index));
        }

        if self.staged_answer.trim().is_empty() {
            self.record_unanswered(self.current_index, self.question.clone());
            return Ok(AdvancePlan::Step(self.move_on()));
        }

        self.in_flight = Some(self.generation);
        Ok(AdvancePlan::Evaluate(EvaluationTicket {
            generation: self.generation,
            question_index: self.current_index,
            question: self.question.clone(),
            answer: self.staged_answer.clone(),
        }))
    }

    /// Second half of an evaluated advance. The evaluation is applied only if
    /// the ticket is the one in flight for the current generation.
    pub fn complete_advance(
        &mut self,
        ticket: &EvaluationTicket,
        evaluation: Evaluation,
    ) -> Result<StepOutcome, SessionError> {
        if self.state != SessionState::InProgress
            || ticket.generation != self.generation
            || self.in_flight != Some(ticket.generation)
        {
            return Err(SessionError::StaleEvaluation {
                ticket: ticket.generation,
                current: self.generation,
            });
        }
        self.in_flight = None;

        self.mistakes.extend(evaluation.mistakes.iter().cloned());
        self.records.push(QuestionRecord {
            index: ticket.question_index,
            question: ticket.question.clone(),
            answer: ticket.answer.clone(),
            outcome: QuestionOutcome::Answered,
            feedback: Some(evaluation.feedback.clone()),
            model_answer: Some(evaluation.model_answer.clone()),
            evaluation_status: Some(evaluation.status),
        });
        self.last_evaluation = Some(evaluation);

        Ok(self.move_on())
    }

    /// `InProgress → Finished` before the last question was answered.
    /// The staged answer of the current question is not evaluated.
    pub fn finish_early(&mut self, reason: FinishReason) -> Result<SessionSummary, SessionError> {
        self.require_in_progress()?;
        // Invalidate any evaluation or question reply still in flight.
        self.generation += 1;
        self.in_flight = None;
        Ok(self.finalize(reason))
    }

    pub fn mark_history(&mut self, status: HistoryStatus) {
        self.history = status;
    }

    pub fn view(&self) -> SessionView {
        let (history_saved, save_error) = match &self.history {
            HistoryStatus::NotRecorded => (None, None),
            HistoryStatus::Saved => (Some(true), None),
            HistoryStatus::Failed(e) => (Some(false), Some(e.clone())),
        };
        SessionView {
            id: self.id,
            user_id: self.user_id.clone(),
            state: self.state,
            job_role: self.job_role.clone(),
            experience_level: self.experience_level,
            question_count: self.settings.question_count,
            current_question_index: self.current_index,
            question: self.question.clone(),
            staged_answer: self.staged_answer.clone(),
            time_left_secs: self.timer.time_left(),
            elapsed_total_secs: self.timer.elapsed_total(),
            question_time_secs: self.settings.question_time.as_secs(),
            total_time_secs: self.settings.total_time.as_secs(),
            evaluating: self.in_flight.is_some(),
            answered_count: self.answered_count(),
            mistakes: self.mistakes.clone(),
            last_evaluation: self.last_evaluation.clone(),
            score: self.score,
            finish_reason: self.finish_reason,
            history_saved,
            save_error,
            started_at: self.started_at,
        }
    }

    fn question_budget(&self) -> u64 {
        self.settings.question_time.as_secs()
    }

    fn require_in_progress(&self) -> Result<(), SessionError> {
        if self.state == SessionState::InProgress {
            Ok(())
        } else {
            Err(SessionError::NotInProgress(self.state))
        }
    }

    fn require_question(&self, question_index: u32) -> Result<(), SessionError> {
        if question_index == self.current_index {
            Ok(())
        } else {
            Err(SessionError::QuestionMismatch {
                requested: question_index,
                current: self.current_index,
            })
        }
    }

    fn record_unanswered(&mut self, index: u32, question: String) {
        self.mistakes.push(Mistake::unanswered());
        self.records.push(QuestionRecord {
            index,
            question,
            answer: String::new(),
            outcome: QuestionOutcome::Unanswered,
            feedback: None,
            model_answer: None,
            evaluation_status: None,
        });
    }

    /// Clears per-question state and either moves to the next question or,
    /// past the last one, finishes.
    fn move_on(&mut self) -> StepOutcome {
        self.generation += 1;
        self.staged_answer.clear();
        self.question.clear();

        if self.current_index >= self.settings.question_count {
            return StepOutcome::Finished(self.finalize(FinishReason::Completed));
        }

        self.current_index += 1;
        self.timer.reset(self.question_budget());
        StepOutcome::NextQuestion {
            generation: self.generation,
            index: self.current_index,
        }
    }

    fn finalize(&mut self, reason: FinishReason) -> SessionSummary {
        let count = self.settings.question_count;
        let first_open = self.records.len() as u32 + 1;
        for index in first_open..=count {
            let question = if index == self.current_index {
                std::mem::take(&mut self.question)
            } else {
                String::new()
            };
            self.record_unanswered(index, question);
        }

        let score = compute_score(count, self.mistakes.len());
        self.score = Some(score);
        self.finish_reason = Some(reason);
        self.state = SessionState::Finished;
        self.finished_at = Some(Utc::now());
        self.staged_answer.clear();

        info!(
            "Interview {} finished ({:?}): score {}/100, {} mistake(s), {}s elapsed",
            self.id,
            reason,
            score,
            self.mistakes.len(),
            self.timer.elapsed_total()
        );

        SessionSummary {
            session_id: self.id,
            user_id: self.user_id.clone(),
            job_role: self.job_role.clone(),
            experience_level: self.experience_level.unwrap_or(ExperienceLevel::Junior),
            questions: self.records.clone(),
            mistakes: self.mistakes.clone(),
            score,
            total_time_secs: self.timer.elapsed_total(),
            finish_reason: reason,
        }
    }
}
