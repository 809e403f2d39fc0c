use std::fmt;

use serde::{Deserialize, Serialize};

/// Seniority the candidate is practising for. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperienceLevel {
    Junior,
    MidLevel,
    Senior,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::MidLevel => "mid-level",
            ExperienceLevel::Senior => "senior",
        }
    }

    /// Parses the form value. Blank or unknown input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "junior" => Some(ExperienceLevel::Junior),
            "mid-level" | "mid" | "midlevel" => Some(ExperienceLevel::MidLevel),
            "senior" => Some(ExperienceLevel::Senior),
            _ => None,
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MistakeType {
    Grammar,
    Clarity,
    Relevance,
    Unanswered,
}

impl MistakeType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "grammar" => Some(MistakeType::Grammar),
            "clarity" => Some(MistakeType::Clarity),
            "relevance" => Some(MistakeType::Relevance),
            "unanswered" => Some(MistakeType::Unanswered),
            _ => None,
        }
    }
}

/// A recorded shortcoming in an answer. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MistakeType,
    pub explanation: String,
}

impl Mistake {
    /// Placeholder recorded for a skipped, timed-out or never-reached question.
    pub fn unanswered() -> Self {
        Self {
            text: "No answer provided".to_string(),
            kind: MistakeType::Unanswered,
            explanation: "Question was skipped without providing an answer.".to_string(),
        }
    }
}

/// How the feedback step concluded for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    /// The service replied and the reply was parsed.
    Evaluated,
    /// Blank question or answer; nothing was sent.
    Skipped,
    /// Transport failure or empty reply. No mistakes are known.
    Failed,
}

/// Result of evaluating one question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub feedback: String,
    pub model_answer: String,
    pub mistakes: Vec<Mistake>,
    pub status: EvaluationStatus,
}

/// Final disposition of a single question within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOutcome {
    Answered,
    Unanswered,
}

/// Per-question transcript kept for the history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// 1-based position within the session.
    pub index: u32,
    pub question: String,
    pub answer: String,
    pub outcome: QuestionOutcome,
    pub feedback: Option<String>,
    pub model_answer: Option<String>,
    pub evaluation_status: Option<EvaluationStatus>,
}
