//! Feedback Requester — evaluates one question/answer pair through the
//! generative text service and parses the reply.
//!
//! Reply grammar (one item per line, anything else is ignored):
//!
//! ```text
//! Feedback: <one sentence>
//! Model Answer: <text>
//! Mistakes:
//! - "<snippet>" (Type: grammar|clarity|relevance) - <explanation>
//! ```
//!
//! Evaluation never fails outward: transport errors degrade to a placeholder
//! with `EvaluationStatus::Failed` and no mistakes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::interview::models::{Evaluation, EvaluationStatus, Mistake, MistakeType};
use crate::interview::prompts::EVALUATION_PROMPT_TEMPLATE;
use crate::llm_client::prompts::COACH_SYSTEM;
use crate::llm_client::TextGenerator;

pub const NO_FEEDBACK: &str = "No feedback available.";
pub const EVALUATION_FAILED: &str = "❌ Unable to generate feedback";

const FEEDBACK_TAG: &str = "Feedback:";
const MODEL_ANSWER_TAG: &str = "Model Answer:";

#[derive(Clone)]
pub struct FeedbackRequester {
    generator: Arc<dyn TextGenerator>,
}

impl FeedbackRequester {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Blank question or answer short-circuits to an empty `Skipped` result
    /// without contacting the service.
    pub async fn evaluate(&self, question: &str, answer: &str) -> Evaluation {
        if question.trim().is_empty() || answer.trim().is_empty() {
            return skipped();
        }

        let prompt = EVALUATION_PROMPT_TEMPLATE
            .replace("{question}", question.trim())
            .replace("{answer}", answer.trim());

        match self.generator.generate(&prompt, COACH_SYSTEM).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let evaluation = parse_evaluation(&reply);
                debug!(
                    "Answer evaluated: {} mistake(s) parsed",
                    evaluation.mistakes.len()
                );
                evaluation
            }
            Ok(_) => {
                warn!("Answer evaluation returned an empty reply");
                failed()
            }
            Err(e) => {
                warn!("Answer evaluation failed: {e}");
                failed()
            }
        }
    }
}

fn skipped() -> Evaluation {
    Evaluation {
        feedback: NO_FEEDBACK.to_string(),
        model_answer: String::new(),
        mistakes: Vec::new(),
        status: EvaluationStatus::Skipped,
    }
}

fn failed() -> Evaluation {
    Evaluation {
        feedback: EVALUATION_FAILED.to_string(),
        model_answer: String::new(),
        mistakes: Vec::new(),
        status: EvaluationStatus::Failed,
    }
}

/// Parses a reply. Missing sections fall back to `NO_FEEDBACK` and an empty
/// model answer; only the first `Feedback:`/`Model Answer:` line counts.
pub fn parse_evaluation(reply: &str) -> Evaluation {
    let mut feedback: Option<String> = None;
    let mut model_answer: Option<String> = None;
    let mut mistakes = Vec::new();

    for line in reply.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(FEEDBACK_TAG) {
            if feedback.is_none() {
                feedback = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix(MODEL_ANSWER_TAG) {
            if model_answer.is_none() {
                model_answer = Some(rest.trim().to_string());
            }
        } else if let Some(mistake) = parse_mistake_line(line) {
            mistakes.push(mistake);
        }
    }

    Evaluation {
        feedback: feedback
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| NO_FEEDBACK.to_string()),
        model_answer: model_answer.unwrap_or_default(),
        mistakes,
        status: EvaluationStatus::Evaluated,
    }
}

/// `- "<snippet>" (Type: <type>) - <explanation>`; unknown types are dropped.
fn parse_mistake_line(line: &str) -> Option<Mistake> {
    let rest = line.strip_prefix('-')?.trim_start().strip_prefix('"')?;
    let (text, rest) = rest.split_once("\" (Type: ")?;
    let (kind, explanation) = rest.split_once(") - ")?;

    let Some(kind) = MistakeType::parse(kind) else {
        debug!("Ignoring mistake line with unknown type '{kind}'");
        return None;
    };

    Some(Mistake {
        text: text.to_string(),
        kind,
        explanation: explanation.trim().to_string(),
    })
}
