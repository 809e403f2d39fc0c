use std::sync::Arc;

use tracing::warn;

use crate::interview::models::ExperienceLevel;
use crate::interview::prompts::QUESTION_PROMPT_TEMPLATE;
use crate::llm_client::prompts::COACH_SYSTEM;
use crate::llm_client::TextGenerator;

pub const QUESTION_UNAVAILABLE: &str = "Could not generate question. Please try again.";

/// Asks the generative text service for the next interview question.
#[derive(Clone)]
pub struct QuestionGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl QuestionGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Never fails: a transport error or blank reply yields `QUESTION_UNAVAILABLE`.
    pub async fn next_question(&self, job_role: &str, level: ExperienceLevel) -> String {
        let prompt = QUESTION_PROMPT_TEMPLATE
            .replace("{experience_level}", level.as_str())
            .replace("{job_role}", job_role);

        match self.generator.generate(&prompt, COACH_SYSTEM).await {
            Ok(reply) => {
                let question = clean_question(&reply);
                if question.is_empty() {
                    warn!("Question generation returned no usable text");
                    QUESTION_UNAVAILABLE.to_string()
                } else {
                    question
                }
            }
            Err(e) => {
                warn!("Question generation failed: {e}");
                QUESTION_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Drops markdown emphasis/heading symbols and surrounding whitespace.
fn clean_question(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '*' | '#'))
        .collect::<String>()
        .trim()
        .to_string()
}
