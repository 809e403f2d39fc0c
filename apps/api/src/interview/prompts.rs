// All LLM prompt constants for the interview flow.

/// Question prompt. Replace `{experience_level}` and `{job_role}` before sending.
pub const QUESTION_PROMPT_TEMPLATE: &str = "Generate a technical interview question for a \
{experience_level} {job_role} position.
Focus on real-world scenarios that require practical technical knowledge and problem-solving skills.
The question should be clear, concise, and free from unnecessary symbols like asterisks (*), hashes (#), or other special characters.
Avoid overly complicated phrasing and ensure the question is straightforward and easy to understand.
Reply with the question only.";

/// Evaluation prompt. Replace `{question}` and `{answer}` before sending.
///
/// The reply grammar is parsed by `feedback::parse_evaluation`; keep the two in sync.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate this answer:

Question: {question}
Answer: {answer}

Provide:
1. Concise feedback in 1 sentence
2. A model answer
3. List of mistakes with:
   - Exact text snippet
   - Mistake type (grammar/clarity/relevance)
   - Brief explanation
Format response as:
Feedback: [feedback]
Model Answer: [model answer]
Mistakes:
- "[text]" (Type: [type]) - [explanation]"#;
