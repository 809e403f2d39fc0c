// Timed mock-interview flow.
// Implements: session state machine, question timer, answer evaluation, scoring.
// All LLM calls go through llm_client::TextGenerator.

pub mod engine;
pub mod feedback;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod questions;
pub mod scoring;
pub mod session;
pub mod timer;
