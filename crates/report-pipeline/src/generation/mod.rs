//! Prompt construction for answers and summaries

pub mod prompt;

pub use prompt::PromptBuilder;
