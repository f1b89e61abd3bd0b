//! Prompt templates for report questions and summaries

use crate::types::ScoredChunk;

/// Prompt builder for grounded answers over report excerpts
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build numbered context from retrieved chunks
    pub fn build_context(results: &[ScoredChunk]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] Excerpt {}\n\n{}\n\n---\n\n",
                i + 1,
                result.chunk.index + 1,
                result.chunk.text.trim()
            ));
        }

        context
    }

    /// Build the question-answering prompt with strict grounding
    pub fn answer_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a financial analyst assistant that ONLY uses information from the provided quarterly report excerpts.

RULES:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context: respond with "This information is not available in the provided report."
3. NEVER use external knowledge or make estimates
4. Quote figures exactly as written, including units and periods
5. Refer to excerpts by their number, e.g. [2]

CONTEXT FROM REPORT:
{context}

QUESTION: {question}

Answer using ONLY the report content above:"#,
            context = context,
            question = question
        )
    }

    /// Build the whole-report summary prompt
    pub fn summary_prompt(context: &str) -> String {
        format!(
            r#"Summarize the following excerpts of a quarterly financial report.
Cover revenue, profitability, segment performance, outlook and notable risks when they are mentioned.
Use only the excerpts; do not add outside information.

{context}

Summary:"#,
            context = context
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSetKey, ChunkStrategy, ReportPeriod};

    #[test]
    fn test_context_numbers_excerpts() {
        let key = ChunkSetKey::new(
            ReportPeriod::new("2024", "Q1").unwrap(),
            "docling",
            ChunkStrategy::Markdown,
        );
        let results = vec![
            ScoredChunk {
                chunk: Chunk::new(&key, 3, "Revenue was $26.0 billion.".to_string()),
                score: 0.9,
            },
            ScoredChunk {
                chunk: Chunk::new(&key, 0, "## Overview".to_string()),
                score: 0.4,
            },
        ];

        let context = PromptBuilder::build_context(&results);
        assert!(context.starts_with("[1] Excerpt 4"));
        assert!(context.contains("[2] Excerpt 1"));

        let prompt = PromptBuilder::answer_prompt("What was revenue?", &context);
        assert!(prompt.contains("QUESTION: What was revenue?"));
        assert!(prompt.contains("$26.0 billion"));
    }
}
