//! Reply Agent
//!
//! Turns the retrieved context and the user's question into an answer.
//! This is the final step in the question-answering pipeline.

use crate::config::LLMConfig;
use crate::llm::LLM;
use crate::models::AnswerSource;
use crate::types::{LLMMessage, LLMRequest};
use std::time::Duration;
use tracing::{error, info, warn};

const SYSTEM_INSTRUCTION: &str =
    "You are an expert assistant. Answer strictly from the document context you are given.";

/// A synthesized answer and where its text came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

impl Answer {
    fn fallback(best_chunk: &str) -> Self {
        Self {
            text: best_chunk.to_string(),
            source: AnswerSource::Fallback,
        }
    }
}

pub struct ReplyAgent;

impl ReplyAgent {
    /// Generate an answer from `context`, or fall back to the best chunk's raw text.
    ///
    /// Never fails: generation errors, timeouts, empty output and missing
    /// credentials all produce the fallback answer.
    pub async fn synthesize(
        llm: &LLM,
        config: &LLMConfig,
        context: &str,
        question: &str,
        best_chunk: &str,
    ) -> Answer {
        info!(
            question_len = question.len(),
            context_len = context.len(),
            provider = llm.provider_name(),
            "Generating reply"
        );

        if !llm.is_configured() {
            warn!("No LLM API key configured, using best matching chunk");
            return Answer::fallback(best_chunk);
        }

        let request = LLMRequest {
            model: llm.model().to_string(),
            messages: vec![LLMMessage::user(&Self::build_prompt(context, question))],
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
        };

        let timeout = Duration::from_secs(config.timeout_secs);
        match tokio::time::timeout(timeout, llm.create_chat_completion(&request)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => {
                info!(
                    response_len = response.content.len(),
                    finish_reason = %response.finish_reason,
                    total_tokens = response.usage.total_tokens,
                    "Generated reply successfully"
                );
                Answer {
                    text: response.content.trim().to_string(),
                    source: AnswerSource::Model,
                }
            }
            Ok(Ok(_)) => {
                warn!("LLM returned an empty answer, using best matching chunk");
                Answer::fallback(best_chunk)
            }
            Ok(Err(e)) => {
                error!(error = %e, "LLM call failed, using best matching chunk");
                Answer::fallback(best_chunk)
            }
            Err(_) => {
                error!(
                    timeout_secs = config.timeout_secs,
                    "LLM call timed out, using best matching chunk"
                );
                Answer::fallback(best_chunk)
            }
        }
    }

    /// Prompt asking the model to answer only from the delimited context.
    pub fn build_prompt(context: &str, question: &str) -> String {
        format!(
            r#"You are an expert assistant helping a user understand a document.
Use ONLY the information between the context markers to answer the question.
If the context does not contain the answer, say that the document does not cover it.

=== CONTEXT START ===
{context}
=== CONTEXT END ===

=== QUESTION ===
{question}

Answer:"#,
            context = context,
            question = question,
        )
    }
}
