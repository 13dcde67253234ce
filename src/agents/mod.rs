//! Agent System
//!
//! This module contains the agents that power the document assistant:
//!
//! - **Ingest Agent**: Extracts, chunks, embeds and stores uploaded documents
//! - **Reply Agent**: Generates the answer from retrieved context, with fallback
//!
//! ## Pipeline Overview
//!
//! ```text
//! Question
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Embedder   │  → Question vector
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Retriever  │  → Ranks stored chunks, assembles context
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Reply     │  → Synthesizes answer (or best chunk)
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//!  Answer + score
//! ```

pub mod ingest;
pub mod reply;

pub use ingest::{IngestAgent, UploadedFile};
pub use reply::{Answer, ReplyAgent};

use crate::embeddings::Retriever;
use crate::models::{AppState, ChatResponse};
use crate::types::{AppError, AppResult};
use tracing::{info, warn};
use uuid::Uuid;

/// Answer a question about one stored document.
pub async fn answer_question(
    state: &AppState,
    document_id: Uuid,
    question: &str,
) -> AppResult<ChatResponse> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::InputValidation("question must not be empty".to_string()));
    }

    info!(document_id = %document_id, question_len = question.len(), "Starting question pipeline");

    let document = state
        .store
        .get_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;

    let chunks = state.store.get_chunks(document_id).await?;
    if chunks.is_empty() {
        return Err(AppError::NoChunksAvailable(format!(
            "Document {} has no stored chunks to search",
            document_id
        )));
    }

    if document.embedding_model != state.embedder.model() {
        warn!(
            document_id = %document_id,
            stored_model = %document.embedding_model,
            current_model = state.embedder.model(),
            "Document was embedded with a different model"
        );
    }

    // Step 1: embed the question with the same model as the chunks
    let question_embedding = state.embedder.embed_one(question).await?;

    // Step 2: rank stored chunks and assemble the context
    let pairs: Vec<(&str, &[f32])> = chunks
        .iter()
        .map(|c| (c.content.as_str(), c.embedding.as_slice()))
        .collect();
    let retrieved = Retriever::from_config(&state.config.retrieval).retrieve(&question_embedding, &pairs)?;

    info!(
        best_chunk = retrieved.best.index,
        score = retrieved.best.score,
        chunks_used = retrieved.chunks_used.len(),
        "Retrieval complete"
    );

    // Step 3: generate the reply
    let answer = ReplyAgent::synthesize(
        &state.llm,
        &state.config.llm,
        &retrieved.context,
        question,
        &retrieved.best.text,
    )
    .await;

    info!(source = ?answer.source, answer_len = answer.text.len(), "Question pipeline complete");

    Ok(ChatResponse {
        answer: answer.text,
        score: retrieved.best.score,
        source: answer.source,
        chunks_used: retrieved.chunks_used,
    })
}
