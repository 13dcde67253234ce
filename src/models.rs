use std::sync::Arc;

use crate::config::Config;
use crate::db::DocumentStore;
use crate::embeddings::Embedder;
use crate::llm::LLM;

/// Process-wide resources, built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub embedder: Arc<Embedder>,
    pub llm: Arc<LLM>,
}

// Persisted records
// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: uuid::Uuid,
    pub name: String,
    pub url: Option<String>,
    pub content: String,
    pub embedding_model: String,
    pub chunk_size: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct DocumentChunk {
    pub id: uuid::Uuid,
    pub document_id: uuid::Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct DocumentSummary {
    pub id: uuid::Uuid,
    pub name: String,
    pub url: Option<String>,
    pub chunk_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A document about to be written, before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub url: Option<String>,
    pub content: String,
    pub embedding_model: String,
    pub chunk_size: i32,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Vec<f32>,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize, validator::Validate)]
pub struct ChatRequest {
    #[serde(alias = "documentId")]
    pub document_id: Option<uuid::Uuid>,
    #[serde(default)]
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// Synthesized by the generation model.
    Model,
    /// Raw best-matching chunk, returned because generation was unavailable.
    Fallback,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub score: f32,
    pub source: AnswerSource,
    pub chunks_used: Vec<usize>,
}

#[derive(Debug, serde::Deserialize, validator::Validate)]
pub struct EmbeddingRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub dimensions: usize,
    pub model: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub document: DocumentSummary,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub embedding_model: String,
}
