// Type definitions, LLM wire types and the error taxonomy

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LLMProvider {
    OpenAI,
    OpenRouter,
    Groq,
    Google,
}

impl LLMProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(LLMProvider::OpenAI),
            "openrouter" => Some(LLMProvider::OpenRouter),
            "groq" => Some(LLMProvider::Groq),
            "google" | "gemini" => Some(LLMProvider::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Groq => write!(f, "groq"),
            LLMProvider::Google => write!(f, "google"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InputValidation(String),

    #[error("Could not extract text: {0}")]
    ExtractionFailure(String),

    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No content to search: {0}")]
    NoChunksAvailable(String),

    #[error("Answer generation failed: {0}")]
    GenerationFailure(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable, machine-readable error kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InputValidation(_) => "input_validation",
            AppError::ExtractionFailure(_) => "extraction_failure",
            AppError::EmbeddingUnavailable(_) => "embedding_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::NoChunksAvailable(_) => "no_chunks_available",
            AppError::GenerationFailure(_) => "generation_failure",
            AppError::DimensionMismatch { .. } => "dimension_mismatch",
            AppError::Database(_) => "storage_failure",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InputValidation(_) => StatusCode::BAD_REQUEST,
            AppError::ExtractionFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) | AppError::NoChunksAvailable(_) => StatusCode::NOT_FOUND,
            AppError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::DimensionMismatch { .. }
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InputValidation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::info!(kind = self.kind(), error = %self, "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(AppError::InputValidation("x".into()).kind(), "input_validation");
        assert_eq!(AppError::NoChunksAvailable("x".into()).kind(), "no_chunks_available");
        assert_eq!(
            AppError::DimensionMismatch { expected: 3, actual: 2 }.kind(),
            "dimension_mismatch"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("doc".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::NoChunksAvailable("doc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::EmbeddingUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::ExtractionFailure("corrupt".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LLMProvider::parse("OpenAI"), Some(LLMProvider::OpenAI));
        assert_eq!(LLMProvider::parse("gemini"), Some(LLMProvider::Google));
        assert_eq!(LLMProvider::parse("unknown"), None);
        assert_eq!(LLMProvider::Groq.to_string(), "groq");
    }
}
