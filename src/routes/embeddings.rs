use axum::{
    Router,
    routing::post,
    Json,
    extract::{rejection::JsonRejection, State},
};
use crate::models::{AppState, EmbeddingRequest, EmbeddingResponse};
use crate::types::{AppError, AppResult};
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/embeddings", post(create_embedding))
        .with_state(state)
}

async fn create_embedding(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> AppResult<Json<EmbeddingResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InputValidation(e.body_text()))?;
    request.validate()?;
    if request.text.trim().is_empty() {
        return Err(AppError::InputValidation("text must not be empty".to_string()));
    }

    info!(text_len = request.text.len(), "Embedding request");

    let embedding = state.embedder.embed_one(&request.text).await?;

    Ok(Json(EmbeddingResponse {
        dimensions: embedding.len(),
        embedding,
        model: state.embedder.model().to_string(),
    }))
}
