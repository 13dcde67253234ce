use axum::{
    Router,
    routing::post,
    Json,
    extract::{rejection::JsonRejection, State},
};
use crate::agents::answer_question;
use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::types::{AppError, AppResult};
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .route("/chat-with-pdf", post(post_chat))
        .with_state(state)
}

pub async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InputValidation(e.body_text()))?;
    request.validate()?;
    let document_id = request
        .document_id
        .ok_or_else(|| AppError::InputValidation("document_id is required".to_string()))?;

    info!(document_id = %document_id, "Received chat request");

    let response = answer_question(&state, document_id, &request.question).await?;

    info!(
        document_id = %document_id,
        source = ?response.source,
        score = response.score,
        "Chat response sent"
    );

    Ok(Json(response))
}
