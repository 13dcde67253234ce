use axum::{Router, routing::get, Json, extract::State};
use crate::models::{AppState, HealthResponse};
use tracing::warn;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.health_check().await {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            warn!(backend = state.store.backend_name(), error = %e, "Store health check failed");
            "unavailable".to_string()
        }
    };

    Json(HealthResponse {
        status: if database == "connected" { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        embedding_model: state.embedder.model().to_string(),
    })
}
