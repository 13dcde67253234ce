//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/documents` - Document upload, listing and lookup
//! - `/api/chat` - Questions about a stored document
//! - `/api/embeddings` - Raw text embeddings
//! - `/api/health` - Health checks
//!
//! `/process-pdf` and `/chat-with-pdf` are kept as aliases of the upload and
//! chat endpoints for older clients.

pub mod chat;
pub mod documents;
pub mod embeddings;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use crate::middleware::cors_layer;
use crate::models::AppState;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config.server);

    Router::new()
        .merge(documents::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(embeddings::router(state.clone()))
        .merge(health::router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
