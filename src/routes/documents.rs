use axum::{
    Router,
    routing::{get, post},
    Json,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::PathRejection,
        Path, State,
    },
};
use crate::agents::{IngestAgent, UploadedFile};
use crate::models::{AppState, DocumentSummary, IngestResponse};
use crate::types::{AppError, AppResult};
use tracing::{debug, info};
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/documents", post(upload_document).get(list_documents))
        .route("/api/documents/{id}", get(get_document))
        .route("/process-pdf", post(upload_document))
        .with_state(state)
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::InputValidation(format!("Invalid multipart upload: {}", e.body_text()))
}

async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<IngestResponse>> {
    info!("Document upload request received");

    let mut multipart = multipart.map_err(|e| AppError::InputValidation(e.body_text()))?;

    let mut file: Option<UploadedFile> = None;
    let mut url: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!(filename = %filename, bytes = bytes.len(), "Received file field");
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                    url: None,
                });
            }
            Some("url") => {
                url = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let mut upload = file.ok_or_else(|| {
        AppError::InputValidation("multipart field 'file' is required".to_string())
    })?;
    upload.url = url;

    let document = IngestAgent::ingest(&state, upload).await?;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        document,
    }))
}

async fn list_documents(State(state): State<AppState>) -> AppResult<Json<Vec<DocumentSummary>>> {
    Ok(Json(state.store.list_documents().await?))
}

async fn get_document(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<DocumentSummary>> {
    let Path(id) = id.map_err(|e| AppError::InputValidation(e.body_text()))?;

    let document = state
        .store
        .get_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;
    let chunk_count = state.store.get_chunks(id).await?.len() as i64;

    Ok(Json(DocumentSummary {
        id: document.id,
        name: document.name,
        url: document.url,
        chunk_count,
        created_at: document.created_at,
    }))
}
