use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use crate::config::DatabaseConfig;
use crate::models::{Document, DocumentChunk, DocumentSummary, NewChunk, NewDocument};
use crate::types::AppResult;
use anyhow::Result;
use tracing::info;
use uuid::Uuid;

pub use memory::*;
pub use operations::*;

pub mod memory;
pub mod operations;

/// Persistence for documents and their chunk embeddings.
///
/// A document and its chunks are written together or not at all; chunk sets
/// are append-only and read back in `chunk_index` order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: NewDocument, chunks: Vec<NewChunk>) -> AppResult<Document>;

    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>>;

    /// Newest first.
    async fn list_documents(&self) -> AppResult<Vec<DocumentSummary>>;

    async fn get_chunks(&self, document_id: Uuid) -> AppResult<Vec<DocumentChunk>>;

    async fn health_check(&self) -> AppResult<()>;

    fn backend_name(&self) -> &'static str;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(config.require_url()?)
        .await?;

    // Test connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");
    Ok(())
}

/// Open the store named by `DATABASE_URL`: `memory://` or a Postgres URL (migrated on connect).
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
    if config.is_memory() {
        info!("Using in-memory document store; data is lost on exit");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(PgDocumentStore::new(pool)))
}
