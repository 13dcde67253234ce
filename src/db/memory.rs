//! In-memory document store.
//!
//! Used by tests and by `DATABASE_URL=memory://` for database-less runs.
//! Same contract as the Postgres store: atomic inserts and chunks in index order.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::DocumentStore;
use crate::models::{Document, DocumentChunk, DocumentSummary, NewChunk, NewDocument};
use crate::types::AppResult;

#[derive(Default)]
struct Tables {
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, Vec<DocumentChunk>>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_document(&self, document: NewDocument, chunks: Vec<NewChunk>) -> AppResult<Document> {
        let id = Uuid::new_v4();
        let row = Document {
            id,
            name: document.name,
            url: document.url,
            content: document.content,
            embedding_model: document.embedding_model,
            chunk_size: document.chunk_size,
            created_at: Utc::now(),
        };

        let mut stored: Vec<DocumentChunk> = chunks
            .into_iter()
            .map(|c| DocumentChunk {
                id: Uuid::new_v4(),
                document_id: id,
                chunk_index: c.chunk_index,
                content: c.content,
                embedding: c.embedding,
            })
            .collect();
        stored.sort_by_key(|c| c.chunk_index);

        let mut tables = self.tables.write().await;
        tables.documents.insert(id, row.clone());
        tables.chunks.insert(id, stored);

        Ok(row)
    }

    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn list_documents(&self) -> AppResult<Vec<DocumentSummary>> {
        let tables = self.tables.read().await;
        let mut summaries: Vec<DocumentSummary> = tables
            .documents
            .values()
            .map(|d| DocumentSummary {
                id: d.id,
                name: d.name.clone(),
                url: d.url.clone(),
                chunk_count: tables.chunks.get(&d.id).map_or(0, |c| c.len() as i64),
                created_at: d.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn get_chunks(&self, document_id: Uuid) -> AppResult<Vec<DocumentChunk>> {
        Ok(self
            .tables
            .read()
            .await
            .chunks
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
