use async_trait::async_trait;
use sqlx::PgPool;
use crate::db::DocumentStore;
use crate::models::*;
use crate::types::AppResult;
use tracing::{error, info};
use uuid::Uuid;

/// Postgres-backed store. Queries are checked at runtime, so no DATABASE_URL is needed to build.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in_transaction(
        &self,
        document: &NewDocument,
        chunks: &[NewChunk],
    ) -> AppResult<Document> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (id, name, url, content, embedding_model, chunk_size)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, url, content, embedding_model, chunk_size, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&document.name)
        .bind(&document.url)
        .bind(&document.content)
        .bind(&document.embedding_model)
        .bind(document.chunk_size)
        .fetch_one(&mut *tx)
        .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (id, document_id, chunk_index, content, embedding)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(&chunk.embedding)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_document(&self, document: NewDocument, chunks: Vec<NewChunk>) -> AppResult<Document> {
        match self.insert_in_transaction(&document, &chunks).await {
            Ok(row) => {
                info!(document_id = %row.id, chunks = chunks.len(), "Stored document");
                Ok(row)
            }
            Err(e) => {
                // the transaction is rolled back on drop, nothing partial remains
                error!(name = %document.name, chunks = chunks.len(), error = %e, "Document insert rolled back");
                Err(e)
            }
        }
    }

    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            "SELECT id, name, url, content, embedding_model, chunk_size, created_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    async fn list_documents(&self) -> AppResult<Vec<DocumentSummary>> {
        let documents = sqlx::query_as::<_, DocumentSummary>(
            r#"
            SELECT d.id, d.name, d.url, COUNT(c.id) AS chunk_count, d.created_at
            FROM documents d
            LEFT JOIN document_chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    async fn get_chunks(&self, document_id: Uuid) -> AppResult<Vec<DocumentChunk>> {
        let chunks = sqlx::query_as::<_, DocumentChunk>(
            r#"
            SELECT id, document_id, chunk_index, content, embedding
            FROM document_chunks
            WHERE document_id = $1
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
