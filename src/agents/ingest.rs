//! Ingest Agent
//!
//! Extracts, chunks and embeds an uploaded document, then stores the document
//! together with its chunk embeddings.

use crate::embeddings::{chunk_text, DocumentKind, DocumentProcessor};
use crate::models::{AppState, DocumentSummary, NewChunk, NewDocument};
use crate::types::{AppError, AppResult};
use bytes::Bytes;
use std::io::Write;
use tracing::{debug, info, warn};

/// A file received from a client, before any processing.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Where the document originally came from, if the client said.
    pub url: Option<String>,
}

const UPLOAD_PREFIX: &str = "pdfqa-upload-";

pub struct IngestAgent;

impl IngestAgent {
    pub async fn ingest(state: &AppState, upload: UploadedFile) -> AppResult<DocumentSummary> {
        let filename = upload.filename.trim().to_string();
        if filename.is_empty() {
            return Err(AppError::InputValidation("file name must not be empty".to_string()));
        }
        if upload.bytes.is_empty() {
            return Err(AppError::InputValidation(format!("{} is empty", filename)));
        }

        let kind = DocumentKind::detect(&filename, upload.content_type.as_deref()).ok_or_else(|| {
            AppError::InputValidation(format!(
                "Unsupported file type for {}: expected PDF, text or Markdown",
                filename
            ))
        })?;

        let url = upload
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        info!(filename = %filename, kind = ?kind, bytes = upload.bytes.len(), "Ingesting document");

        let text = Self::extract(&upload.bytes, kind, state.config.server.upload_dir.as_deref()).await?;

        let chunk_size = state.config.retrieval.chunk_size;
        let stored_chunk_size = i32::try_from(chunk_size).map_err(|_| {
            AppError::InputValidation(format!("chunk size {} does not fit the store", chunk_size))
        })?;
        let chunks: Vec<String> = chunk_text(&text, chunk_size)?
            .into_iter()
            .map(str::to_string)
            .collect();
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk_index = index, chars = chunk.chars().count(), "Chunked");
        }
        if chunks.is_empty() {
            warn!(filename = %filename, "No text extracted; storing document without chunks");
        }

        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            state.embedder.embed(&chunks).await?
        };

        let new_chunks = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (content, embedding))| {
                let chunk_index = i32::try_from(index).map_err(|_| {
                    AppError::InputValidation(format!("{} has too many chunks to store", filename))
                })?;
                Ok(NewChunk {
                    chunk_index,
                    content,
                    embedding,
                })
            })
            .collect::<AppResult<Vec<NewChunk>>>()?;
        let chunk_count = new_chunks.len() as i64;

        let document = state
            .store
            .insert_document(
                NewDocument {
                    name: filename,
                    url,
                    content: text,
                    embedding_model: state.embedder.model().to_string(),
                    chunk_size: stored_chunk_size,
                },
                new_chunks,
            )
            .await?;

        info!(
            document_id = %document.id,
            chunks = chunk_count,
            model = %document.embedding_model,
            "Document ingested"
        );

        Ok(DocumentSummary {
            id: document.id,
            name: document.name,
            url: document.url,
            chunk_count,
            created_at: document.created_at,
        })
    }

    /// Spool the upload to a temp file and extract its text. The file is removed on every path.
    async fn extract(bytes: &[u8], kind: DocumentKind, upload_dir: Option<&str>) -> AppResult<String> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(UPLOAD_PREFIX).suffix(kind.extension());
        let mut file = match upload_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;

        DocumentProcessor::process_document(file.path(), kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{DocumentStore, MemoryDocumentStore};
    use crate::embeddings::Embedder;
    use crate::llm::LLM;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    fn state(chunk_size: usize) -> (AppState, Arc<MemoryDocumentStore>) {
        state_in(chunk_size, None)
    }

    fn state_in(chunk_size: usize, upload_dir: Option<&Path>) -> (AppState, Arc<MemoryDocumentStore>) {
        let mut vars: HashMap<&str, String> = [
            ("DATABASE_URL", "memory://".to_string()),
            ("EMBEDDING_PROVIDER", "hash".to_string()),
            ("CHUNK_SIZE", chunk_size.to_string()),
        ]
        .into_iter()
        .collect();
        if let Some(dir) = upload_dir {
            vars.insert("UPLOAD_DIR", dir.display().to_string());
        }
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let state = AppState {
            embedder: Arc::new(Embedder::from_config(&config.embedding).unwrap()),
            llm: Arc::new(LLM::unconfigured("google", "gemini-2.0-flash-lite")),
            store: store.clone(),
            config,
        };
        (state, store)
    }

    /// A single-page PDF showing `text` in Courier.
    fn one_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn pdf_upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from(bytes),
            url: None,
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn upload(name: &str, body: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: Bytes::from(body.to_string()),
            url: Some("  https://example.com/doc.txt ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_ingest_text_document() {
        let (state, store) = state(4);
        let summary = IngestAgent::ingest(&state, upload("notes.txt", "abcdefghij")).await.unwrap();

        assert_eq!(summary.chunk_count, 3);
        assert_eq!(summary.url.as_deref(), Some("https://example.com/doc.txt"));

        let chunks = store.get_chunks(summary.id).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
        assert!(chunks.iter().all(|c| c.embedding.len() == state.embedder.dimensions()));

        let document = store.get_document(summary.id).await.unwrap().unwrap();
        assert_eq!(document.content, "abcdefghij");
        assert_eq!(document.embedding_model, state.embedder.model());
        assert_eq!(document.chunk_size, 4);
    }

    #[tokio::test]
    async fn test_rejects_missing_name_and_empty_body() {
        let (state, store) = state(4);

        let err = IngestAgent::ingest(&state, upload("  ", "text")).await.unwrap_err();
        assert_eq!(err.kind(), "input_validation");

        let err = IngestAgent::ingest(&state, upload("a.txt", "")).await.unwrap_err();
        assert_eq!(err.kind(), "input_validation");

        assert!(store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unsupported_type() {
        let (state, _) = state(4);
        let mut file = upload("image.png", "not really a png");
        file.content_type = Some("image/png".to_string());

        let err = IngestAgent::ingest(&state, file).await.unwrap_err();
        assert_eq!(err.kind(), "input_validation");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_extraction_failure() {
        let (state, store) = state(4);
        let mut file = upload("broken.pdf", "%PDF-1.4 this is not a pdf");
        file.content_type = Some("application/pdf".to_string());

        let err = IngestAgent::ingest(&state, file).await.unwrap_err();
        assert_eq!(err.kind(), "extraction_failure");
        assert!(store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_pdf_document() {
        let (state, store) = state(5);
        let summary = IngestAgent::ingest(&state, pdf_upload("hello.pdf", one_page_pdf("Hello PDF World")))
            .await
            .unwrap();

        let document = store.get_document(summary.id).await.unwrap().unwrap();
        assert_eq!(document.content.trim(), "Hello PDF World");
        assert_eq!(summary.chunk_count, 4);

        let chunks = store.get_chunks(summary.id).await.unwrap();
        assert_eq!(chunks[0].content, "Hello");
        assert_eq!(chunks.iter().map(|c| c.content.as_str()).collect::<String>(), document.content);
    }

    #[tokio::test]
    async fn test_spooled_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = state_in(5, Some(dir.path()));

        IngestAgent::ingest(&state, pdf_upload("hello.pdf", one_page_pdf("Hello PDF World")))
            .await
            .unwrap();
        assert_eq!(entries(dir.path()), 0);

        let err = IngestAgent::ingest(&state, pdf_upload("broken.pdf", b"%PDF-1.4 garbage".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "extraction_failure");
        assert_eq!(entries(dir.path()), 0);

        assert_eq!(store.list_documents().await.unwrap().len(), 1);
    }
}
