//! Text extraction for uploaded documents.
//!
//! PDFs are parsed with `lopdf` page by page; plain text and Markdown are read
//! as UTF-8. Parsing runs on the blocking pool.

use crate::types::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentKind {
    /// Detect the kind from the declared content type, falling back to the file name.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let declared = content_type
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);

        let guessed = declared.or_else(|| mime_guess::from_path(filename).first());

        match guessed {
            Some(m) if m.essence_str() == mime::APPLICATION_PDF.essence_str() => Some(Self::Pdf),
            Some(m) if m.essence_str() == "text/markdown" || m.essence_str() == "text/x-markdown" => {
                Some(Self::Markdown)
            }
            Some(m) if m.type_() == mime::TEXT && m.subtype() == mime::PLAIN => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::PlainText => ".txt",
            Self::Markdown => ".md",
        }
    }
}

pub struct DocumentProcessor;

impl DocumentProcessor {
    /// Extract the plain text of the file at `filepath`.
    pub async fn process_document(filepath: &Path, kind: DocumentKind) -> AppResult<String> {
        let path: PathBuf = filepath.to_path_buf();

        let text = tokio::task::spawn_blocking(move || match kind {
            DocumentKind::Pdf => extract_pdf_text(&path),
            DocumentKind::PlainText | DocumentKind::Markdown => extract_utf8_text(&path),
        })
        .await
        .map_err(|e| AppError::Internal(format!("Extraction task failed: {}", e)))??;

        info!(kind = ?kind, chars = text.chars().count(), "Extracted document text");
        Ok(text)
    }
}

fn extract_utf8_text(path: &Path) -> AppResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::ExtractionFailure(format!("Failed to read upload: {}", e)))?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::ExtractionFailure("Text file is not valid UTF-8".to_string()))
}

fn extract_pdf_text(path: &Path) -> AppResult<String> {
    let document = lopdf::Document::load(path)
        .map_err(|e| AppError::ExtractionFailure(format!("Unreadable PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(AppError::ExtractionFailure(
            "Encrypted PDFs are not supported".to_string(),
        ));
    }

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(AppError::ExtractionFailure("PDF has no pages".to_string()));
    }

    let mut text = String::new();
    let mut failed_pages = 0usize;
    for page in &pages {
        match document.extract_text(&[*page]) {
            Ok(page_text) => {
                debug!(page, chars = page_text.len(), "Extracted PDF page");
                text.push_str(&page_text);
            }
            Err(e) => {
                failed_pages += 1;
                warn!(page, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    if failed_pages == pages.len() {
        return Err(AppError::ExtractionFailure(
            "No page of the PDF could be read".to_string(),
        ));
    }

    Ok(text)
}
