//! Text extraction for uploaded PDF documents.
//!
//! Ingestion never touches the LLM: it validates the upload, pulls the raw
//! text out of the PDF, and hands the text to the caller for persistence.
//! Structured extraction happens later, in the background pipeline.

use thiserror::Error;
use tracing::{debug, info};

use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("text extraction failed: {0}")]
    Extraction(String),
}

/// Pulls raw text out of an uploaded document.
///
/// Carried in `AppState` as `Arc<dyn TextExtractor>` so handlers and tests
/// never depend on the concrete PDF backend.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, OcrError>;
}

/// Production extractor backed by the `pdf-extract` crate.
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, OcrError> {
        debug!("Extracting text from PDF ({} bytes)", bytes.len());
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| OcrError::Extraction(e.to_string()))
    }
}

/// Validates an uploaded document and extracts its raw text.
///
/// Client errors (wrong extension, empty file, unreadable document) map to
/// `AppError::Validation` (400) and are never retried; extractor failures map
/// to `AppError::Ocr` (500).
pub fn extract_document_text(
    extractor: &dyn TextExtractor,
    filename: &str,
    bytes: &[u8],
) -> Result<String, AppError> {
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(
            "Only PDF files are allowed".to_string(),
        ));
    }

    if bytes.is_empty() {
        return Err(AppError::Validation("Empty PDF file".to_string()));
    }

    let raw_text = extractor
        .extract_text(bytes)
        .map_err(|e| AppError::Ocr(e.to_string()))?;

    if raw_text.trim().is_empty() {
        return Err(AppError::Validation(
            "No text could be extracted from the PDF. The document may be empty or corrupted."
                .to_string(),
        ));
    }

    info!("Extracted {} characters from {filename}", raw_text.len());
    Ok(raw_text)
}
