//! Document extraction: turns an uploaded resume PDF into plain text.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The bytes are not a PDF, or the PDF could not be parsed.
    #[error("Error reading or parsing PDF: {0}")]
    NotExtractable(String),

    /// Parsing succeeded but produced no text (e.g. a scanned image).
    #[error("Could not extract text from the PDF.")]
    Empty,
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: Bytes) -> Result<String, ExtractionError>;
}

/// `pdf-extract` backed extractor. Parsing runs on the blocking pool.
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, document: Bytes) -> Result<String, ExtractionError> {
        if !document.starts_with(PDF_MAGIC) {
            return Err(ExtractionError::NotExtractable(
                "not a PDF document".to_string(),
            ));
        }

        // pdf-extract may panic on malformed input; the join error covers that case.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&document))
            .await
            .map_err(|e| {
                warn!("PDF extraction task aborted: {e}");
                ExtractionError::NotExtractable("malformed PDF".to_string())
            })?
            .map_err(|e| ExtractionError::NotExtractable(e.to_string()))?;

        non_empty(text)
    }
}

/// Rejects extraction results that contain no visible text.
pub fn non_empty(text: String) -> Result<String, ExtractionError> {
    if text.trim().is_empty() {
        Err(ExtractionError::Empty)
    } else {
        Ok(text)
    }
}
