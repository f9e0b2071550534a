//! Text extraction from uploaded documents.
//!
//! Digital PDFs go through pdf-extract; images go through the vision model
//! chain as base64 data URLs. Anything else is rejected up front.

use base64::Engine as _;
use thiserror::Error;

use crate::llm::prompt::OCR_INSTRUCTION;
use crate::llm::{ChatMessage, CompletionOptions, FallbackClient, LlmError};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to parse PDF: {0}")]
    PdfParsing(String),

    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Ocr(#[from] LlmError),
}

/// Extract text from an uploaded document.
///
/// `content_type` is the MIME type the client declared at upload; it has
/// already been validated against the allowed set, but unknown types still
/// fail cleanly here.
pub async fn extract_text(
    bytes: &[u8],
    content_type: &str,
    ocr: &FallbackClient,
) -> Result<String, ExtractionError> {
    match content_type {
        "application/pdf" => extract_pdf_text(bytes),
        "image/jpeg" | "image/png" => extract_image_text(bytes, content_type, ocr).await,
        other => Err(ExtractionError::UnsupportedType(other.to_string())),
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
    Ok(pages.join("\n"))
}

/// OCR an image by embedding it as a data URL in a vision request.
async fn extract_image_text(
    bytes: &[u8],
    mime_type: &str,
    ocr: &FallbackClient,
) -> Result<String, ExtractionError> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let data_url = format!("data:{mime_type};base64,{encoded}");

    let messages = vec![ChatMessage::user_with_image(OCR_INSTRUCTION, data_url)];
    let text = ocr
        .complete(&messages, &CompletionOptions::default())
        .await?;
    Ok(text)
}
