//! services/api/src/adapters/extractor.rs
//!
//! This module contains the upload text extractor. It implements the
//! `TextExtractorService` port from the `core` crate: PDFs go through
//! `pdf-extract`, plain text and Markdown pass through, and anything else
//! degrades to an empty corpus so the request can still proceed.

use async_trait::async_trait;
use tracing::warn;

use doc_assistant_core::ports::{PortResult, TextExtractorService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that extracts paragraph blocks from uploaded files.
#[derive(Clone, Default)]
pub struct FileTextExtractor;

impl FileTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extension(file_name: &str) -> String {
        file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Splits extracted text into paragraph-like blocks on blank lines.
    fn into_blocks(text: &str) -> Vec<String> {
        text.split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(str::to_string)
            .collect()
    }
}

//=========================================================================================
// `TextExtractorService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextExtractorService for FileTextExtractor {
    /// Extracts text blocks from an uploaded file.
    ///
    /// Unrecognized formats and unreadable content yield an empty sequence;
    /// ingestion then proceeds with an empty corpus rather than failing the
    /// whole request.
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> PortResult<Vec<String>> {
        match Self::extension(file_name).as_str() {
            "pdf" => match pdf_extract::extract_text_from_mem(bytes) {
                Ok(text) => Ok(Self::into_blocks(&text)),
                Err(e) => {
                    warn!("PDF extraction failed for '{}': {}", file_name, e);
                    Ok(Vec::new())
                }
            },
            "txt" | "md" | "markdown" => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Self::into_blocks(text)),
                Err(e) => {
                    warn!("Upload '{}' is not valid UTF-8 text: {}", file_name, e);
                    Ok(Vec::new())
                }
            },
            other => {
                warn!(
                    "Unsupported upload format '.{}' for '{}'; treating as no documents",
                    other, file_name
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_files_split_into_paragraph_blocks() {
        let extractor = FileTextExtractor::new();
        let blocks = extractor
            .extract("notes.txt", b"First paragraph.\n\nSecond paragraph.\n\n")
            .await
            .unwrap();
        assert_eq!(blocks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[tokio::test]
    async fn markdown_passes_through() {
        let extractor = FileTextExtractor::new();
        let blocks = extractor
            .extract("doc.md", b"# Title\n\nBody text.")
            .await
            .unwrap();
        assert_eq!(blocks, vec!["# Title", "Body text."]);
    }

    #[tokio::test]
    async fn unknown_formats_yield_an_empty_corpus() {
        let extractor = FileTextExtractor::new();
        let blocks = extractor.extract("image.png", &[0x89, 0x50]).await.unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn corrupt_pdf_degrades_instead_of_failing() {
        let extractor = FileTextExtractor::new();
        let blocks = extractor
            .extract("broken.pdf", b"not actually a pdf")
            .await
            .unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_text_degrades_instead_of_failing() {
        let extractor = FileTextExtractor::new();
        let blocks = extractor.extract("notes.txt", &[0xff, 0xfe]).await.unwrap();
        assert!(blocks.is_empty());
    }
}
