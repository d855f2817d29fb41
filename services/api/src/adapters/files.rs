//! services/api/src/adapters/files.rs
//!
//! This module contains the document converter adapter. It implements the
//! `DocumentConverterService` port from the `core` crate: Markdown bodies are
//! rendered to styled HTML files for download, and the raw Markdown is kept
//! in a per-user "current document" slot so accept/reject always targets the
//! latest document.

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use doc_assistant_core::domain::{DocumentRef, TextBlock};
use doc_assistant_core::ports::{DocumentConverterService, PortError, PortResult};

const DEFAULT_CSS: &str = r#"body { font-family: Georgia, 'Times New Roman', serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; color: #1a1a1a; }
h1 { font-size: 1.8rem; border-bottom: 1px solid #ddd; padding-bottom: 0.3rem; }
h2 { font-size: 1.3rem; margin-top: 1.5rem; }
ul, ol { padding-left: 1.5rem; }
code { background: #f4f4f4; padding: 0.1rem 0.3rem; border-radius: 3px; font-size: 0.9em; }"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A filesystem adapter that implements the `DocumentConverterService` port.
#[derive(Clone)]
pub struct LocalDocumentConverter {
    downloads_dir: PathBuf,
    current_dir: PathBuf,
}

impl LocalDocumentConverter {
    /// Creates a new `LocalDocumentConverter` rooted at the storage directory.
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            downloads_dir: storage_dir.join("downloads"),
            current_dir: storage_dir.join("current"),
        }
    }

    /// Creates the backing directories. Called once at startup.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        tokio::fs::create_dir_all(&self.current_dir).await?;
        Ok(())
    }

    /// Absolute path of a previously materialized download.
    pub fn download_path(&self, file_name: &str) -> PathBuf {
        self.downloads_dir.join(file_name)
    }

    fn current_slot(&self, user_id: Uuid) -> PathBuf {
        self.current_dir.join(format!("{user_id}.md"))
    }

    /// Renders Markdown into a complete styled HTML document.
    fn render_html(markdown: &str) -> String {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
        let parser = Parser::new_ext(markdown, options);
        let mut body = String::new();
        html::push_html(&mut body, parser);

        let title = extract_title(markdown);
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
{DEFAULT_CSS}
</style>
</head>
<body>
{body}</body>
</html>"#
        )
    }
}

/// First level-one heading of the document, or a generic fallback.
fn extract_title(markdown: &str) -> String {
    markdown
        .lines()
        .find_map(|line| line.trim().strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| "Document".to_string())
}

//=========================================================================================
// `DocumentConverterService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentConverterService for LocalDocumentConverter {
    /// Writes the rendered download file and overwrites the current slot.
    async fn materialize(&self, user_id: Uuid, markdown: &str) -> PortResult<DocumentRef> {
        let file_name = format!("document-{}.html", Uuid::new_v4());
        let html = Self::render_html(markdown);

        tokio::fs::write(self.downloads_dir.join(&file_name), html)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write download file: {e}")))?;
        self.seed_current(user_id, markdown).await?;

        Ok(DocumentRef {
            href: format!("/files/{file_name}"),
            file_name,
        })
    }

    async fn seed_current(&self, user_id: Uuid, markdown: &str) -> PortResult<()> {
        tokio::fs::write(self.current_slot(user_id), markdown)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write current document: {e}")))
    }

    async fn has_current(&self, user_id: Uuid) -> PortResult<bool> {
        tokio::fs::try_exists(self.current_slot(user_id))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn current_blocks(&self, user_id: Uuid) -> PortResult<Vec<TextBlock>> {
        let text = tokio::fs::read_to_string(self.current_slot(user_id))
            .await
            .map_err(|_| PortError::NotFound(format!("No current document for user {user_id}")))?;

        Ok(text
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .enumerate()
            .map(|(index, block)| TextBlock {
                index,
                text: block.to_string(),
            })
            .collect())
    }

    /// Replaces the first occurrence of the selected span in the slot.
    async fn apply_edit(&self, user_id: Uuid, selected: &str, proposed: &str) -> PortResult<()> {
        let path = self.current_slot(user_id);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| PortError::NotFound(format!("No current document for user {user_id}")))?;

        if !text.contains(selected) {
            return Err(PortError::NotFound(
                "The selected content no longer appears in the current document".to_string(),
            ));
        }
        let updated = text.replacen(selected, proposed, 1);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to rewrite current document: {e}")))
    }
}
