//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::files::LocalDocumentConverter;
use crate::config::Config;
use doc_assistant_core::pipeline::ChatPipeline;
use doc_assistant_core::ports::{PendingEditStore, TextExtractorService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<ChatPipeline>,
    pub pending_edits: Arc<dyn PendingEditStore>,
    pub extractor: Arc<dyn TextExtractorService>,
    /// Held concretely so download handlers can resolve file paths.
    pub converter: Arc<LocalDocumentConverter>,
}
