//! crates/doc_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like LLM providers,
//! vector indexes, or the filesystem.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    ChatTurn, DocumentRef, EngineToken, GenerationRequest, IndexableChunk, Passage, PendingEdit,
    SectionTag, TextBlock,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., LLM APIs,
/// the vector index, the filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unsupported input: {0}")]
    Unsupported(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The ordered, finite token stream produced by the generation engine.
pub type TokenStream = Pin<Box<dyn Stream<Item = PortResult<EngineToken>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The generation engine: one non-streaming completion entry point for
/// constrained calls, and a streaming entry point whose tokens are tagged
/// with the engine node that produced them.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Runs a single completion on the given thread and returns the reply text.
    ///
    /// Used for constrained calls (intent classification); carries no
    /// conversation memory.
    async fn complete(&self, thread_id: &str, prompt: &str) -> PortResult<String>;

    /// Streams a response for the composed request. The engine may call the
    /// retrieval tool internally; tokens it produces while doing so must be
    /// tagged [`crate::domain::TokenSource::Tool`].
    async fn stream(&self, request: GenerationRequest) -> PortResult<TokenStream>;
}

/// The vector index, partitioned into one namespace per user.
#[async_trait]
pub trait VectorSearchService: Send + Sync {
    /// Indexes chunks (with their section metadata) under a namespace.
    /// Must not return before the write is visible to queries.
    async fn upsert(&self, namespace: &str, chunks: &[IndexableChunk]) -> PortResult<()>;

    /// Returns ranked passages for a query, optionally filtered to a section.
    async fn search(
        &self,
        namespace: &str,
        query: &str,
        section: Option<SectionTag>,
        top_k: usize,
    ) -> PortResult<Vec<Passage>>;
}

/// The document format converter and per-user "current document" slot.
#[async_trait]
pub trait DocumentConverterService: Send + Sync {
    /// Converts a Markdown body into a downloadable file, overwrites the
    /// user's current-document slot with the raw Markdown, and returns a
    /// retrieval reference.
    async fn materialize(&self, user_id: Uuid, markdown: &str) -> PortResult<DocumentRef>;

    /// Overwrites the user's current-document slot without producing a
    /// download file.
    async fn seed_current(&self, user_id: Uuid, markdown: &str) -> PortResult<()>;

    /// Whether the user has a current document to work with.
    async fn has_current(&self, user_id: Uuid) -> PortResult<bool>;

    /// Reads the user's current document as addressable paragraph blocks.
    async fn current_blocks(&self, user_id: Uuid) -> PortResult<Vec<TextBlock>>;

    /// Replaces the first occurrence of `selected` in the user's current
    /// document with `proposed` and rewrites the slot.
    async fn apply_edit(&self, user_id: Uuid, selected: &str, proposed: &str) -> PortResult<()>;
}

/// Text extraction from uploaded files.
#[async_trait]
pub trait TextExtractorService: Send + Sync {
    /// Extracts paragraph-like text blocks from an uploaded file.
    ///
    /// Unrecognized or unreadable formats yield an empty sequence rather
    /// than an error; ingestion then proceeds with an empty corpus.
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> PortResult<Vec<String>>;
}

/// Single-slot pending-edit state, keyed by user. Last write wins.
#[async_trait]
pub trait PendingEditStore: Send + Sync {
    /// Creates or replaces the user's pending-edit slot.
    async fn put(&self, user_id: Uuid, edit: PendingEdit) -> PortResult<()>;

    /// Reads the user's pending-edit slot, if any.
    async fn get(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>>;

    /// Clears only the proposed content, preserving the selection so the
    /// user can retry editing the same section. No-op when the slot is empty.
    async fn clear_proposed(&self, user_id: Uuid) -> PortResult<()>;

    /// Removes and returns the whole entry.
    async fn consume_and_delete(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>>;
}

/// Per-thread conversation memory with an explicit get/put/delete surface,
/// so the backing store is swappable (in-memory for tests, durable in
/// production) without changing call sites.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the remembered turns for a thread, oldest first.
    async fn get(&self, thread_id: &str) -> PortResult<Vec<ChatTurn>>;

    /// Replaces the remembered turns for a thread.
    async fn put(&self, thread_id: &str, turns: Vec<ChatTurn>) -> PortResult<()>;

    /// Forgets a thread entirely.
    async fn delete(&self, thread_id: &str) -> PortResult<()>;
}
