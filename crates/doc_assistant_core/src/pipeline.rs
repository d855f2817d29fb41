//! crates/doc_assistant_core/src/pipeline.rs
//!
//! Orchestrates a single chat request end to end: synchronous ingestion of
//! an uploaded file, intent classification, the store-only intents that
//! never reach the engine, prompt composition, and finally the generation
//! stream driven through the segmenter.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::{bucket_sections, split_text};
use crate::domain::{
    GenerationRequest, Intent, PendingEdit, ResponseChunk, SectionSelection, UploadedFile,
};
use crate::intent::IntentClassifier;
use crate::ports::{
    DocumentConverterService, GenerationService, PendingEditStore, PortResult,
    TextExtractorService, VectorSearchService,
};
use crate::prompt::{compose, Composed};
use crate::segmenter::{ChunkStream, StreamSegmenter};

/// Fixed reply when accept/reject arrives with nothing staged.
pub const NO_PENDING_CHANGES_MESSAGE: &str =
    "There are no pending changes to apply. Select a section and ask for an edit first.";

/// Fixed reply when section work is requested before any document exists.
pub const NEED_DOCUMENT_MESSAGE: &str =
    "I need a document to work with. Please upload one or ask me to create one first.";

/// Confirmation reply after a proposed change is applied.
pub const CHANGE_APPLIED_MESSAGE: &str = "Done - I've applied the change to your document.";

/// Confirmation reply after a proposed change is discarded.
pub const CHANGE_DISCARDED_MESSAGE: &str =
    "I've discarded that change. The section is still selected if you want to try a different edit.";

/// Reply when the selected section can no longer be found in the document.
pub const SELECTION_GONE_MESSAGE: &str =
    "I couldn't apply the change: the selected section no longer appears in your document. Please select it again.";

/// One inbound chat request, after transport decoding.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user_id: Uuid,
    pub question: String,
    /// File uploaded with the message, ingested before answering.
    pub upload: Option<UploadedFile>,
    /// Explicit content span chosen in a UI.
    pub selection: Option<SectionSelection>,
}

/// The full request pipeline behind the chat endpoint.
pub struct ChatPipeline {
    engine: Arc<dyn GenerationService>,
    vectors: Arc<dyn VectorSearchService>,
    extractor: Arc<dyn TextExtractorService>,
    converter: Arc<dyn DocumentConverterService>,
    pending_edits: Arc<dyn PendingEditStore>,
    classifier: IntentClassifier,
    segmenter: StreamSegmenter,
}

impl ChatPipeline {
    pub fn new(
        engine: Arc<dyn GenerationService>,
        vectors: Arc<dyn VectorSearchService>,
        extractor: Arc<dyn TextExtractorService>,
        converter: Arc<dyn DocumentConverterService>,
        pending_edits: Arc<dyn PendingEditStore>,
    ) -> Self {
        let classifier = IntentClassifier::new(engine.clone());
        let segmenter = StreamSegmenter::new(pending_edits.clone(), converter.clone());
        Self {
            engine,
            vectors,
            extractor,
            converter,
            pending_edits,
            classifier,
            segmenter,
        }
    }

    /// Handles one request and returns the incrementally produced response.
    ///
    /// The returned stream is forward-only and must be relayed to the caller
    /// losslessly and in order.
    pub async fn respond(&self, request: ChatRequest) -> PortResult<ChunkStream> {
        if let Some(upload) = &request.upload {
            self.ingest(request.user_id, upload).await?;
        }

        let intent = self.classifier.classify(&request.question).await?;
        info!("Handling '{}' request for user {}", intent.as_str(), request.user_id);

        match intent {
            Intent::AcceptChange => {
                let message = self.accept_change(request.user_id).await?;
                return Ok(single_message(message));
            }
            Intent::RejectChange => {
                let message = self.reject_change(request.user_id).await?;
                return Ok(single_message(message));
            }
            Intent::SelectSection if request.selection.is_none() => {
                if !self.converter.has_current(request.user_id).await? {
                    return Ok(single_message(NEED_DOCUMENT_MESSAGE.to_string()));
                }
                // A document exists; let the model guide the selection below.
            }
            _ => {}
        }

        // An explicit span creates (or replaces) the pending selection before
        // composition, so edit intents in the same request can use it.
        if let Some(span) = &request.selection {
            self.pending_edits
                .put(
                    request.user_id,
                    PendingEdit::new(span.content.clone(), Some(span.start), Some(span.end)),
                )
                .await?;
        }

        let pending = self.pending_edits.get(request.user_id).await?;
        let composed = compose(
            intent,
            &request.question,
            pending.as_ref(),
            request.selection.as_ref(),
        );

        let prompt = match composed {
            Composed::ShortCircuit(message) => return Ok(single_message(message)),
            Composed::Prompt(prompt) => prompt,
        };

        let generation = GenerationRequest {
            prompt: prompt.text,
            namespace: request.user_id.to_string(),
            thread_id: thread_id_for(request.user_id),
            edit_flag: prompt.edit_flag,
            download_flag: prompt.download_flag,
        };
        let tokens = self.engine.stream(generation).await?;

        Ok(self.segmenter.segment(
            request.user_id,
            prompt.edit_flag,
            prompt.download_flag,
            tokens,
        ))
    }

    /// Extracts, chunks, tags, and indexes an uploaded file. Blocks until
    /// the index write is visible so the same request can query it.
    async fn ingest(&self, user_id: Uuid, upload: &UploadedFile) -> PortResult<()> {
        let blocks = self
            .extractor
            .extract(&upload.file_name, &upload.bytes)
            .await?;
        if blocks.is_empty() {
            warn!(
                "No text extracted from '{}'; continuing with an empty corpus",
                upload.file_name
            );
            return Ok(());
        }

        let chunks = bucket_sections(split_text(&blocks.join("\n\n")));
        if chunks.is_empty() {
            return Ok(());
        }
        info!(
            "Indexing {} chunks from '{}' for user {}",
            chunks.len(),
            upload.file_name,
            user_id
        );
        self.vectors.upsert(&user_id.to_string(), &chunks).await
    }

    /// Applies the staged proposal to the current document and deletes the
    /// pending-edit entry. The entry survives a failed application.
    async fn accept_change(&self, user_id: Uuid) -> PortResult<String> {
        let edit = match self.pending_edits.get(user_id).await? {
            Some(edit) => edit,
            None => return Ok(NO_PENDING_CHANGES_MESSAGE.to_string()),
        };
        let proposed = match edit.proposed_content.as_deref() {
            Some(proposed) => proposed,
            None => return Ok(NO_PENDING_CHANGES_MESSAGE.to_string()),
        };

        match self
            .converter
            .apply_edit(user_id, &edit.selected_content, proposed)
            .await
        {
            Ok(()) => {}
            // The document changed underneath the selection; keep the entry
            // so the user can reselect, and explain instead of failing.
            Err(crate::ports::PortError::NotFound(_)) => {
                return Ok(SELECTION_GONE_MESSAGE.to_string());
            }
            Err(e) => return Err(e),
        }
        self.pending_edits.consume_and_delete(user_id).await?;
        Ok(CHANGE_APPLIED_MESSAGE.to_string())
    }

    /// Discards the staged proposal but keeps the selection active.
    async fn reject_change(&self, user_id: Uuid) -> PortResult<String> {
        if self.pending_edits.get(user_id).await?.is_none() {
            return Ok(NO_PENDING_CHANGES_MESSAGE.to_string());
        }
        self.pending_edits.clear_proposed(user_id).await?;
        Ok(CHANGE_DISCARDED_MESSAGE.to_string())
    }
}

/// Stable per-user thread id so the engine's own memory persists across turns.
pub fn thread_id_for(user_id: Uuid) -> String {
    format!("user-{user_id}")
}

fn single_message(message: String) -> ChunkStream {
    Box::pin(futures::stream::iter(vec![Ok(ResponseChunk::Text(message))]))
}
