//! crates/doc_assistant_core/src/segmenter.rs
//!
//! The streaming state machine that re-segments the generation engine's
//! token stream into pass-through chat text and buffered document-body
//! content, using a three-hyphen sentinel line as the boundary.
//!
//! In download mode the buffered body is materialized into a file at
//! marker-close and only the download link reaches the caller. In edit mode
//! the body streams to the caller as a live preview while also being
//! buffered, and marker-close stages it as the user's proposed edit.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use chrono::Utc;
use futures::{Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{ResponseChunk, TokenSource};
use crate::ports::{DocumentConverterService, PendingEditStore, PortResult, TokenStream};

/// The sentinel delimiting document-body content within the token stream.
pub const MARKER: &str = "---";

/// The incrementally produced sequence of chunks the caller receives.
pub type ChunkStream = Pin<Box<dyn Stream<Item = PortResult<ResponseChunk>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Passthrough,
    Buffering,
}

/// A token either contributes text to the current state or flips it.
enum Piece<'a> {
    Text(&'a str),
    Marker,
}

/// Splits one token into marker and text pieces.
///
/// A token whose trimmed text equals the marker is the transition signal.
/// A larger token that carries the marker as its own line (the engine fused
/// it with adjacent text) is split around those lines. A marker spread
/// across several tokens is not detected; the upstream guide instructs the
/// engine never to split the marker line.
fn split_pieces(text: &str) -> Vec<Piece<'_>> {
    if text.trim() == MARKER {
        return vec![Piece::Marker];
    }
    if !text.contains(MARKER) || !text.contains('\n') {
        return vec![Piece::Text(text)];
    }

    let mut pieces = Vec::new();
    let mut run_start = 0usize;
    let mut pos = 0usize;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if content.trim() == MARKER {
            if pos > run_start {
                pieces.push(Piece::Text(&text[run_start..pos]));
            }
            pieces.push(Piece::Marker);
            run_start = pos + line.len();
        }
        pos += line.len();
    }
    if run_start < text.len() {
        pieces.push(Piece::Text(&text[run_start..]));
    }
    pieces
}

/// Consumes ordered token streams and produces caller-facing chunk streams.
pub struct StreamSegmenter {
    pending_edits: Arc<dyn PendingEditStore>,
    converter: Arc<dyn DocumentConverterService>,
}

impl StreamSegmenter {
    pub fn new(
        pending_edits: Arc<dyn PendingEditStore>,
        converter: Arc<dyn DocumentConverterService>,
    ) -> Self {
        Self {
            pending_edits,
            converter,
        }
    }

    /// Drives the token stream through the state machine.
    ///
    /// Tokens not attributed to the engine's own response node are
    /// discarded. With neither flag set there are no document semantics and
    /// every response token passes through verbatim, including a bare
    /// three-hyphen token.
    pub fn segment(
        &self,
        user_id: Uuid,
        edit_flag: bool,
        download_flag: bool,
        mut tokens: TokenStream,
    ) -> ChunkStream {
        let pending_edits = self.pending_edits.clone();
        let converter = self.converter.clone();

        Box::pin(stream! {
            let mut state = SegmentState::Passthrough;
            let mut buffer = String::new();

            while let Some(item) = tokens.next().await {
                let token = match item {
                    Ok(token) => token,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if token.source != TokenSource::Response {
                    continue;
                }
                if !edit_flag && !download_flag {
                    yield Ok(ResponseChunk::Text(token.text));
                    continue;
                }

                for piece in split_pieces(&token.text) {
                    match piece {
                        Piece::Marker => match state {
                            SegmentState::Passthrough => {
                                state = SegmentState::Buffering;
                            }
                            SegmentState::Buffering => {
                                match close_body(
                                    &pending_edits,
                                    &converter,
                                    user_id,
                                    download_flag,
                                    &buffer,
                                )
                                .await
                                {
                                    Ok(Some(chunk)) => yield Ok(chunk),
                                    Ok(None) => {}
                                    Err(e) => {
                                        yield Err(e);
                                        return;
                                    }
                                }
                                buffer.clear();
                                state = SegmentState::Passthrough;
                            }
                        },
                        Piece::Text(text) => match state {
                            SegmentState::Passthrough => {
                                yield Ok(ResponseChunk::Text(text.to_string()));
                            }
                            SegmentState::Buffering => {
                                buffer.push_str(text);
                                if edit_flag {
                                    // Edit previews stream visibly; document
                                    // creation previews do not.
                                    yield Ok(ResponseChunk::Text(text.to_string()));
                                }
                            }
                        },
                    }
                }
            }

            // A closing marker is not a guaranteed upstream contract; flush a
            // still-open body instead of discarding it.
            if state == SegmentState::Buffering && !buffer.trim().is_empty() {
                match close_body(&pending_edits, &converter, user_id, download_flag, &buffer).await
                {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if edit_flag {
                yield Ok(ResponseChunk::ApplyEdit { user_id });
            }
        })
    }
}

/// Marker-close action: materialize the body (download mode, returning the
/// link chunk) or stage it as the user's proposed edit (edit mode).
async fn close_body(
    pending_edits: &Arc<dyn PendingEditStore>,
    converter: &Arc<dyn DocumentConverterService>,
    user_id: Uuid,
    download_flag: bool,
    body: &str,
) -> PortResult<Option<ResponseChunk>> {
    if download_flag {
        let doc = converter.materialize(user_id, body.trim()).await?;
        return Ok(Some(ResponseChunk::DownloadLink { href: doc.href }));
    }

    match pending_edits.get(user_id).await? {
        Some(mut edit) => {
            edit.proposed_content = Some(body.to_string());
            edit.updated_at = Utc::now();
            pending_edits.put(user_id, edit).await?;
        }
        None => {
            warn!(
                "Edit body completed for user {} but no section is selected; dropping the proposal",
                user_id
            );
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentRef, EngineToken, PendingEdit, TextBlock};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryPendingStore {
        entries: Mutex<HashMap<Uuid, PendingEdit>>,
    }

    impl MemoryPendingStore {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl PendingEditStore for MemoryPendingStore {
        async fn put(&self, user_id: Uuid, edit: PendingEdit) -> PortResult<()> {
            self.entries.lock().unwrap().insert(user_id, edit);
            Ok(())
        }

        async fn get(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>> {
            Ok(self.entries.lock().unwrap().get(&user_id).cloned())
        }

        async fn clear_proposed(&self, user_id: Uuid) -> PortResult<()> {
            if let Some(edit) = self.entries.lock().unwrap().get_mut(&user_id) {
                edit.proposed_content = None;
            }
            Ok(())
        }

        async fn consume_and_delete(&self, user_id: Uuid) -> PortResult<Option<PendingEdit>> {
            Ok(self.entries.lock().unwrap().remove(&user_id))
        }
    }

    struct RecordingConverter {
        materialized: Mutex<Vec<String>>,
    }

    impl RecordingConverter {
        fn new() -> Self {
            Self {
                materialized: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentConverterService for RecordingConverter {
        async fn materialize(&self, _user_id: Uuid, markdown: &str) -> PortResult<DocumentRef> {
            let mut materialized = self.materialized.lock().unwrap();
            materialized.push(markdown.to_string());
            let file_name = format!("doc-{}.html", materialized.len());
            Ok(DocumentRef {
                href: format!("/files/{file_name}"),
                file_name,
            })
        }

        async fn seed_current(&self, _user_id: Uuid, _markdown: &str) -> PortResult<()> {
            Ok(())
        }

        async fn has_current(&self, _user_id: Uuid) -> PortResult<bool> {
            Ok(false)
        }

        async fn current_blocks(&self, _user_id: Uuid) -> PortResult<Vec<TextBlock>> {
            Ok(Vec::new())
        }

        async fn apply_edit(
            &self,
            _user_id: Uuid,
            _selected: &str,
            _proposed: &str,
        ) -> PortResult<()> {
            Ok(())
        }
    }

    fn token_stream(tokens: Vec<EngineToken>) -> TokenStream {
        Box::pin(futures::stream::iter(tokens.into_iter().map(Ok)))
    }

    fn response_tokens(texts: &[&str]) -> TokenStream {
        token_stream(texts.iter().map(|t| EngineToken::response(*t)).collect())
    }

    async fn collect(stream: ChunkStream) -> Vec<ResponseChunk> {
        stream
            .map(|item| item.expect("stream should not error"))
            .collect()
            .await
    }

    fn segmenter() -> (StreamSegmenter, Arc<MemoryPendingStore>, Arc<RecordingConverter>) {
        let store = Arc::new(MemoryPendingStore::new());
        let converter = Arc::new(RecordingConverter::new());
        let segmenter = StreamSegmenter::new(store.clone(), converter.clone());
        (segmenter, store, converter)
    }

    #[tokio::test]
    async fn download_mode_replaces_the_body_with_one_link() {
        let (segmenter, _store, converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens =
            response_tokens(&["Sure, here:", "\n", "---", "# Onboarding", "---", "Done."]);

        let chunks = collect(segmenter.segment(user, false, true, tokens)).await;

        assert_eq!(
            chunks,
            vec![
                ResponseChunk::Text("Sure, here:".to_string()),
                ResponseChunk::Text("\n".to_string()),
                ResponseChunk::DownloadLink {
                    href: "/files/doc-1.html".to_string()
                },
                ResponseChunk::Text("Done.".to_string()),
            ]
        );
        assert_eq!(
            converter.materialized.lock().unwrap().as_slice(),
            &["# Onboarding".to_string()]
        );
    }

    #[tokio::test]
    async fn download_output_is_invariant_to_body_token_granularity() {
        let user = Uuid::new_v4();
        let coarse = vec!["---", "# Title\n\n- item one\n- item two", "---"];
        let fine = vec!["---", "# Title", "\n\n- item", " one\n- item", " two", "---"];

        let mut recorded = Vec::new();
        for tokens in [coarse, fine] {
            let (segmenter, _store, converter) = segmenter();
            let chunks =
                collect(segmenter.segment(user, false, true, response_tokens(&tokens))).await;

            let links = chunks
                .iter()
                .filter(|c| matches!(c, ResponseChunk::DownloadLink { .. }))
                .count();
            let raw_body = chunks
                .iter()
                .any(|c| matches!(c, ResponseChunk::Text(t) if t.contains("item")));
            assert_eq!(links, 1);
            assert!(!raw_body, "body tokens must never reach the caller");

            recorded.push(converter.materialized.lock().unwrap()[0].clone());
        }
        assert_eq!(recorded[0], recorded[1]);
    }

    #[tokio::test]
    async fn edit_mode_streams_the_body_and_stages_it_as_proposed() {
        let (segmenter, store, _converter) = segmenter();
        let user = Uuid::new_v4();
        store
            .put(user, PendingEdit::new("old section".to_string(), Some(4), Some(15)))
            .await
            .unwrap();

        let tokens = response_tokens(&[
            "Tightened the wording:",
            "---",
            "New section text",
            " with more detail",
            "---",
        ]);
        let chunks = collect(segmenter.segment(user, true, false, tokens)).await;

        // The preview chunks between the markers concatenate to exactly the
        // staged proposal.
        let forwarded: String = chunks
            .iter()
            .skip(1)
            .filter_map(|c| match c {
                ResponseChunk::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        let edit = store.get(user).await.unwrap().unwrap();
        assert_eq!(edit.proposed_content.as_deref(), Some(forwarded.as_str()));
        assert_eq!(edit.selected_content, "old section");
        assert_eq!(edit.range_start, Some(4));

        assert_eq!(chunks.last(), Some(&ResponseChunk::ApplyEdit { user_id: user }));
    }

    #[tokio::test]
    async fn plain_chat_passes_a_bare_marker_through() {
        let (segmenter, _store, _converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens = response_tokens(&["thinking", "---", "done"]);

        let chunks = collect(segmenter.segment(user, false, false, tokens)).await;

        assert_eq!(
            chunks,
            vec![
                ResponseChunk::Text("thinking".to_string()),
                ResponseChunk::Text("---".to_string()),
                ResponseChunk::Text("done".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn tool_tokens_are_discarded() {
        let (segmenter, _store, converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens = token_stream(vec![
            EngineToken::response("Looked it up."),
            EngineToken::tool(r#"{"query":"onboarding","section":"beginning"}"#),
            EngineToken::response(" Here you go."),
        ]);

        let chunks = collect(segmenter.segment(user, false, true, tokens)).await;

        assert_eq!(
            chunks,
            vec![
                ResponseChunk::Text("Looked it up.".to_string()),
                ResponseChunk::Text(" Here you go.".to_string()),
            ]
        );
        assert!(converter.materialized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_marker_fused_into_a_larger_token_still_transitions() {
        let (segmenter, _store, converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens = response_tokens(&["Here you go.\n---\n# Fused body", "---"]);

        let chunks = collect(segmenter.segment(user, false, true, tokens)).await;

        assert_eq!(
            chunks,
            vec![
                ResponseChunk::Text("Here you go.\n".to_string()),
                ResponseChunk::DownloadLink {
                    href: "/files/doc-1.html".to_string()
                },
            ]
        );
        assert_eq!(
            converter.materialized.lock().unwrap().as_slice(),
            &["# Fused body".to_string()]
        );
    }

    #[tokio::test]
    async fn exhaustion_while_buffering_flushes_the_body() {
        let (segmenter, _store, converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens = response_tokens(&["---", "# Unclosed document"]);

        let chunks = collect(segmenter.segment(user, false, true, tokens)).await;

        assert_eq!(
            chunks,
            vec![ResponseChunk::DownloadLink {
                href: "/files/doc-1.html".to_string()
            }]
        );
        assert_eq!(
            converter.materialized.lock().unwrap().as_slice(),
            &["# Unclosed document".to_string()]
        );
    }

    #[tokio::test]
    async fn edit_close_without_a_selected_section_drops_the_proposal() {
        let (segmenter, store, _converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens = response_tokens(&["---", "orphan body", "---"]);

        let chunks = collect(segmenter.segment(user, true, false, tokens)).await;

        assert!(store.get(user).await.unwrap().is_none());
        assert_eq!(chunks.last(), Some(&ResponseChunk::ApplyEdit { user_id: user }));
    }

    #[tokio::test]
    async fn upstream_errors_terminate_the_stream() {
        let (segmenter, _store, _converter) = segmenter();
        let user = Uuid::new_v4();
        let tokens: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok(EngineToken::response("partial")),
            Err(crate::ports::PortError::Unexpected("engine died".to_string())),
        ]));

        let results: Vec<_> = segmenter.segment(user, false, false, tokens).collect().await;

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Ok(ResponseChunk::Text(ref t)) if t == "partial"
        ));
        assert!(results[1].is_err());
    }
}
