//! services/api/src/web/protocol.rs
//!
//! Defines the wire protocol between the browser client and the API server:
//! the server-sent events carried by the chat response stream and the DTOs
//! for the REST endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use doc_assistant_core::domain::{PendingEdit, ResponseChunk};

//=========================================================================================
// Chat Stream Events (Server -> Client)
//=========================================================================================

/// One event of the chat response stream, relayed losslessly and in order.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental conversational text (or a live edit preview).
    Text { content: String },
    /// A materialized document is ready at the given link.
    Download { href: String },
    /// A staged edit is ready; the client can poll it and apply or discard.
    ApplyEdit { user_id: Uuid },
    /// Terminal failure of the streamed response.
    Error { message: String },
    /// End of stream.
    Done,
}

impl StreamEvent {
    pub fn from_chunk(chunk: ResponseChunk) -> Self {
        match chunk {
            ResponseChunk::Text(content) => StreamEvent::Text { content },
            ResponseChunk::DownloadLink { href } => StreamEvent::Download { href },
            ResponseChunk::ApplyEdit { user_id } => StreamEvent::ApplyEdit { user_id },
        }
    }

    /// Renders the event as one SSE `data:` frame.
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", serde_json::to_string(self).unwrap())
    }
}

//=========================================================================================
// REST Payloads
//=========================================================================================

/// A completed pending edit, returned by the poll endpoint.
#[derive(Serialize, ToSchema)]
pub struct PendingEditResponse {
    pub selected_content: String,
    pub proposed_content: String,
    pub range_start: Option<usize>,
    pub range_end: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl PendingEditResponse {
    /// Builds the response from a store entry, if its proposal is complete.
    pub fn from_edit(edit: PendingEdit) -> Option<Self> {
        let proposed_content = edit.proposed_content?;
        Some(Self {
            selected_content: edit.selected_content,
            proposed_content,
            range_start: edit.range_start,
            range_end: edit.range_end,
            updated_at: edit.updated_at,
        })
    }
}

/// Response after seeding a user's current document.
#[derive(Serialize, ToSchema)]
pub struct SeedDocumentResponse {
    pub user_id: Uuid,
    /// Number of paragraph blocks the seeded document contains.
    pub block_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_events_serialize_with_snake_case_tags() {
        let event = StreamEvent::Text {
            content: "hello".to_string(),
        };
        assert_eq!(
            event.to_sse(),
            "data: {\"type\":\"text\",\"content\":\"hello\"}\n\n"
        );

        let event = StreamEvent::Download {
            href: "/files/x.html".to_string(),
        };
        assert!(event.to_sse().contains("\"type\":\"download\""));

        assert!(StreamEvent::Done.to_sse().contains("\"type\":\"done\""));
    }

    #[test]
    fn pending_edit_response_requires_a_completed_proposal() {
        let incomplete = PendingEdit::new("selected".to_string(), None, None);
        assert!(PendingEditResponse::from_edit(incomplete).is_none());

        let mut complete = PendingEdit::new("selected".to_string(), Some(2), Some(8));
        complete.proposed_content = Some("proposed".to_string());
        let response = PendingEditResponse::from_edit(complete).unwrap();
        assert_eq!(response.selected_content, "selected");
        assert_eq!(response.proposed_content, "proposed");
        assert_eq!(response.range_start, Some(2));
    }
}
