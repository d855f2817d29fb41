//! crates/doc_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or external service format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Intent
//=========================================================================================

/// The closed set of intents a user utterance can resolve to.
///
/// Classifier output that does not name a member of this set normalizes
/// to `Chat`; there is no error path for an unrecognized label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateDocument,
    UploadDocument,
    GenerateOutline,
    SelectSection,
    SuggestSection,
    ConfirmSection,
    EditSection,
    ContinueEditing,
    RejectChange,
    AcceptChange,
    DownloadDocument,
    ExportDocument,
    Chat,
}

impl Intent {
    /// Normalizes a raw classifier reply into an `Intent`.
    ///
    /// Trims whitespace, lowercases, and strips trailing periods before
    /// matching. Anything left unrecognized becomes `Chat`.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let normalized = normalized.trim_end_matches('.').trim();
        match normalized {
            "create_document" => Intent::CreateDocument,
            "upload_document" => Intent::UploadDocument,
            "generate_outline" => Intent::GenerateOutline,
            "select_section" => Intent::SelectSection,
            "suggest_section" => Intent::SuggestSection,
            "confirm_section" => Intent::ConfirmSection,
            "edit_section" => Intent::EditSection,
            "continue_editing" => Intent::ContinueEditing,
            "reject_change" => Intent::RejectChange,
            "accept_change" => Intent::AcceptChange,
            "download_document" => Intent::DownloadDocument,
            "export_document" => Intent::ExportDocument,
            _ => Intent::Chat,
        }
    }

    /// The wire-format tag for this intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateDocument => "create_document",
            Intent::UploadDocument => "upload_document",
            Intent::GenerateOutline => "generate_outline",
            Intent::SelectSection => "select_section",
            Intent::SuggestSection => "suggest_section",
            Intent::ConfirmSection => "confirm_section",
            Intent::EditSection => "edit_section",
            Intent::ContinueEditing => "continue_editing",
            Intent::RejectChange => "reject_change",
            Intent::AcceptChange => "accept_change",
            Intent::DownloadDocument => "download_document",
            Intent::ExportDocument => "export_document",
            Intent::Chat => "chat",
        }
    }
}

//=========================================================================================
// Pending Edit
//=========================================================================================

/// The single in-flight proposed change for one user, awaiting accept/reject.
///
/// `proposed_content` is populated only between the completion of an edit
/// generation cycle and the accept/reject that consumes it.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    /// The text currently under discussion: an explicitly supplied span or a
    /// previously chosen section.
    pub selected_content: String,
    /// The generated replacement, if an edit cycle has completed.
    pub proposed_content: Option<String>,
    /// Document offset of the selection start, when chosen in a UI.
    pub range_start: Option<usize>,
    /// Document offset of the selection end, when chosen in a UI.
    pub range_end: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl PendingEdit {
    /// Creates a fresh pending edit for a newly selected span or section.
    pub fn new(selected_content: String, range_start: Option<usize>, range_end: Option<usize>) -> Self {
        Self {
            selected_content,
            proposed_content: None,
            range_start,
            range_end,
            updated_at: Utc::now(),
        }
    }
}

/// An explicit content span submitted alongside a chat request.
#[derive(Debug, Clone)]
pub struct SectionSelection {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

//=========================================================================================
// Generation stream
//=========================================================================================

/// Which internal node of the generation engine produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// The model's own response text. Only these reach the segmenter.
    Response,
    /// Tool-call plumbing (retrieval queries, arguments). Discarded.
    Tool,
}

/// One token of the ordered generation stream, tagged with its source.
#[derive(Debug, Clone)]
pub struct EngineToken {
    pub text: String,
    pub source: TokenSource,
}

impl EngineToken {
    /// A token authored by the model's response node.
    pub fn response(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TokenSource::Response,
        }
    }

    /// A token produced by tool-call plumbing.
    pub fn tool(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TokenSource::Tool,
        }
    }
}

/// The composed request handed to the generation engine for one turn.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fully composed prompt text (guides already prepended).
    pub prompt: String,
    /// Per-user retrieval namespace, passed through to the search tool.
    pub namespace: String,
    /// Stable conversation thread identifier so engine memory persists
    /// across turns.
    pub thread_id: String,
    /// Marker-close stores the buffered body as a proposed edit.
    pub edit_flag: bool,
    /// Marker-close materializes the buffered body into a file.
    pub download_flag: bool,
}

/// One chunk of the incrementally produced response the caller receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseChunk {
    /// Conversational text, forwarded verbatim and in order.
    Text(String),
    /// Reference to a freshly materialized document file.
    DownloadLink { href: String },
    /// Trailing callback reference the caller can use to apply a staged edit.
    ApplyEdit { user_id: Uuid },
}

//=========================================================================================
// Retrieval
//=========================================================================================

/// Positional bucket a chunk is assigned to at ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionTag {
    Beginning,
    Middle,
    End,
}

impl SectionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionTag::Beginning => "beginning",
            SectionTag::Middle => "middle",
            SectionTag::End => "end",
        }
    }

    /// Parses a metadata value back into a tag. Unknown values fold into
    /// `Middle`, the least specific bucket.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "beginning" => SectionTag::Beginning,
            "end" => SectionTag::End,
            _ => SectionTag::Middle,
        }
    }
}

/// A chunk ready for indexing: text plus its positional tag.
#[derive(Debug, Clone)]
pub struct IndexableChunk {
    pub text: String,
    pub section: SectionTag,
}

/// A ranked passage returned from the vector store.
#[derive(Debug, Clone)]
pub struct Passage {
    pub text: String,
    pub section: SectionTag,
    pub score: f32,
}

//=========================================================================================
// Documents
//=========================================================================================

/// A paragraph-like block of a persisted document, addressable by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub index: usize,
    pub text: String,
}

/// Reference to a materialized, downloadable document file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Caller-facing link for retrieving the file.
    pub href: String,
    pub file_name: String,
}

/// A file uploaded alongside a chat request, prior to extraction.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

//=========================================================================================
// Conversation memory
//=========================================================================================

/// Who authored a remembered conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One remembered turn of a conversation thread.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}
