pub mod chunking;
pub mod domain;
pub mod intent;
pub mod pipeline;
pub mod ports;
pub mod prompt;
pub mod segmenter;

pub use domain::{
    ChatTurn, DocumentRef, EngineToken, GenerationRequest, IndexableChunk, Intent, Passage,
    PendingEdit, ResponseChunk, SectionSelection, SectionTag, TextBlock, TokenSource, TurnRole,
    UploadedFile,
};
pub use pipeline::{ChatPipeline, ChatRequest};
pub use ports::{
    ConversationStore, DocumentConverterService, GenerationService, PendingEditStore, PortError,
    PortResult, TextExtractorService, TokenStream, VectorSearchService,
};
pub use segmenter::{ChunkStream, StreamSegmenter};
