pub mod extractor;
pub mod files;
pub mod generation_llm;
pub mod memory;
pub mod vector_store;

pub use extractor::FileTextExtractor;
pub use files::LocalDocumentConverter;
pub use generation_llm::OpenAiGenerationAdapter;
pub use memory::{InMemoryConversationStore, InMemoryPendingEditStore};
pub use vector_store::PineconeVectorAdapter;
