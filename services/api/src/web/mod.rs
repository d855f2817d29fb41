pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary
// that builds the web server router.
pub use rest::{
    chat_handler, download_handler, pending_edit_handler, seed_document_handler, ApiDoc,
};
