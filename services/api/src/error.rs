//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use doc_assistant_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Configuration could not be loaded or validated at startup.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure surfaced through one of the core capability ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Filesystem or network IO failure (storage setup, socket binding, serving).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup wiring failures with no more specific variant.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
