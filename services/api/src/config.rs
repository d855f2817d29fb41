//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Root directory for materialized downloads and current-document slots.
    pub storage_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub pinecone_api_key: Option<String>,
    /// Data-plane host of the Pinecone index, e.g. `https://my-index-abc.svc.pinecone.io`.
    pub pinecone_index_host: Option<String>,
    /// Passages fetched per retrieval tool call.
    pub retrieval_top_k: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let storage_dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));

        // --- Load API Keys (as optional; required ones are checked at startup) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let pinecone_api_key = std::env::var("PINECONE_API_KEY").ok();
        let pinecone_index_host = std::env::var("PINECONE_INDEX_HOST").ok();

        // --- Load Adapter-specific Settings ---
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-large".to_string());

        let top_k_str = std::env::var("RETRIEVAL_TOP_K").unwrap_or_else(|_| "4".to_string());
        let retrieval_top_k = top_k_str.parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(
                "RETRIEVAL_TOP_K".to_string(),
                format!("'{}' is not a valid count", top_k_str),
            )
        })?;

        Ok(Self {
            bind_address,
            log_level,
            storage_dir,
            openai_api_key,
            chat_model,
            embedding_model,
            pinecone_api_key,
            pinecone_index_host,
            retrieval_top_k,
        })
    }
}
