//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        extractor::FileTextExtractor, files::LocalDocumentConverter,
        generation_llm::OpenAiGenerationAdapter, memory::InMemoryConversationStore,
        memory::InMemoryPendingEditStore, vector_store::PineconeVectorAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        chat_handler, download_handler, pending_edit_handler, rest::ApiDoc,
        seed_document_handler, state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use doc_assistant_core::pipeline::ChatPipeline;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Prepare Document Storage ---
    let converter = Arc::new(LocalDocumentConverter::new(&config.storage_dir));
    converter.init().await?;
    info!("Document storage ready at {}", config.storage_dir.display());

    // --- 3. Initialize Service Adapters ---
    let openai_api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
    let openai_config = OpenAIConfig::new().with_api_key(&openai_api_key);
    let openai_client = Client::with_config(openai_config);

    let pinecone_api_key = config
        .pinecone_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("PINECONE_API_KEY is required".to_string()))?;
    let pinecone_index_host = config
        .pinecone_index_host
        .clone()
        .ok_or_else(|| ApiError::Internal("PINECONE_INDEX_HOST is required".to_string()))?;

    let vector_adapter = Arc::new(PineconeVectorAdapter::new(
        pinecone_index_host,
        pinecone_api_key,
        openai_api_key,
        config.embedding_model.clone(),
    ));
    let pending_edits = Arc::new(InMemoryPendingEditStore::new());
    let conversations = Arc::new(InMemoryConversationStore::new());
    let extractor = Arc::new(FileTextExtractor::new());

    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        openai_client,
        config.chat_model.clone(),
        vector_adapter.clone(),
        conversations,
        config.retrieval_top_k,
    ));

    // --- 4. Build the Pipeline and Shared AppState ---
    let pipeline = Arc::new(ChatPipeline::new(
        generation_adapter,
        vector_adapter,
        extractor.clone(),
        converter.clone(),
        pending_edits.clone(),
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        pipeline,
        pending_edits,
        extractor,
        converter,
    });

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/documents", post(seed_document_handler))
        .route("/api/edits/{user_id}", get(pending_edit_handler))
        .route("/files/{file_name}", get(download_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
