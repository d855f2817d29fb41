//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    protocol::{PendingEditResponse, SeedDocumentResponse, StreamEvent},
    state::AppState,
};
use async_stream::stream;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use uuid::Uuid;

use doc_assistant_core::domain::{SectionSelection, UploadedFile};
use doc_assistant_core::pipeline::ChatRequest;
use doc_assistant_core::ports::{DocumentConverterService, PendingEditStore, TextExtractorService};
use doc_assistant_core::segmenter::ChunkStream;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        pending_edit_handler,
        seed_document_handler,
    ),
    components(
        schemas(PendingEditResponse, SeedDocumentResponse)
    ),
    tags(
        (name = "Document Assistant API", description = "API endpoints for the conversational document assistant.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Chat Endpoint
//=========================================================================================

/// Handle a chat message, streaming the response as server-sent events.
///
/// Accepts multipart/form-data with `question`, `user_id`, an optional
/// `file` to ingest before answering, and an optional explicit selection
/// (`doc_start`/`doc_end`/`doc_content`).
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let mut question: Option<String> = None;
    let mut user_id: Option<Uuid> = None;
    let mut upload: Option<UploadedFile> = None;
    let mut doc_start: Option<usize> = None;
    let mut doc_end: Option<usize> = None;
    let mut doc_content: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question" => question = Some(read_text_field(field, "question").await?),
            "user_id" => {
                let raw = read_text_field(field, "user_id").await?;
                let parsed = Uuid::parse_str(raw.trim()).map_err(|_| {
                    (StatusCode::BAD_REQUEST, "Invalid user_id format".to_string())
                })?;
                user_id = Some(parsed);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.txt").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                upload = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "doc_start" => doc_start = Some(read_offset_field(field, "doc_start").await?),
            "doc_end" => doc_end = Some(read_offset_field(field, "doc_end").await?),
            "doc_content" => doc_content = Some(read_text_field(field, "doc_content").await?),
            _ => {}
        }
    }

    let question = question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "question is required".to_string()))?;
    let user_id =
        user_id.ok_or_else(|| (StatusCode::BAD_REQUEST, "user_id is required".to_string()))?;

    let selection = match (doc_start, doc_end, doc_content) {
        (Some(start), Some(end), Some(content)) => {
            Some(SectionSelection { start, end, content })
        }
        _ => None,
    };

    let request = ChatRequest {
        user_id,
        question,
        upload,
        selection,
    };

    let chunks = app_state.pipeline.respond(request).await.map_err(|e| {
        error!("Failed to start chat response: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start the response".to_string(),
        )
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(into_sse(chunks)))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to build response: {}", e),
            )
        })
}

/// Relays pipeline chunks as SSE frames, losslessly and in order. Upstream
/// failures end the stream with a terminal error event.
fn into_sse(mut chunks: ChunkStream) -> impl Stream<Item = Result<String, Infallible>> {
    stream! {
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => yield Ok(StreamEvent::from_chunk(chunk).to_sse()),
                Err(e) => {
                    error!("Streamed response failed: {}", e);
                    yield Ok(StreamEvent::Error { message: e.to_string() }.to_sse());
                    return;
                }
            }
        }
        yield Ok(StreamEvent::Done.to_sse());
    }
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, (StatusCode, String)> {
    field.text().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read field '{}': {}", name, e),
        )
    })
}

async fn read_offset_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<usize, (StatusCode, String)> {
    let raw = read_text_field(field, name).await?;
    raw.trim().parse::<usize>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("Field '{}' must be a non-negative offset", name),
        )
    })
}

//=========================================================================================
// Pending-Edit Poll Endpoint
//=========================================================================================

/// Poll for a completed pending edit.
#[utoipa::path(
    get,
    path = "/api/edits/{user_id}",
    responses(
        (status = 200, description = "A completed pending edit is staged", body = PendingEditResponse),
        (status = 404, description = "No completed pending edit for this user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn pending_edit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PendingEditResponse>, (StatusCode, String)> {
    let edit = app_state.pending_edits.get(user_id).await.map_err(|e| {
        error!("Failed to read pending edit: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read pending edit".to_string(),
        )
    })?;

    edit.and_then(PendingEditResponse::from_edit)
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No completed pending edit for this user".to_string(),
            )
        })
}

//=========================================================================================
// Download Endpoint
//=========================================================================================

/// Serve a previously materialized document file.
pub async fn download_handler(
    State(app_state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    // Materialized names are flat; anything path-like is rejected.
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        return Err((StatusCode::BAD_REQUEST, "Invalid file name".to_string()));
    }

    let path = app_state.converter.download_path(&file_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, "File not found".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        bytes,
    )
        .into_response())
}

//=========================================================================================
// Document Seed Endpoint
//=========================================================================================

/// Seed or overwrite a user's current document from an uploaded file.
#[utoipa::path(
    post,
    path = "/api/documents",
    request_body(content_type = "multipart/form-data", description = "A `user_id` field and the document `file`."),
    responses(
        (status = 201, description = "Document stored as the user's current document", body = SeedDocumentResponse),
        (status = 400, description = "Bad request (missing fields or no extractable text)"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn seed_document_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut user_id: Option<Uuid> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" => {
                let raw = read_text_field(field, "user_id").await?;
                let parsed = Uuid::parse_str(raw.trim()).map_err(|_| {
                    (StatusCode::BAD_REQUEST, "Invalid user_id format".to_string())
                })?;
                user_id = Some(parsed);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("document.md").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let user_id =
        user_id.ok_or_else(|| (StatusCode::BAD_REQUEST, "user_id is required".to_string()))?;
    let file = file.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        )
    })?;

    let blocks = app_state
        .extractor
        .extract(&file.file_name, &file.bytes)
        .await
        .map_err(|e| {
            error!("Failed to extract document text: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to extract document text".to_string(),
            )
        })?;
    if blocks.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No text could be extracted from the uploaded file".to_string(),
        ));
    }

    let block_count = blocks.len();
    app_state
        .converter
        .seed_current(user_id, &blocks.join("\n\n"))
        .await
        .map_err(|e| {
            error!("Failed to store current document: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store the document".to_string(),
            )
        })?;

    info!(
        "Seeded current document for user {} ({} blocks)",
        user_id, block_count
    );
    Ok((
        StatusCode::CREATED,
        Json(SeedDocumentResponse {
            user_id,
            block_count,
        }),
    ))
}
