//! services/api/src/adapters/vector_store.rs
//!
//! This module contains the vector index adapter. It implements the
//! `VectorSearchService` port from the `core` crate against the Pinecone
//! data-plane HTTP API, embedding text through the OpenAI embeddings
//! endpoint. Each user maps to one Pinecone namespace derived from a
//! deterministic hash of the namespace key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use doc_assistant_core::domain::{IndexableChunk, Passage, SectionTag};
use doc_assistant_core::ports::{PortError, PortResult, VectorSearchService};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VectorSearchService` using Pinecone for
/// storage and OpenAI for embeddings.
#[derive(Clone)]
pub struct PineconeVectorAdapter {
    http: reqwest::Client,
    index_host: String,
    pinecone_api_key: String,
    openai_api_key: String,
    embedding_model: String,
}

impl PineconeVectorAdapter {
    /// Creates a new `PineconeVectorAdapter`.
    pub fn new(
        index_host: String,
        pinecone_api_key: String,
        openai_api_key: String,
        embedding_model: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            index_host: index_host.trim_end_matches('/').to_string(),
            pinecone_api_key,
            openai_api_key,
            embedding_model,
        }
    }

    /// Deterministic Pinecone namespace for a namespace key (the user id).
    fn namespace_hash(namespace: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Embeds a batch of texts, preserving input order.
    async fn embed(&self, inputs: &[String]) -> PortResult<Vec<Vec<f32>>> {
        let response = self
            .http
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.openai_api_key)
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Embedding request failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Embedding request rejected: {e}")))?;

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed embedding response: {e}")))?;
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct UpsertRequest {
    vectors: Vec<VectorRecord>,
    namespace: String,
}

#[derive(Serialize)]
struct VectorRecord {
    id: String,
    values: Vec<f32>,
    metadata: VectorMetadata,
}

#[derive(Serialize, Deserialize)]
struct VectorMetadata {
    text: String,
    section: String,
}

#[derive(Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    namespace: String,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    score: f32,
    metadata: Option<VectorMetadata>,
}

//=========================================================================================
// `VectorSearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VectorSearchService for PineconeVectorAdapter {
    /// Embeds and upserts chunks under the namespace. Pinecone acknowledges
    /// the write before returning, which gives query-after-write visibility
    /// for the ingestion path.
    async fn upsert(&self, namespace: &str, chunks: &[IndexableChunk]) -> PortResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(PortError::Unexpected(format!(
                "Embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        let vectors = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                values,
                metadata: VectorMetadata {
                    text: chunk.text.clone(),
                    section: chunk.section.as_str().to_string(),
                },
            })
            .collect();

        self.http
            .post(format!("{}/vectors/upsert", self.index_host))
            .header("Api-Key", &self.pinecone_api_key)
            .json(&UpsertRequest {
                vectors,
                namespace: Self::namespace_hash(namespace),
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Index upsert failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Index upsert rejected: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        query: &str,
        section: Option<SectionTag>,
        top_k: usize,
    ) -> PortResult<Vec<Passage>> {
        let embeddings = self.embed(&[query.to_string()]).await?;
        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Unexpected("Embedding response was empty".to_string()))?;

        let filter = section
            .map(|tag| serde_json::json!({ "section": { "$eq": tag.as_str() } }));

        let response = self
            .http
            .post(format!("{}/query", self.index_host))
            .header("Api-Key", &self.pinecone_api_key)
            .json(&QueryRequest {
                vector,
                top_k,
                namespace: Self::namespace_hash(namespace),
                include_metadata: true,
                filter,
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Index query failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Index query rejected: {e}")))?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed query response: {e}")))?;

        Ok(parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|metadata| Passage {
                    text: metadata.text,
                    section: SectionTag::parse(&metadata.section),
                    score: m.score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_hash_is_deterministic_and_user_specific() {
        let a = PineconeVectorAdapter::namespace_hash("user-a");
        let b = PineconeVectorAdapter::namespace_hash("user-a");
        let c = PineconeVectorAdapter::namespace_hash("user-b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn query_request_uses_pinecone_field_names() {
        let request = QueryRequest {
            vector: vec![0.1, 0.2],
            top_k: 4,
            namespace: "ns".to_string(),
            include_metadata: true,
            filter: Some(serde_json::json!({ "section": { "$eq": "beginning" } })),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["topK"], 4);
        assert_eq!(wire["includeMetadata"], true);
        assert_eq!(wire["filter"]["section"]["$eq"], "beginning");
    }

    #[test]
    fn query_request_omits_an_absent_filter() {
        let request = QueryRequest {
            vector: vec![0.1],
            top_k: 4,
            namespace: "ns".to_string(),
            include_metadata: true,
            filter: None,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("filter").is_none());
    }
}
