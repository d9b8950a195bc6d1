//! Request/response boundary for callers outside the crate.
//!
//! Two calls mirror the two pipeline stages:
//!
//! - [`split_and_embed`]: `{document, chunkSize, chunkOverlap}` →
//!   `{nodesWithEmbedding}`
//! - [`retrieve_and_query`]: `{query, nodesWithEmbedding, topK, temperature,
//!   topP}` → `{response}`
//!
//! Both answer with an [`ApiResponse`], which serializes as either
//! `{"error": "..."}` or `{"payload": {...}}`.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_QUERY, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
    DEFAULT_TOP_P, MalformedOutputPolicy,
};
use crate::document::{ExtractedEntity, NodeSet};
use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;
use crate::synthesis::{SamplingParams, Synthesis};

/// Either an error message or a payload, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiResponse<T> {
    Error(String),
    Payload(T),
}

impl<T> ApiResponse<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            ApiResponse::Payload(payload) => Some(payload),
            ApiResponse::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ApiResponse::Error(message) => Some(message),
            ApiResponse::Payload(_) => None,
        }
    }
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => ApiResponse::Payload(payload),
            Err(e) => ApiResponse::Error(e.to_string()),
        }
    }
}

/// Input of the indexing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRequest {
    pub document: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl IndexRequest {
    /// A request for `document` with the default chunking parameters.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Output of the indexing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPayload {
    pub nodes_with_embedding: NodeSet,
}

/// Input of the query call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default = "default_query")]
    pub query: String,
    pub nodes_with_embedding: NodeSet,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl QueryRequest {
    /// A request for the default query over `nodes` with default parameters.
    pub fn new(nodes: NodeSet) -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            nodes_with_embedding: nodes,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// Output of the query call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload {
    pub response: Vec<ExtractedEntity>,
    /// The model's unparsed reply, present only when it was not an entity list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_top_p() -> f32 {
    DEFAULT_TOP_P
}

/// Split a document into chunks and embed them.
pub async fn split_and_embed(
    pipeline: &RagPipeline,
    request: IndexRequest,
    cancel: &CancellationToken,
) -> ApiResponse<IndexPayload> {
    pipeline
        .index(&request.document, request.chunk_size, request.chunk_overlap, cancel)
        .await
        .map(|nodes| IndexPayload { nodes_with_embedding: nodes })
        .inspect_err(|e| error!(error = %e, "split_and_embed failed"))
        .into()
}

/// Retrieve the most relevant chunks and extract entities from them.
///
/// `policy` decides whether a reply that is not an entity list becomes an
/// empty `response` with `rawAnswer` set, or an error.
pub async fn retrieve_and_query(
    pipeline: &RagPipeline,
    request: QueryRequest,
    policy: MalformedOutputPolicy,
    cancel: &CancellationToken,
) -> ApiResponse<QueryPayload> {
    let params = SamplingParams { temperature: request.temperature, top_p: request.top_p };
    let result = pipeline
        .query(&request.query, &request.nodes_with_embedding, request.top_k, params, cancel)
        .await
        .and_then(|synthesis| payload_for(synthesis, policy));
    result.inspect_err(|e| error!(error = %e, "retrieve_and_query failed")).into()
}

fn payload_for(synthesis: Synthesis, policy: MalformedOutputPolicy) -> Result<QueryPayload> {
    match (synthesis, policy) {
        (Synthesis::Entities(response), _) => Ok(QueryPayload { response, raw_answer: None }),
        (Synthesis::Malformed { raw }, MalformedOutputPolicy::Degrade) => {
            debug!("returning no entities with the raw answer attached");
            Ok(QueryPayload { response: Vec::new(), raw_answer: Some(raw) })
        }
        (Synthesis::Malformed { raw }, MalformedOutputPolicy::Strict) => {
            Err(RagError::MalformedModelOutput { raw })
        }
    }
}
