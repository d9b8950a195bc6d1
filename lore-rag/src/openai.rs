//! OpenAI-compatible embedding and chat completion providers.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! providers talk to `{api_base}/embeddings` and `{api_base}/chat/completions`
//! with `reqwest`, so any OpenAI-compatible server (vLLM, Ollama, LM Studio,
//! Azure-style proxies) can be used by overriding the base URL.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model used for synthesis.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "OpenAI";

fn api_key_from_env() -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| RagError::InvalidConfiguration(
        "OPENAI_API_KEY environment variable not set".to_string(),
    ))
}

fn check_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(RagError::InvalidConfiguration("API key must not be empty".to_string()));
    }
    Ok(())
}

fn endpoint(api_base: &str, path: &str) -> String {
    format!("{}/{path}", api_base.trim_end_matches('/'))
}

// ── Error classification ───────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn transport_error(e: reqwest::Error, permanent: impl FnOnce(String) -> RagError) -> RagError {
    error!(provider = PROVIDER, error = %e, "request failed");
    if e.is_timeout() || e.is_connect() || e.is_request() {
        RagError::TransientService { provider: PROVIDER.into(), message: format!("request failed: {e}") }
    } else {
        permanent(format!("request failed: {e}"))
    }
}

/// Map a non-success HTTP response onto the error taxonomy.
///
/// 408, 429 and 5xx are transient. A 400 complaining about input length is
/// an invalid input. Anything else is a permanent failure built by
/// `permanent`.
fn status_error(
    status: StatusCode,
    body: String,
    permanent: impl FnOnce(String) -> RagError,
) -> RagError {
    let (detail, code) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(e) => (e.error.message, e.error.code),
        Err(_) => (body, None),
    };
    error!(provider = PROVIDER, %status, detail = %detail, "API error");
    let message = format!("API returned {status}: {detail}");

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        return RagError::TransientService { provider: PROVIDER.into(), message };
    }
    if status == StatusCode::BAD_REQUEST && is_length_error(&detail, code.as_deref()) {
        return RagError::InvalidInput { chunk_index: None, message };
    }
    permanent(message)
}

fn is_length_error(detail: &str, code: Option<&str>) -> bool {
    if code == Some("context_length_exceeded") {
        return true;
    }
    let detail = detail.to_ascii_lowercase();
    detail.contains("maximum context length")
        || detail.contains("too many tokens")
        || detail.contains("too long")
}

fn embedding_error(message: String) -> RagError {
    RagError::Embedding { provider: PROVIDER.into(), message }
}

fn model_error(message: String) -> RagError {
    RagError::Model { provider: PROVIDER.into(), message }
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `api_base` – defaults to `https://api.openai.com/v1`.
///
/// # Example
///
/// ```rust,ignore
/// use lore_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Point the provider at an OpenAI-compatible server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(endpoint(&self.api_base, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(e, embedding_error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, embedding_error));
        }

        let mut embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            embedding_error(format!("failed to parse response: {e}"))
        })?;

        // the API may return items out of input order; `index` is authoritative
        embedding_response.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`LanguageModel`] backed by the OpenAI chat completions API.
///
/// The prompt is sent as a single user message.
///
/// # Example
///
/// ```rust,ignore
/// use lore_rag::openai::OpenAIChatModel;
///
/// let model = OpenAIChatModel::from_env()?.with_model("gpt-4o");
/// ```
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIChatModel {
    /// Create a new model client with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Create a new model client using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Point the client at an OpenAI-compatible server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = request.prompt.len(),
            temperature = request.temperature,
            top_p = request.top_p,
            "requesting chat completion"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            top_p: request.top_p,
        };

        let response = self
            .client
            .post(endpoint(&self.api_base, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, model_error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body, model_error));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            model_error(format!("failed to parse response: {e}"))
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| model_error("API returned no completion".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
