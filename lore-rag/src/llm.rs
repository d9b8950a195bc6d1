//! Language model trait used by the synthesizer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling value.
    pub top_p: f32,
}

/// A text completion backend.
///
/// Implementations should map retryable transport or service failures to
/// [`RagError::TransientService`](crate::RagError::TransientService) so the
/// synthesizer can back off and try again.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `request.prompt` and return the model's raw text answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// A short model name used in logs and errors.
    fn name(&self) -> &str {
        "model"
    }
}
