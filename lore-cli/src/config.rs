//! Provider settings resolved from flags, environment and `.env`.

use std::sync::Arc;

use anyhow::{Context, bail};
use lore_rag::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, OPENAI_API_BASE, OpenAIChatModel,
    OpenAIEmbeddingProvider,
};
use lore_rag::{MockEmbeddingProvider, MockLanguageModel, RagPipeline, RetryPolicy};

/// Embedding width used when running without a provider.
pub const OFFLINE_DIMENSIONS: usize = 256;

/// Which backends the pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimensions: Option<usize>,
    /// Use deterministic in-process providers instead of the API.
    pub offline: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: OPENAI_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_dimensions: None,
            offline: false,
        }
    }
}

impl ProviderSettings {
    /// Build a pipeline for these settings.
    ///
    /// Offline pipelines embed with hashed vectors and answer every query
    /// with an empty entity list.
    pub fn build_pipeline(&self, retry: RetryPolicy) -> anyhow::Result<RagPipeline> {
        let builder = RagPipeline::builder().retry_policy(retry);

        if self.offline {
            return builder
                .embedding_provider(Arc::new(MockEmbeddingProvider::new(
                    self.embedding_dimensions.unwrap_or(OFFLINE_DIMENSIONS),
                )))
                .language_model(Arc::new(MockLanguageModel::new("[]")))
                .build()
                .context("failed to build offline pipeline");
        }

        let api_key = match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => bail!("OPENAI_API_KEY is not set (pass --api-key, add it to .env, or use --offline)"),
        };

        let mut embedder = OpenAIEmbeddingProvider::new(api_key.clone())?
            .with_api_base(&self.api_base)
            .with_model(&self.embedding_model);
        if let Some(dims) = self.embedding_dimensions {
            embedder = embedder.with_dimensions(dims);
        }
        let model = OpenAIChatModel::new(api_key)?
            .with_api_base(&self.api_base)
            .with_model(&self.chat_model);

        builder
            .embedding_provider(Arc::new(embedder))
            .language_model(Arc::new(model))
            .build()
            .context("failed to build pipeline")
    }
}

/// Retry policy for `max_attempts` total attempts per call.
pub fn retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default().with_max_attempts(max_attempts)
}
