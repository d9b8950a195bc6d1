//! Extraction pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the two stages of a request by composing
//! an [`EmbeddingProvider`], a [`LanguageModel`] and a [`Tokenizer`]:
//!
//! - **index**: chunk → embed (batched, concurrent) → [`NodeSet`]
//! - **query**: embed query → top-K → synthesize
//!
//! The pipeline holds no per-request state; node sets are owned by the
//! caller and passed back in for each query.
//!
//! # Example
//!
//! ```rust,ignore
//! use lore_rag::{RagPipeline, MockEmbeddingProvider, MockLanguageModel, SamplingParams};
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::new(64)))
//!     .language_model(Arc::new(MockLanguageModel::new("[]")))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let nodes = pipeline.index(&text, 3000, 20, &cancel).await?;
//! let answer = pipeline.query("Who is Ahab?", &nodes, 2, SamplingParams::default(), &cancel).await?;
//! ```

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::chunking::TokenChunker;
use crate::config::{RagConfig, validate_sampling};
use crate::document::{Chunk, EmbeddedNode, NodeSet, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::similarity::SimilarityIndex;
use crate::synthesis::{SamplingParams, Synthesis, Synthesizer};
use crate::tokenizer::{Tokenizer, WordTokenizer};

/// Default number of chunks sent in one embedding request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;
/// Default number of embedding requests in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// The extraction pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. All dependency handles are
/// read-only after construction, so one pipeline can serve concurrent
/// requests behind an `Arc`.
pub struct RagPipeline {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    synthesizer: Synthesizer,
    tokenizer: Arc<dyn Tokenizer>,
    retry: RetryPolicy,
    embed_batch_size: usize,
    max_concurrency: usize,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Index a document: chunk → embed → node set.
    ///
    /// Parameters are validated before the tokenizer or the embedding
    /// provider is touched.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] for bad chunk parameters
    /// - [`RagError::InvalidInput`] naming the chunk the model rejected
    /// - [`RagError::TransientService`] once retries are exhausted
    /// - [`RagError::DimensionMismatch`] if the provider returns vectors of
    ///   differing length
    /// - [`RagError::Cancelled`]
    pub async fn index(
        &self,
        document: &str,
        chunk_size: usize,
        chunk_overlap: usize,
        cancel: &CancellationToken,
    ) -> Result<NodeSet> {
        let chunker = TokenChunker::with_tokenizer(chunk_size, chunk_overlap, self.tokenizer.clone())?;

        let chunks = chunker.chunk(document);
        if chunks.is_empty() {
            info!(chunk_count = 0, "indexed document (empty)");
            return Ok(NodeSet::default());
        }

        let embeddings = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RagError::Cancelled),
            embeddings = self.embed_chunks(&chunks, cancel) => embeddings,
        };
        let embeddings =
            embeddings.inspect_err(|e| error!(error = %e, "embedding failed during indexing"))?;

        let nodes: Vec<EmbeddedNode> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedNode { chunk, embedding })
            .collect();
        let nodes = NodeSet::new(nodes);
        nodes.validate_dimensions().inspect_err(|e| error!(error = %e, "inconsistent embeddings"))?;

        info!(
            chunk_count = nodes.len(),
            dimensions = nodes.dimensions().unwrap_or_default(),
            chunk_size,
            chunk_overlap,
            "indexed document"
        );
        Ok(nodes)
    }

    /// Retrieve the `top_k` nodes most similar to `query`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] if `top_k == 0`
    /// - [`RagError::DimensionMismatch`] if `nodes` was built in a different
    ///   embedding space
    /// - embedding errors, after retries
    pub async fn retrieve(
        &self,
        query: &str,
        nodes: &NodeSet,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        if top_k == 0 {
            return Err(RagError::InvalidConfiguration("top_k must be at least 1".to_string()));
        }
        let index = SimilarityIndex::new(nodes)?;
        if index.is_empty() {
            debug!("retrieval over empty node set");
            return Ok(Vec::new());
        }

        let query_embedding = retry_with_backoff(&self.retry, cancel, "embed_query", || {
            self.embedding_provider.embed_query(query)
        })
        .await
        .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

        let results = index.top_k(&query_embedding, top_k)?;
        debug!(
            result_count = results.len(),
            best_score = results.first().map(|r| r.score).unwrap_or_default(),
            "retrieval completed"
        );
        Ok(results)
    }

    /// Answer `query` from `nodes`: retrieve → synthesize.
    ///
    /// A reply that is not an entity list comes back as
    /// [`Synthesis::Malformed`] rather than an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] for out-of-range `top_k` or
    ///   sampling parameters
    /// - retrieval errors (see [`retrieve`](Self::retrieve))
    /// - model errors, after retries
    pub async fn query(
        &self,
        query: &str,
        nodes: &NodeSet,
        top_k: usize,
        params: SamplingParams,
        cancel: &CancellationToken,
    ) -> Result<Synthesis> {
        validate_sampling(top_k, params.temperature, params.top_p)?;
        let retrieved = self.retrieve(query, nodes, top_k, cancel).await?;
        self.synthesizer.synthesize(query, &retrieved, params, cancel).await
    }

    /// Index `document` and answer `query` in one call.
    pub async fn extract(
        &self,
        document: &str,
        query: &str,
        config: &RagConfig,
        cancel: &CancellationToken,
    ) -> Result<Synthesis> {
        config.validate()?;
        let nodes = self.index(document, config.chunk_size, config.chunk_overlap, cancel).await?;
        let params = SamplingParams { temperature: config.temperature, top_p: config.top_p };
        self.query(query, &nodes, config.top_k, params, cancel).await
    }

    /// Embed every chunk, batching and running batches concurrently.
    ///
    /// Output order matches `chunks`.
    async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        debug!(
            provider = self.embedding_provider.name(),
            chunk_count = chunks.len(),
            batch_size = self.embed_batch_size,
            max_concurrency = self.max_concurrency,
            "embedding chunks"
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(chunks.chunks(self.embed_batch_size))
            .map(|batch| self.embed_batch(batch, cancel))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_batch(&self, batch: &[Chunk], cancel: &CancellationToken) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let first_index = batch[0].index;

        let result = retry_with_backoff(&self.retry, cancel, "embed_batch", || {
            self.embedding_provider.embed_batch(&texts)
        })
        .await;

        let embeddings = match result {
            Ok(embeddings) => embeddings,
            Err(RagError::InvalidInput { chunk_index: Some(offset), message }) => {
                return Err(RagError::InvalidInput {
                    chunk_index: Some(first_index + offset),
                    message,
                });
            }
            Err(e @ RagError::InvalidInput { chunk_index: None, .. }) if batch.len() > 1 => {
                return Err(self.locate_invalid_chunk(batch, cancel).await.unwrap_or(e));
            }
            Err(e) => return Err(e.at_chunk(first_index)),
        };

        if embeddings.len() != batch.len() {
            return Err(RagError::Embedding {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "expected {} embeddings for chunks {}..{}, got {}",
                    batch.len(),
                    first_index,
                    first_index + batch.len(),
                    embeddings.len()
                ),
            });
        }
        Ok(embeddings)
    }

    /// Re-embed a rejected batch one chunk at a time to find the culprit.
    async fn locate_invalid_chunk(
        &self,
        batch: &[Chunk],
        cancel: &CancellationToken,
    ) -> Option<RagError> {
        debug!(batch_len = batch.len(), "locating rejected chunk");
        for chunk in batch {
            let result = retry_with_backoff(&self.retry, cancel, "embed", || {
                self.embedding_provider.embed(&chunk.text)
            })
            .await;
            match result {
                Ok(_) => {}
                Err(RagError::InvalidInput { message, .. }) => {
                    return Some(RagError::InvalidInput { chunk_index: Some(chunk.index), message });
                }
                Err(e) => return Some(e),
            }
        }
        None
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `language_model` are required; everything else
/// has a default.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .embedding_provider(Arc::new(embedder))
///     .language_model(Arc::new(model))
///     .retry_policy(RetryPolicy::default().with_max_attempts(5))  // optional
///     .max_concurrency(8)                                          // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    retry: Option<RetryPolicy>,
    embed_batch_size: Option<usize>,
    max_concurrency: Option<usize>,
}

impl RagPipelineBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the language model used for synthesis.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Replace the default [`WordTokenizer`].
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Set the retry policy for embedding and model calls.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set how many chunks go into one embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = Some(size);
        self
    }

    /// Set how many embedding requests may be in flight at once.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required field is
    /// missing or a limit is zero.
    pub fn build(self) -> Result<RagPipeline> {
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let language_model = self.language_model.ok_or_else(|| {
            RagError::InvalidConfiguration("language_model is required".to_string())
        })?;
        let embed_batch_size = self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE);
        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if embed_batch_size == 0 || max_concurrency == 0 {
            return Err(RagError::InvalidConfiguration(
                "embed_batch_size and max_concurrency must be at least 1".to_string(),
            ));
        }
        let retry = self.retry.unwrap_or_default();

        Ok(RagPipeline {
            embedding_provider,
            synthesizer: Synthesizer::new(language_model).with_retry_policy(retry),
            tokenizer: self.tokenizer.unwrap_or_else(|| Arc::new(WordTokenizer)),
            retry,
            embed_batch_size,
            max_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEmbeddingProvider, MockLanguageModel};

    #[test]
    fn builder_requires_both_providers() {
        let missing_model =
            RagPipeline::builder().embedding_provider(Arc::new(MockEmbeddingProvider::new(8))).build();
        assert!(matches!(missing_model, Err(RagError::InvalidConfiguration(msg)) if msg.contains("language_model")));

        let missing_embedder =
            RagPipeline::builder().language_model(Arc::new(MockLanguageModel::new("[]"))).build();
        assert!(matches!(missing_embedder, Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn builder_rejects_zero_limits() {
        let build = |batch: usize, concurrency: usize| {
            RagPipeline::builder()
                .embedding_provider(Arc::new(MockEmbeddingProvider::new(8)))
                .language_model(Arc::new(MockLanguageModel::new("[]")))
                .embed_batch_size(batch)
                .max_concurrency(concurrency)
                .build()
        };
        assert!(build(0, 4).is_err());
        assert!(build(16, 0).is_err());
        assert!(build(1, 1).is_ok());
    }

    #[tokio::test]
    async fn batching_preserves_chunk_order() {
        let pipeline = RagPipeline::builder()
            .embedding_provider(Arc::new(MockEmbeddingProvider::new(8)))
            .language_model(Arc::new(MockLanguageModel::new("[]")))
            .embed_batch_size(3)
            .max_concurrency(2)
            .build()
            .unwrap();
        let document: String = (0..40).map(|i| format!("w{i} ")).collect();

        let nodes = pipeline.index(&document, 4, 1, &CancellationToken::new()).await.unwrap();
        let expected = MockEmbeddingProvider::new(8);
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.chunk.index, i);
            assert_eq!(node.embedding, expected.embed(&node.chunk.text).await.unwrap());
        }
    }
}
