//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. Failures should be reported as
/// [`RagError::TransientService`](crate::RagError::TransientService) when a
/// retry may help and as [`RagError::InvalidInput`](crate::RagError::InvalidInput)
/// when the model rejects a text (for example because it is too long).
///
/// # Example
///
/// ```rust,ignore
/// use lore_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate an embedding for a search query.
    ///
    /// Must produce vectors in the same space as [`embed`](EmbeddingProvider::embed).
    /// Backends with a separate query mode can override it.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// Generate embedding vectors for a batch of text inputs, in input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially and tags an [`InvalidInput`](crate::RagError::InvalidInput)
    /// failure with the position of the rejected text within the batch.
    /// Backends with native batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            results.push(self.embed(text).await.map_err(|e| e.at_chunk(i))?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short provider name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}
