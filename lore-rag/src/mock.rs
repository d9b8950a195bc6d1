//! Deterministic in-process providers for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

/// Hash-based embeddings: the same text always maps to the same unit vector.
///
/// Vectors carry no semantic meaning, but are stable across runs, which is
/// enough to exercise indexing and retrieval without an API key.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb: Vec<f32> =
            (0..self.dimensions as u64).map(|i| unit_interval(splitmix64(hash ^ i))).collect();
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map the top 24 bits of `bits` onto [-1, 1).
fn unit_interval(bits: u64) -> f32 {
    (bits >> 40) as f32 / (1u64 << 23) as f32 - 1.0
}

/// A language model that replays scripted replies in order.
///
/// Once the script is exhausted it keeps returning the last reply. Every
/// request is recorded for later inspection.
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<Result<String>>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLanguageModel {
    /// A model that always answers `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(reply.into())])
    }

    /// A model that answers with each of `replies` in turn.
    pub fn scripted(replies: Vec<Result<String>>) -> Self {
        Self { replies: Mutex::new(replies.into()), ..Self::default() }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
        let mut last = self.last.lock().map_err(|_| RagError::Model {
            provider: "mock".into(),
            message: "reply state poisoned".into(),
        })?;
        match next {
            Some(Ok(reply)) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            Some(Err(e)) => Err(e),
            None => last.clone().ok_or_else(|| RagError::Model {
                provider: "mock".into(),
                message: "no scripted reply".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic_unit_vectors() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed("whale").await.unwrap();
        let b = provider.embed("whale").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn different_texts_get_distinct_directions() {
        let provider = MockEmbeddingProvider::new(256);
        let ahab = provider
            .embed("Captain Ahab commands the Pequod and hunts the white whale without rest.")
            .await
            .unwrap();
        let queequeg = provider
            .embed("Queequeg is a harpooneer from the South Seas and Ishmael's closest friend.")
            .await
            .unwrap();

        let mut components = ahab.clone();
        components.sort_by(f32::total_cmp);
        components.dedup();
        assert!(components.len() > 200);

        let cos = crate::similarity::cosine_similarity(&ahab, &queequeg).unwrap();
        assert!(cos.abs() < 0.99, "cos = {cos}");
    }

    #[tokio::test]
    async fn scripted_model_replays_then_repeats_last() {
        let model = MockLanguageModel::scripted(vec![
            Err(RagError::TransientService { provider: "mock".into(), message: "busy".into() }),
            Ok("[]".into()),
        ]);
        let request = CompletionRequest { prompt: "p".into(), temperature: 0.1, top_p: 1.0 };

        assert!(model.complete(&request).await.is_err());
        assert_eq!(model.complete(&request).await.unwrap(), "[]");
        assert_eq!(model.complete(&request).await.unwrap(), "[]");
        assert_eq!(model.requests().len(), 3);
    }
}
