//! Brute-force cosine similarity search over a [`NodeSet`].
//!
//! Node sets are built fresh per document and stay small, so every query is
//! a single O(N·d) scan. There is no persistent index structure.

use std::cmp::Ordering;

use crate::document::{EmbeddedNode, NodeSet, RetrievalResult, ScoredNode};
use crate::error::{RagError, Result};

/// Scores closer than this are treated as equal when ranking.
pub const SCORE_EPSILON: f32 = 1e-6;

/// Compute cosine similarity between two vectors.
///
/// The result is clamped to `[-1, 1]`. Returns 0.0 if either vector has zero
/// magnitude.
///
/// # Errors
///
/// Returns [`RagError::DimensionMismatch`] if the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
            chunk_index: None,
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Rank `nodes` by cosine similarity to `query` and keep the best `k`.
///
/// If `k` exceeds the number of nodes, every node is returned ranked.
/// Scores within [`SCORE_EPSILON`] of the best score in their run are tied
/// and keep chunk order.
///
/// # Errors
///
/// - [`RagError::InvalidConfiguration`] if `k == 0`
/// - [`RagError::DimensionMismatch`] if any node's embedding differs in
///   length from `query`
pub fn top_k(nodes: &NodeSet, query: &[f32], k: usize) -> Result<RetrievalResult> {
    SimilarityIndex::new(nodes)?.top_k(query, k)
}

/// A read-only view over a [`NodeSet`] that answers top-K queries.
///
/// Construction checks once that all nodes share a dimension; each query
/// then only checks the query vector.
///
/// # Example
///
/// ```rust,ignore
/// let index = SimilarityIndex::new(&nodes)?;
/// let best = index.top_k(&query_embedding, 2)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SimilarityIndex<'a> {
    nodes: &'a NodeSet,
}

impl<'a> SimilarityIndex<'a> {
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the node set mixes dimensions.
    pub fn new(nodes: &'a NodeSet) -> Result<Self> {
        nodes.validate_dimensions()?;
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// See [`top_k`].
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration("top_k must be at least 1".to_string()));
        }
        if let Some(expected) = self.nodes.dimensions() {
            if expected != query.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                    chunk_index: None,
                });
            }
        }

        let mut scored: Vec<(f32, &EmbeddedNode, f32)> = self
            .nodes
            .iter()
            .map(|node| {
                let score = cosine_similarity(&node.embedding, query)
                    .map_err(|e| e.at_chunk(node.chunk.index))?;
                let rank = if score.is_nan() { f32::NEG_INFINITY } else { score };
                Ok((rank, node, score))
            })
            .collect::<Result<_>>()?;

        scored.sort_by(|a, b| match b.0.total_cmp(&a.0) {
            Ordering::Equal => a.1.chunk.index.cmp(&b.1.chunk.index),
            other => other,
        });
        order_ties_by_chunk(&mut scored);
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, node, score)| ScoredNode { node: node.clone(), score })
            .collect())
    }
}

/// Reorder runs of near-equal scores by chunk index.
///
/// `scored` must already be sorted by descending rank. A run starts at its
/// highest score and takes every following score within [`SCORE_EPSILON`]
/// of it, so no run spans more than epsilon.
fn order_ties_by_chunk(scored: &mut [(f32, &EmbeddedNode, f32)]) {
    let mut start = 0;
    while start < scored.len() {
        let leader = scored[start].0;
        let run = scored[start..]
            .iter()
            .take_while(|(rank, _, _)| leader - rank <= SCORE_EPSILON)
            .count()
            .max(1);
        scored[start..start + run].sort_by_key(|(_, node, _)| node.chunk.index);
        start += run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn nodes(embeddings: &[&[f32]]) -> NodeSet {
        embeddings
            .iter()
            .enumerate()
            .map(|(index, e)| EmbeddedNode {
                chunk: Chunk {
                    index,
                    text: format!("chunk {index}"),
                    start_offset: index,
                    end_offset: index + 1,
                },
                embedding: e.to_vec(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let s = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let s = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn zero_vector_has_similarity_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_fail() {
        assert!(matches!(
            cosine_similarity(&[1.0, 0.0], &[1.0]),
            Err(RagError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn top_two_of_five_sorted_descending() {
        let set = nodes(&[&[0.0, 1.0], &[1.0, 0.0], &[0.7, 0.7], &[-1.0, 0.0], &[0.9, 0.1]]);
        let result = top_k(&set, &[1.0, 0.0], 2).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].node.chunk.index, 1);
        assert_eq!(result[1].node.chunk.index, 4);
        assert!(result[0].score >= result[1].score);
    }

    #[test]
    fn k_larger_than_set_returns_everything() {
        let set = nodes(&[&[0.0, 1.0], &[1.0, 0.0], &[0.7, 0.7], &[-1.0, 0.0], &[0.9, 0.1]]);
        let result = top_k(&set, &[1.0, 0.0], 10).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result.last().unwrap().node.chunk.index, 3);
    }

    #[test]
    fn ties_keep_chunk_order() {
        let set = nodes(&[&[0.0, 1.0], &[2.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]]);
        let result = top_k(&set, &[1.0, 0.0], 4).unwrap();
        let order: Vec<usize> = result.iter().map(|r| r.node.chunk.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn near_ties_keep_chunk_order() {
        let unit = |c: f32| vec![c, (1.0 - c * c).sqrt()];
        let (lower, higher, best) = (unit(0.819_216_5), unit(0.819_216_67), unit(0.9));
        let set = nodes(&[lower.as_slice(), higher.as_slice(), best.as_slice()]);
        let result = top_k(&set, &[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = result.iter().map(|r| r.node.chunk.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn clear_gaps_rank_by_score() {
        let unit = |c: f32| vec![c, (1.0 - c * c).sqrt()];
        let (a, b) = (unit(0.81), unit(0.82));
        let set = nodes(&[a.as_slice(), b.as_slice()]);
        let result = top_k(&set, &[1.0, 0.0], 2).unwrap();
        assert_eq!(result[0].node.chunk.index, 1);
    }

    #[test]
    fn similarity_stays_within_unit_range() {
        let a: Vec<f32> = (0..256).map(|i| (i as f32 * 0.37).sin()).collect();
        let opposite: Vec<f32> = a.iter().map(|x| -3.0 * x).collect();
        let scaled: Vec<f32> = a.iter().map(|x| 7.5 * x).collect();

        let s = cosine_similarity(&a, &opposite).unwrap();
        assert!((-1.0..=1.0).contains(&s));
        assert!((s + 1.0).abs() < 1e-5);
        let s = cosine_similarity(&a, &scaled).unwrap();
        assert!((-1.0..=1.0).contains(&s));
        assert!((s - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_k_is_rejected() {
        let set = nodes(&[&[1.0, 0.0]]);
        assert!(matches!(top_k(&set, &[1.0, 0.0], 0), Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn query_dimension_must_match_nodes() {
        let set = nodes(&[&[1.0, 0.0], &[0.0, 1.0]]);
        assert!(matches!(
            top_k(&set, &[1.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch { expected: 2, actual: 3, chunk_index: None })
        ));
    }

    #[test]
    fn empty_set_returns_empty_result() {
        let result = top_k(&NodeSet::default(), &[1.0, 0.0], 3).unwrap();
        assert!(result.is_empty());
    }
}
