//! Data types for chunks, embedded nodes, retrieval results and extracted entities.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A contiguous, token-bounded span of a source document.
///
/// `start_offset` and `end_offset` are token indices into the document's
/// token stream (end exclusive). `text` is the exact substring of the
/// document covered by those tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Index of the first token in the chunk.
    pub start_offset: usize,
    /// Index one past the last token in the chunk.
    pub end_offset: usize,
}

impl Chunk {
    /// Number of tokens covered by this chunk.
    pub fn token_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// A [`Chunk`] paired with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedNode {
    /// The chunk this embedding was computed for.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// The vector embedding for the chunk's text.
    pub embedding: Vec<f32>,
}

/// Every [`EmbeddedNode`] produced by indexing one document, in chunk order.
///
/// This is the unit handed from indexing to querying. It serializes as a
/// plain JSON array of node records so it can cross a process boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct NodeSet {
    nodes: Vec<EmbeddedNode>,
}

impl NodeSet {
    /// Wrap already-ordered nodes.
    pub fn new(nodes: Vec<EmbeddedNode>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmbeddedNode> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> &[EmbeddedNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<EmbeddedNode> {
        self.nodes
    }

    /// Dimensionality of the embeddings, taken from the first node.
    ///
    /// Returns `None` for an empty set.
    pub fn dimensions(&self) -> Option<usize> {
        self.nodes.first().map(|n| n.embedding.len())
    }

    /// Check that every node has an embedding of the same, non-zero dimension.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] naming the first offending chunk.
    pub fn validate_dimensions(&self) -> Result<()> {
        let Some(expected) = self.dimensions() else {
            return Ok(());
        };
        if expected == 0 {
            return Err(RagError::DimensionMismatch {
                expected: 1,
                actual: 0,
                chunk_index: Some(self.nodes[0].chunk.index),
            });
        }
        for node in &self.nodes {
            if node.embedding.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: node.embedding.len(),
                    chunk_index: Some(node.chunk.index),
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<EmbeddedNode>> for NodeSet {
    fn from(nodes: Vec<EmbeddedNode>) -> Self {
        Self::new(nodes)
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a EmbeddedNode;
    type IntoIter = std::slice::Iter<'a, EmbeddedNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// A retrieved [`EmbeddedNode`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredNode {
    /// The retrieved node.
    pub node: EmbeddedNode,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Nodes ranked by descending similarity, at most `k` long.
pub type RetrievalResult = Vec<ScoredNode>;

/// One entity extracted from the retrieved context.
///
/// Fields the model left out are empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality: String,
}

impl ExtractedEntity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        personality: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), description: description.into(), personality: personality.into() }
    }
}
