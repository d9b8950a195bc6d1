//! Error types for the `lore-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing a document or answering a query.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking, retrieval or pipeline parameters are out of range.
    ///
    /// Raised before any embedding or model work starts.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A text was rejected by the embedding model (usually too long).
    #[error("Invalid input{}: {message}", chunk_label(.chunk_index))]
    InvalidInput {
        /// Position of the offending chunk in the chunk sequence, when known.
        chunk_index: Option<usize>,
        /// A description of the failure.
        message: String,
    },

    /// A network or service hiccup. Safe to retry with backoff.
    #[error("Transient service error ({provider}): {message}")]
    TransientService {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Two vectors that should share an embedding space do not.
    ///
    /// Usually means a node set was built with a different embedding model
    /// than the one used for the query.
    #[error("Dimension mismatch{}: expected {expected}, got {actual}", chunk_label(.chunk_index))]
    DimensionMismatch {
        /// The dimensionality that was expected.
        expected: usize,
        /// The dimensionality that was found.
        actual: usize,
        /// Position of the offending chunk, when the mismatch is inside a node set.
        chunk_index: Option<usize>,
    },

    /// The language model answered with something that is not an entity list.
    #[error("Malformed model output: {}", preview(.raw))]
    MalformedModelOutput {
        /// The raw text returned by the model.
        raw: String,
    },

    /// A permanent failure from the embedding provider.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A permanent failure from the language model provider.
    #[error("Model error ({provider}): {message}")]
    Model {
        /// The model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The caller cancelled the request.
    #[error("Operation cancelled")]
    Cancelled,
}

impl RagError {
    /// Whether the operation that produced this error may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::TransientService { .. })
    }

    /// Attach a chunk position to errors that carry one but do not know it yet.
    pub(crate) fn at_chunk(self, index: usize) -> Self {
        match self {
            RagError::InvalidInput { chunk_index: None, message } => {
                RagError::InvalidInput { chunk_index: Some(index), message }
            }
            RagError::DimensionMismatch { expected, actual, chunk_index: None } => {
                RagError::DimensionMismatch { expected, actual, chunk_index: Some(index) }
            }
            other => other,
        }
    }
}

fn chunk_label(index: &Option<usize>) -> String {
    index.map(|i| format!(" in chunk {i}")).unwrap_or_default()
}

fn preview(raw: &str) -> String {
    const MAX_CHARS: usize = 200;
    let mut out: String = raw.chars().take(MAX_CHARS).collect();
    if raw.chars().count() > MAX_CHARS {
        out.push('…');
    }
    out
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
