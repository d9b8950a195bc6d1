//! Token-window document chunking.
//!
//! [`TokenChunker`] walks a document's token stream with a sliding window of
//! `chunk_size` tokens and a stride of `chunk_size - chunk_overlap`, emitting
//! one [`Chunk`] per window. The last window may be shorter than
//! `chunk_size`; it is emitted as long as it holds at least one token.

use std::sync::Arc;

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::tokenizer::{Tokenizer, WordTokenizer};

/// Splits documents into overlapping, token-bounded chunks.
///
/// # Example
///
/// ```rust
/// use lore_rag::TokenChunker;
///
/// let chunker = TokenChunker::new(4, 1).unwrap();
/// let chunks = chunker.chunk("one two three four five six seven");
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].text, "four five six seven");
/// ```
#[derive(Clone)]
pub struct TokenChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

impl TokenChunker {
    /// Create a chunker using the default [`WordTokenizer`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] unless
    /// `chunk_size >= 1` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_tokenizer(chunk_size, chunk_overlap, Arc::new(WordTokenizer))
    }

    /// Create a chunker with a custom tokenizer.
    pub fn with_tokenizer(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, tokenizer })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `document` into chunks, in document order.
    ///
    /// A document with no tokens yields no chunks.
    pub fn chunk(&self, document: &str) -> Vec<Chunk> {
        let tokens = self.tokenizer.tokenize(document);
        windows(tokens.len(), self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Chunk {
                index,
                text: document[tokens[start].start..tokens[end - 1].end].to_string(),
                start_offset: start,
                end_offset: end,
            })
            .collect()
    }
}

/// Split `document` with the default tokenizer.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] for out-of-range parameters.
pub fn chunk(document: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TokenChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

pub(crate) fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfiguration(
            "chunk_size must be at least 1".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfiguration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Token windows `[start, end)` covering `token_count` tokens.
///
/// Stops at the first window that reaches the end of the stream, so no
/// window is ever fully contained in its predecessor.
fn windows(token_count: usize, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    let stride = chunk_size - chunk_overlap;
    let mut spans = Vec::new();
    let mut start = 0;

    while start < token_count {
        let end = (start + chunk_size).min(token_count);
        spans.push((start, end));
        if end == token_count {
            break;
        }
        start += stride;
    }

    spans
}
