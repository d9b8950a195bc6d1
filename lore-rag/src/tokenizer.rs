//! Tokenizers used to measure and split documents.
//!
//! A [`Tokenizer`] turns text into an ordered list of [`Token`] byte spans.
//! Chunk boundaries are expressed in tokens, and chunk text is recovered by
//! slicing the source document between token spans, so tokenization never
//! has to be reversible on its own.

use unicode_segmentation::UnicodeSegmentation;

/// A token as a half-open byte range into the tokenized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// The token's text within `source`.
    pub fn as_str<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Splits text into ordered tokens.
///
/// Implementations must be deterministic: the same input always yields the
/// same tokens. Token spans must be non-empty, non-overlapping, in ascending
/// order and fall on `char` boundaries.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Word/punctuation tokenizer based on Unicode word boundaries (UAX #29).
///
/// Every word and every punctuation mark is one token; whitespace between
/// them is not a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split_word_bound_indices()
            .filter(|(_, segment)| !segment.chars().all(char::is_whitespace))
            .map(|(start, segment)| Token { start, end: start + segment.len() })
            .collect()
    }
}
