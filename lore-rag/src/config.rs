//! Configuration types for the extraction pipeline.

use crate::chunking;
use crate::error::{RagError, Result};

/// Default maximum chunk size, in tokens.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;
/// Default overlap between consecutive chunks, in tokens.
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;
/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 2;
/// Default sampling temperature for synthesis.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
/// Default nucleus sampling value for synthesis.
pub const DEFAULT_TOP_P: f32 = 1.0;
/// The query run when the caller does not supply one.
pub const DEFAULT_QUERY: &str =
    "Extract only the top main characters with their Name, Description, and Personality";

/// Chunking, retrieval and sampling parameters for one pipeline run.
///
/// Use [`RagConfig::builder()`] to construct a validated configuration.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `chunk_size`    | 3000    |
/// | `chunk_overlap` | 20      |
/// | `top_k`         | 2       |
/// | `temperature`   | 0.1     |
/// | `top_p`         | 1.0     |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in tokens.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in tokens.
    pub chunk_overlap: usize,
    /// Number of chunks handed to the synthesizer.
    pub top_k: usize,
    /// Sampling temperature passed to the language model.
    pub temperature: f32,
    /// Nucleus sampling value passed to the language model.
    pub top_p: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is not in `0.0..=2.0`
    /// - `top_p` is not in `0.0..=1.0`
    pub fn validate(&self) -> Result<()> {
        chunking::validate(self.chunk_size, self.chunk_overlap)?;
        validate_sampling(self.top_k, self.temperature, self.top_p)
    }
}

pub(crate) fn validate_sampling(top_k: usize, temperature: f32, top_p: f32) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::InvalidConfiguration("top_k must be at least 1".to_string()));
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err(RagError::InvalidConfiguration(format!(
            "temperature ({temperature}) must be between 0 and 2"
        )));
    }
    if !(0.0..=1.0).contains(&top_p) {
        return Err(RagError::InvalidConfiguration(format!(
            "top_p ({top_p}) must be between 0 and 1"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the nucleus sampling value.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = top_p;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// What the query boundary does when the model does not return an entity list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedOutputPolicy {
    /// Answer with an empty entity list and hand back the raw model text.
    #[default]
    Degrade,
    /// Fail the request with a `MalformedModelOutput` error.
    Strict,
}
