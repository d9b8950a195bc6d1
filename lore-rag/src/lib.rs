//! # lore-rag
//!
//! Retrieval-augmented entity extraction over plain-text documents.
//!
//! ## Overview
//!
//! A request runs in two stages with a typed intermediate:
//!
//! 1. **index**: the document is split into overlapping token windows
//!    ([`TokenChunker`]), every chunk is embedded through an
//!    [`EmbeddingProvider`], and the result is a [`NodeSet`].
//! 2. **query**: the query is embedded, the [`SimilarityIndex`] picks the
//!    top-K chunks by cosine similarity, and the [`Synthesizer`] asks a
//!    [`LanguageModel`] for a JSON list of [`ExtractedEntity`] records.
//!
//! The [`RagPipeline`] wires the stages together; the [`service`] module
//! exposes them as request/response calls whose answers are either an error
//! string or a payload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lore_rag::{MockEmbeddingProvider, MockLanguageModel, RagPipeline, SamplingParams};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> lore_rag::Result<()> {
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::new(64)))
//!     .language_model(Arc::new(MockLanguageModel::new(
//!         r#"[{"name": "Ahab", "description": "Captain", "personality": "Obsessed"}]"#,
//!     )))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let nodes = pipeline.index("Call me Ishmael. Ahab commands the Pequod.", 3000, 20, &cancel).await?;
//! let answer = pipeline
//!     .query("Who are the main characters?", &nodes, 2, SamplingParams::default(), &cancel)
//!     .await?;
//! assert_eq!(answer.entities()[0].name, "Ahab");
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`] and
//!   [`openai::OpenAIChatModel`] for any OpenAI-compatible endpoint

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod service;
pub mod similarity;
pub mod synthesis;
pub mod tokenizer;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{TokenChunker, chunk};
pub use config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_QUERY, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
    DEFAULT_TOP_P, MalformedOutputPolicy, RagConfig, RagConfigBuilder,
};
pub use document::{Chunk, EmbeddedNode, ExtractedEntity, NodeSet, RetrievalResult, ScoredNode};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use llm::{CompletionRequest, LanguageModel};
pub use mock::{MockEmbeddingProvider, MockLanguageModel};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retry::RetryPolicy;
pub use service::{
    ApiResponse, IndexPayload, IndexRequest, QueryPayload, QueryRequest, retrieve_and_query,
    split_and_embed,
};
pub use similarity::{SimilarityIndex, cosine_similarity, top_k};
pub use synthesis::{SamplingParams, Synthesis, Synthesizer};
pub use tokenizer::{Token, Tokenizer, WordTokenizer};
pub use tokio_util::sync::CancellationToken;
