//! Core data types and error definitions for the processing pipeline.

use anyhow::Error as TokenizerError;
use serde::Serialize;
use thiserror::Error;

use crate::{
    embedding::EmbeddingClientError,
    generation::GenerationClientError,
    loader::{DocumentFormat, LoaderError},
    store::{ScoredChunk, StoreError},
};

use super::Chunk;

/// Errors produced while splitting text.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// A caller asked for an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load an encoding for.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted while ingesting a document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The document could not be loaded.
    #[error(transparent)]
    Loader(#[from] LoaderError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Provider returned vectors of the wrong size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
    /// Persisting the records failed.
    #[error("Vector store failed: {0}")]
    Store(#[from] StoreError),
    /// The blocking extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Errors emitted while retrieving context or answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Embedding provider failed to return a vector for the question.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the question")]
    EmptyEmbedding,
    /// Provider returned a vector of the wrong size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension returned by the provider.
        actual: usize,
    },
    /// Similarity search failed.
    #[error("Vector store failed: {0}")]
    Store(#[from] StoreError),
    /// The generation call failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Errors emitted while summarizing text.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Text could not be partitioned.
    #[error("Failed to partition text: {0}")]
    Chunking(#[from] ChunkingError),
    /// A map, collapse, or reduce call failed.
    #[error("Failed to generate summary: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Errors emitted while translating text.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// No target language was given.
    #[error("target language must not be empty")]
    EmptyLanguage,
    /// The strict policy rejected the code.
    #[error("unsupported target language '{0}'")]
    UnsupportedLanguage(String),
    /// The generation call failed.
    #[error("Failed to translate text: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    /// Content hash identifying the document.
    pub document_id: String,
    /// Detected format.
    pub format: DocumentFormat,
    /// Filename supplied by the caller.
    pub filename: Option<String>,
    /// Segment texts joined with newlines; the input to summarization.
    pub raw_text: String,
    /// Number of extracted segments.
    pub segment_count: usize,
    /// Chunks produced for the document.
    pub chunks: Vec<Chunk>,
    /// Records written to the store.
    pub inserted: usize,
    /// Chunks not written because the skip policy found the document already stored.
    pub skipped_duplicates: usize,
    /// Records removed by the replace policy before inserting.
    pub replaced: usize,
}

/// Answer produced by the question pipeline.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Trimmed model output.
    pub answer: String,
    /// Chunks placed in the prompt, best first.
    pub sources: Vec<ScoredChunk>,
}

/// Translation produced by the translate pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    /// Trimmed model output.
    pub translation: String,
    /// Normalized target language code.
    pub target_lang: String,
}

/// Reachability snapshot for the opened store.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Store description, such as `local:./vector_db`.
    pub store: String,
    /// Whether the store answered a count request.
    pub reachable: bool,
    /// Stored record count when reachable.
    pub records: Option<usize>,
    /// Diagnostic captured when the store is unreachable.
    pub error: Option<String>,
}

/// Errors raised while building a service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// The embedding provider could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The generation provider could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationClientError),
}
