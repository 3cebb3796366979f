//! Document processing pipeline: chunking, embedding, retrieval, summarization, and translation.

pub mod chunking;
pub mod prompts;
mod service;
pub mod summarize;
pub mod translate;
pub mod types;

pub use chunking::{
    CHUNK_OVERLAP, CHUNK_SIZE, Chunk, ChunkedDocument, chunk_segments, compute_chunk_hash,
};
pub use service::{DocumentApi, DocumentService, RETRIEVAL_TOP_K, ServiceSettings, Workspace};
pub use summarize::SUMMARY_TOKEN_BUDGET;
pub use translate::{SUPPORTED_LANGUAGES, language_name};
pub use types::{
    Answer, AnswerError, ChunkingError, HealthSnapshot, ProcessedDocument, ProcessingError,
    ServiceInitError, SummarizeError, TranslateError, Translation,
};
