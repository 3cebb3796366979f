#![deny(missing_docs)]

//! Core library for DocuSmart: document ingestion, retrieval-augmented answers, summaries,
//! translations, and PDF image extraction.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text generation client abstraction and adapters.
pub mod generation;
/// Format detection and text/image extraction.
pub mod loader;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Usage counters.
pub mod metrics;
/// Document processing pipeline.
pub mod processing;
/// Qdrant REST client.
pub mod qdrant;
/// Vector store backends.
pub mod store;
