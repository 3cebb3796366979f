//! Qdrant REST integration backing the remote vector store.

pub mod client;
pub(crate) mod payload;
pub mod types;

pub use client::QdrantService;
pub use types::{QdrantError, ScoredPoint};
