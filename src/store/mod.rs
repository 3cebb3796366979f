//! Vector store abstraction.
//!
//! Callers open a [`StoreHandle`] from a [`StoreLocation`] and pass it into every ingest and
//! retrieval call. Two backends exist: a JSON-lines directory searched by brute-force cosine
//! similarity, and a Qdrant collection.

mod local;
mod remote;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{Config, StoreBackend},
    processing::Chunk,
    qdrant::QdrantError,
};

pub use local::LocalStore;
pub use remote::QdrantStore;

/// Errors raised by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the store directory failed.
    #[error("Store I/O failed at {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A persisted record could not be decoded.
    #[error("Corrupt store record at {path}:{line}: {source}")]
    Corrupt {
        /// Records file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be encoded.
    #[error("Failed to encode store record: {0}")]
    Encode(#[from] serde_json::Error),
    /// Qdrant rejected a request.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// The configured location is incomplete.
    #[error("Store misconfigured: {0}")]
    Misconfigured(String),
}

/// One embedded chunk as persisted by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Random record identifier.
    pub id: String,
    /// Content hash of the source document.
    pub document_id: String,
    /// Original filename of the source document, when known.
    #[serde(default)]
    pub source: Option<String>,
    /// The embedded chunk.
    pub chunk: Chunk,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// RFC 3339 ingestion timestamp.
    pub ingested_at: String,
}

/// A search hit, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Identifier of the matching record.
    pub record_id: String,
    /// Document the chunk belongs to.
    pub document_id: String,
    /// Original filename of the source document, when known.
    pub source: Option<String>,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// The matching chunk.
    pub chunk: Chunk,
}

/// Operations every backend provides.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Human-readable location for logs and health output.
    fn describe(&self) -> String;

    /// Persist records and return how many were written.
    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<usize, StoreError>;

    /// Return up to `limit` records most similar to `vector`, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError>;

    /// Whether any record belongs to `document_id`.
    async fn contains_document(&self, document_id: &str) -> Result<bool, StoreError>;

    /// Remove every record of `document_id` and return how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Shared, explicitly passed store reference.
pub type StoreHandle = Arc<dyn VectorStore>;

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Local directory holding `records.jsonl`.
    Directory(PathBuf),
    /// Qdrant collection.
    Qdrant {
        /// Base URL of the Qdrant instance.
        url: String,
        /// Optional API key.
        api_key: Option<String>,
        /// Collection name.
        collection: String,
        /// Vector size used when the collection has to be created.
        vector_size: u64,
    },
}

impl StoreLocation {
    /// Resolve the location selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        match config.store_backend {
            StoreBackend::Local => Ok(Self::Directory(config.store_dir.clone())),
            StoreBackend::Qdrant => {
                let url = config.qdrant_url.clone().ok_or_else(|| {
                    StoreError::Misconfigured("QDRANT_URL is required for the qdrant backend".into())
                })?;
                Ok(Self::Qdrant {
                    url,
                    api_key: config.qdrant_api_key.clone(),
                    collection: config.qdrant_collection_name.clone(),
                    vector_size: config.embedding_dimension as u64,
                })
            }
        }
    }
}

/// Open (creating if needed) the store at `location`.
pub async fn open_store(location: &StoreLocation) -> Result<StoreHandle, StoreError> {
    let store: StoreHandle = match location {
        StoreLocation::Directory(path) => Arc::new(LocalStore::open(path).await?),
        StoreLocation::Qdrant {
            url,
            api_key,
            collection,
            vector_size,
        } => Arc::new(QdrantStore::connect(url, api_key.clone(), collection, *vector_size).await?),
    };
    tracing::info!(store = %store.describe(), "Vector store ready");
    Ok(store)
}

/// Cosine similarity; zero when either vector has no magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn location_follows_backend() {
        let local = StoreLocation::from_config(&Config::default()).unwrap();
        assert_eq!(local, StoreLocation::Directory(PathBuf::from("./vector_db")));

        let missing_url = Config {
            store_backend: StoreBackend::Qdrant,
            ..Config::default()
        };
        assert!(matches!(
            StoreLocation::from_config(&missing_url),
            Err(StoreError::Misconfigured(_))
        ));

        let qdrant = Config {
            store_backend: StoreBackend::Qdrant,
            qdrant_url: Some("http://localhost:6333".into()),
            embedding_dimension: 384,
            ..Config::default()
        };
        assert!(matches!(
            StoreLocation::from_config(&qdrant).unwrap(),
            StoreLocation::Qdrant { vector_size: 384, ref collection, .. } if collection == "docusmart"
        ));
    }
}
