//! Qdrant-backed store.

use async_trait::async_trait;

use super::{EmbeddingRecord, ScoredChunk, StoreError, VectorStore};
use crate::qdrant::{
    QdrantService,
    payload::{document_filter, record_to_point, scored_chunk_from_point},
};

/// Store living in one Qdrant collection.
pub struct QdrantStore {
    service: QdrantService,
    collection: String,
}

impl QdrantStore {
    /// Connect to `url` and make sure `collection` and its payload indexes exist.
    pub async fn connect(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        vector_size: u64,
    ) -> Result<Self, StoreError> {
        let service = QdrantService::new(url, api_key)?;
        let store = Self::with_service(service, collection);
        store
            .service
            .create_collection_if_not_exists(&store.collection, vector_size)
            .await?;
        store
            .service
            .ensure_payload_indexes(&store.collection)
            .await?;
        Ok(store)
    }

    pub(crate) fn with_service(service: QdrantService, collection: &str) -> Self {
        Self {
            service,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn describe(&self) -> String {
        format!(
            "qdrant:{}/{}",
            self.service.base_url().trim_end_matches('/'),
            self.collection
        )
    }

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<usize, StoreError> {
        let points = records.iter().map(record_to_point).collect();
        Ok(self.service.upsert_points(&self.collection, points).await?)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let points = self
            .service
            .search_points(&self.collection, vector, None, limit)
            .await?;
        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            hits.push(scored_chunk_from_point(point)?);
        }
        Ok(hits)
    }

    async fn contains_document(&self, document_id: &str) -> Result<bool, StoreError> {
        let count = self
            .service
            .count_points(&self.collection, Some(document_filter(document_id)))
            .await?;
        Ok(count > 0)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        let filter = document_filter(document_id);
        let existing = self
            .service
            .count_points(&self.collection, Some(filter.clone()))
            .await?;
        if existing > 0 {
            self.service.delete_points(&self.collection, filter).await?;
        }
        Ok(existing)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.service.count_points(&self.collection, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qdrant::client::tests::service_for;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };
    use serde_json::json;

    #[tokio::test]
    async fn search_maps_payloads_into_chunks() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/query");
                then.status(200).json_body(json!({
                    "result": [
                        {
                            "id": "rec-9",
                            "score": 0.77,
                            "payload": {
                                "document_id": "doc-1",
                                "chunk_index": 2,
                                "segment": 1,
                                "start": 0,
                                "end": 5,
                                "text": "Paris",
                                "chunk_hash": "abc",
                                "source": "atlas.pdf"
                            }
                        }
                    ]
                }));
            })
            .await;

        let store = QdrantStore::with_service(service_for(&server), "docs");
        let hits = store.search(&[0.3, 0.4], 3).await.expect("hits");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id, "rec-9");
        assert_eq!(hits[0].chunk.text, "Paris");
        assert_eq!(hits[0].chunk.segment, 1);
        assert_eq!(hits[0].source.as_deref(), Some("atlas.pdf"));
    }

    #[tokio::test]
    async fn delete_skips_request_when_document_absent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/count");
                then.status(200).json_body(json!({ "result": { "count": 0 } }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/delete");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;

        let store = QdrantStore::with_service(service_for(&server), "docs");
        assert_eq!(store.delete_document("doc-1").await.expect("delete"), 0);
        assert!(!store.contains_document("doc-1").await.expect("contains"));
        delete.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn connect_creates_missing_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs")
                    .json_body(json!({ "vectors": { "size": 8, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/index")
                    .json_body(json!({ "field_name": "document_id", "field_schema": "keyword" }));
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;

        let store = QdrantStore::connect(&server.base_url(), None, "docs", 8)
            .await
            .expect("connect");
        create.assert_async().await;
        index.assert_hits_async(1).await;
        assert!(store.describe().ends_with("/docs"));
    }
}
