//! Mapping between embedding records and Qdrant points.

use serde_json::{Map, Value, json};

use crate::{
    processing::Chunk,
    qdrant::types::{QdrantError, ScoredPoint},
    store::{EmbeddingRecord, ScoredChunk},
};

/// Build the point body (`id`, `vector`, `payload`) for one record.
pub(crate) fn record_to_point(record: &EmbeddingRecord) -> Value {
    let mut payload = Map::new();
    payload.insert("document_id".into(), Value::String(record.document_id.clone()));
    payload.insert("chunk_index".into(), Value::from(record.chunk.index));
    payload.insert("segment".into(), Value::from(record.chunk.segment));
    payload.insert("start".into(), Value::from(record.chunk.start));
    payload.insert("end".into(), Value::from(record.chunk.end));
    payload.insert("text".into(), Value::String(record.chunk.text.clone()));
    payload.insert(
        "chunk_hash".into(),
        Value::String(record.chunk.chunk_hash.clone()),
    );
    payload.insert(
        "ingested_at".into(),
        Value::String(record.ingested_at.clone()),
    );
    if let Some(source) = record.source.as_ref().filter(|value| !value.is_empty()) {
        payload.insert("source".into(), Value::String(source.clone()));
    }

    json!({
        "id": record.id,
        "vector": record.vector,
        "payload": Value::Object(payload),
    })
}

/// Filter matching every point of one document.
pub(crate) fn document_filter(document_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id }
            }
        ]
    })
}

/// Rebuild a search hit from a scored point's payload.
pub(crate) fn scored_chunk_from_point(point: ScoredPoint) -> Result<ScoredChunk, QdrantError> {
    let ScoredPoint { id, score, payload } = point;
    let payload = payload.ok_or_else(|| QdrantError::MalformedPayload {
        id: id.clone(),
        reason: "payload missing".into(),
    })?;

    let text_field = |key: &str| -> Result<String, QdrantError> {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| QdrantError::MalformedPayload {
                id: id.clone(),
                reason: format!("`{key}` is not a string"),
            })
    };
    let number_field = |key: &str| -> usize {
        payload
            .get(key)
            .and_then(Value::as_u64)
            .map(|value| value as usize)
            .unwrap_or_default()
    };

    let text = text_field("text")?;
    let chunk = Chunk {
        index: number_field("chunk_index"),
        segment: number_field("segment"),
        start: number_field("start"),
        end: payload
            .get("end")
            .and_then(Value::as_u64)
            .map(|value| value as usize)
            .unwrap_or(text.len()),
        chunk_hash: text_field("chunk_hash")?,
        text,
    };

    Ok(ScoredChunk {
        document_id: text_field("document_id")?,
        source: payload
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string),
        record_id: id,
        score,
        chunk,
    })
}
