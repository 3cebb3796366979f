//! Directory-backed store: one JSON record per line, searched by brute force.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};

use super::{EmbeddingRecord, ScoredChunk, StoreError, VectorStore, cosine_similarity};

const RECORDS_FILE: &str = "records.jsonl";

/// Records are held in memory and mirrored to `records.jsonl`. Writes happen under the write lock,
/// so concurrent inserts through one handle never interleave on disk.
pub struct LocalStore {
    root: PathBuf,
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl LocalStore {
    /// Open the store in `root`, creating the directory when it does not exist.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let path = root.join(RECORDS_FILE);
        let (records, torn_tail) = match fs::read_to_string(&path).await {
            Ok(contents) => parse_records(&path, &contents)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(root = %root.display(), records = records.len(), "Opened local store");

        let store = Self {
            root,
            records: RwLock::new(records),
        };
        if torn_tail {
            // Later appends must start on a fresh line.
            let records = store.records.read().await;
            store.rewrite(&records).await?;
        }
        Ok(store)
    }

    /// Directory holding the records file.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    async fn rewrite(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
        let path = self.records_path();
        let staging = self.root.join(format!("{RECORDS_FILE}.tmp"));
        let mut contents = String::new();
        for record in records {
            contents.push_str(&serde_json::to_string(record)?);
            contents.push('\n');
        }
        fs::write(&staging, contents)
            .await
            .map_err(|source| StoreError::Io {
                path: staging.clone(),
                source,
            })?;
        fs::rename(&staging, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

/// Parse every complete line. The second value reports a final line missing its newline, which
/// is what an interrupted append leaves behind; it is kept only when it still parses.
fn parse_records(
    path: &Path,
    contents: &str,
) -> Result<(Vec<EmbeddingRecord>, bool), StoreError> {
    let (complete, tail) = match contents.rfind('\n') {
        Some(end) => contents.split_at(end + 1),
        None => ("", contents),
    };

    let mut records = parse_lines(path, complete)?;
    if tail.trim().is_empty() {
        return Ok((records, !tail.is_empty()));
    }
    match serde_json::from_str(tail) {
        Ok(record) => records.push(record),
        Err(error) => tracing::warn!(
            path = %path.display(),
            %error,
            "Dropping unfinished record at the end of the store"
        ),
    }
    Ok((records, true))
}

fn parse_lines(path: &Path, contents: &str) -> Result<Vec<EmbeddingRecord>, StoreError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })
        })
        .collect()
}

#[async_trait]
impl VectorStore for LocalStore {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut lines = String::new();
        for record in &records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        let path = self.records_path();
        let mut guard = self.records.write().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        // One write per batch keeps a failure from splitting records mid-line.
        file.write_all(lines.as_bytes())
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        file.sync_data()
            .await
            .map_err(|source| StoreError::Io { path, source })?;

        let inserted = records.len();
        guard.extend(records);
        Ok(inserted)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let guard = self.records.read().await;
        let mut scored: Vec<(f32, &EmbeddingRecord)> = guard
            .iter()
            .map(|record| (cosine_similarity(vector, &record.vector), record))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, record)| ScoredChunk {
                record_id: record.id.clone(),
                document_id: record.document_id.clone(),
                source: record.source.clone(),
                score,
                chunk: record.chunk.clone(),
            })
            .collect())
    }

    async fn contains_document(&self, document_id: &str) -> Result<bool, StoreError> {
        let guard = self.records.read().await;
        Ok(guard.iter().any(|record| record.document_id == document_id))
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, StoreError> {
        let mut guard = self.records.write().await;
        let before = guard.len();
        let kept: Vec<EmbeddingRecord> = guard
            .iter()
            .filter(|record| record.document_id != document_id)
            .cloned()
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite(&kept).await?;
            *guard = kept;
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Chunk, compute_chunk_hash};

    fn record(id: &str, document_id: &str, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.into(),
            document_id: document_id.into(),
            source: Some("notes.txt".into()),
            chunk: Chunk {
                index: 0,
                segment: 0,
                start: 0,
                end: text.len(),
                text: text.into(),
                chunk_hash: compute_chunk_hash(text),
            },
            vector,
            ingested_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        store
            .insert(vec![
                record("a", "doc", "north", vec![1.0, 0.0]),
                record("b", "doc", "east", vec![0.0, 1.0]),
                record("c", "doc", "north-east", vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record_id, "a");
        assert_eq!(hits[1].record_id, "c");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).await.unwrap();
            store
                .insert(vec![record("a", "doc-1", "alpha", vec![1.0, 0.0])])
                .await
                .unwrap();
            store
                .insert(vec![record("b", "doc-2", "beta", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let reopened = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert!(reopened.contains_document("doc-2").await.unwrap());
        assert!(!reopened.contains_document("doc-3").await.unwrap());
    }

    #[tokio::test]
    async fn delete_document_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        store
            .insert(vec![
                record("a", "doc-1", "alpha", vec![1.0, 0.0]),
                record("b", "doc-1", "alpha two", vec![1.0, 0.2]),
                record("c", "doc-2", "beta", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document("doc-1").await.unwrap(), 2);
        assert_eq!(store.delete_document("doc-1").await.unwrap(), 0);

        let reopened = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.contains_document("doc-2").await.unwrap());
    }

    #[tokio::test]
    async fn unfinished_trailing_record_is_dropped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).await.unwrap();
            store
                .insert(vec![record("a", "doc-1", "alpha", vec![1.0, 0.0])])
                .await
                .unwrap();
        }
        let path = dir.path().join(RECORDS_FILE);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str(r#"{"id":"b","document_id":"doc-2","chu"#);
        std::fs::write(&path, contents).unwrap();

        let reopened = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        reopened
            .insert(vec![record("c", "doc-3", "gamma", vec![0.0, 1.0])])
            .await
            .unwrap();

        let again = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(again.count().await.unwrap(), 2);
        assert!(again.contains_document("doc-3").await.unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[tokio::test]
    async fn corrupt_line_is_reported_with_position() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECORDS_FILE), "\n{not json}\n").unwrap();
        let error = LocalStore::open(dir.path()).await.err().expect("corrupt");
        assert!(matches!(error, StoreError::Corrupt { line: 2, .. }));
    }
}
