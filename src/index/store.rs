//! Persisted index directory.
//!
//! Layout: `<index_dir>/chunks.db` (sqlite, one row per chunk with the
//! embedding as a little-endian f32 BLOB) plus `<index_dir>/manifest.json`
//! naming the embedding model that built the index. The manifest is written
//! last, so a half-written directory never loads. A manifest built under a
//! different embedding model is rejected at load: mixing embedding spaces
//! corrupts ranking silently.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{VectorIndex, VectorRecord};
use crate::core::errors::ApiError;
use crate::ingest::chunker::DocumentChunk;

const DB_FILE: &str = "chunks.db";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub records: usize,
    pub built_at: String,
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

async fn open_pool(db_path: &Path, create: bool) -> Result<SqlitePool, ApiError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(ApiError::internal)
}

/// Write a freshly built index to `index_dir`, replacing any prior index.
pub async fn save(
    index_dir: &Path,
    embedding_model: &str,
    records: &[VectorRecord],
) -> Result<(), ApiError> {
    if records.is_empty() {
        return Err(ApiError::Internal(
            "refusing to persist an empty index".to_string(),
        ));
    }
    let dimension = records[0].embedding.len();

    if index_dir.exists() {
        std::fs::remove_dir_all(index_dir).map_err(ApiError::internal)?;
    }
    std::fs::create_dir_all(index_dir).map_err(ApiError::internal)?;

    let pool = open_pool(&index_dir.join(DB_FILE), true).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chunks (
            chunk_index INTEGER NOT NULL,
            source_path TEXT NOT NULL,
            page_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (source_path, chunk_index)
        )",
    )
    .execute(&pool)
    .await
    .map_err(ApiError::internal)?;

    let mut tx = pool.begin().await.map_err(ApiError::internal)?;
    for record in records {
        sqlx::query(
            "INSERT INTO chunks (chunk_index, source_path, page_number, content, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(record.chunk.chunk_index as i64)
        .bind(&record.chunk.source_path)
        .bind(record.chunk.page_number as i64)
        .bind(&record.chunk.text)
        .bind(serialize_embedding(&record.embedding))
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;
    }
    tx.commit().await.map_err(ApiError::internal)?;
    pool.close().await;

    let manifest = IndexManifest {
        embedding_model: embedding_model.to_string(),
        dimension,
        records: records.len(),
        built_at: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string_pretty(&manifest).map_err(ApiError::internal)?;
    std::fs::write(index_dir.join(MANIFEST_FILE), json).map_err(ApiError::internal)?;

    Ok(())
}

/// Load the persisted index, if present and compatible.
///
/// Returns `Ok(None)` when no index exists or when it was built under a
/// different embedding model (logged; the caller proceeds in no-context
/// mode).
pub async fn load(
    index_dir: &Path,
    expected_model: &str,
) -> Result<Option<VectorIndex>, ApiError> {
    let manifest_path = index_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&manifest_path).map_err(ApiError::internal)?;
    let manifest: IndexManifest = serde_json::from_str(&raw).map_err(ApiError::internal)?;

    if manifest.embedding_model != expected_model {
        tracing::warn!(
            index_model = %manifest.embedding_model,
            configured_model = %expected_model,
            "index was built under a different embedding model; ignoring it"
        );
        return Ok(None);
    }

    let pool = open_pool(&index_dir.join(DB_FILE), false).await?;
    let rows = sqlx::query(
        "SELECT chunk_index, source_path, page_number, content, embedding
         FROM chunks
         ORDER BY source_path, chunk_index",
    )
    .fetch_all(&pool)
    .await
    .map_err(ApiError::internal)?;
    pool.close().await;

    let records: Vec<VectorRecord> = rows
        .iter()
        .map(|row| {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            VectorRecord {
                embedding: deserialize_embedding(&embedding_bytes),
                chunk: DocumentChunk {
                    text: row.get("content"),
                    source_path: row.get("source_path"),
                    page_number: row.get::<i64, _>("page_number") as usize,
                    chunk_index: row.get::<i64, _>("chunk_index") as usize,
                },
            }
        })
        .collect();

    let expected_dimension = manifest.dimension;
    let index = VectorIndex::from_records(manifest.embedding_model, records)?;
    if index.dimension() != expected_dimension {
        return Err(ApiError::Internal(format!(
            "index dimension {} does not match manifest dimension {}",
            index.dimension(),
            expected_dimension
        )));
    }

    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(embedding: Vec<f32>, text: &str, page: usize, idx: usize) -> VectorRecord {
        VectorRecord {
            embedding,
            chunk: DocumentChunk {
                text: text.to_string(),
                source_path: "policy.txt".to_string(),
                page_number: page,
                chunk_index: idx,
            },
        }
    }

    #[test]
    fn embedding_blob_round_trips() {
        let original = vec![0.25_f32, -1.5, 3.0, f32::MIN_POSITIVE];
        let bytes = serialize_embedding(&original);
        assert_eq!(bytes.len(), 16);
        assert_eq!(deserialize_embedding(&bytes), original);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("memory_index");

        let records = vec![
            record(vec![1.0, 0.0], "first chunk", 0, 0),
            record(vec![0.0, 1.0], "second chunk", 1, 1),
        ];
        save(&index_dir, "test-model", &records).await.unwrap();

        let loaded = load(&index_dir, "test-model").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.embedding_model(), "test-model");

        let results = loaded.search_embedding(&[0.0, 1.0], 1);
        assert_eq!(results[0].chunk.text, "second chunk");
        assert_eq!(results[0].chunk.page_number, 1);
    }

    #[tokio::test]
    async fn missing_index_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent"), "test-model").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn model_mismatch_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("memory_index");

        let records = vec![record(vec![1.0, 0.0], "chunk", 0, 0)];
        save(&index_dir, "model-a", &records).await.unwrap();

        let loaded = load(&index_dir, "model-b").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn resave_replaces_prior_index() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("memory_index");

        save(
            &index_dir,
            "test-model",
            &[
                record(vec![1.0], "old a", 0, 0),
                record(vec![0.5], "old b", 0, 1),
            ],
        )
        .await
        .unwrap();
        save(&index_dir, "test-model", &[record(vec![1.0], "new", 0, 0)])
            .await
            .unwrap();

        let loaded = load(&index_dir, "test-model").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn empty_records_are_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("memory_index");

        assert!(save(&index_dir, "test-model", &[]).await.is_err());
        assert!(!index_dir.join(MANIFEST_FILE).exists());
    }
}
