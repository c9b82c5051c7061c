//! SQLite-backed vector store implementation.
//!
//! In-process store using SQLite for chunk rows and brute-force cosine
//! similarity for search. Collections are tracked in their own table so a
//! search against a collection that was never created (or already dropped)
//! is distinguishable from a collection that is merely empty.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkRecord, ScoredChunk, VectorStore};
use crate::core::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(count > 0)
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

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_collection(&self, collection: &str) -> Result<(), ApiError> {
        sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?1)")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<(), ApiError> {
        if records.is_empty() {
            return Ok(());
        }
        if !self.collection_exists(collection).await? {
            return Err(ApiError::NotFound(format!(
                "Collection {} does not exist",
                collection
            )));
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for record in &records {
            let blob = Self::serialize_embedding(&record.embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO chunks (chunk_id, collection, url, title, content, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&record.chunk_id)
            .bind(collection)
            .bind(&record.url)
            .bind(&record.title)
            .bind(&record.text)
            .bind(record.chunk_index as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        if !self.collection_exists(collection).await? {
            return Err(ApiError::NotFound(format!(
                "Collection {} does not exist",
                collection
            )));
        }

        let rows = sqlx::query(
            "SELECT chunk_id, url, title, content, chunk_index, embedding
             FROM chunks
             WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored_emb);
                let chunk_index: i64 = row.get("chunk_index");

                Some(ScoredChunk {
                    chunk_id: row.get("chunk_id"),
                    url: row.get("url"),
                    title: row.get("title"),
                    text: row.get("content"),
                    chunk_index: chunk_index as usize,
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn delete_collection(&self, collection: &str) -> Result<usize, ApiError> {
        let removed = sqlx::query("DELETE FROM chunks WHERE collection = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(removed.rows_affected() as usize)
    }

    async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(names)
    }

    async fn count(&self, collection: &str) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteVectorStore {
        let tmp = std::env::temp_dir().join(format!(
            "sitechat-vec-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        SqliteVectorStore::new(tmp).await.unwrap()
    }

    fn make_record(id: &str, text: &str, url: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            url: url.to_string(),
            title: "Test Page".to_string(),
            text: text.to_string(),
            chunk_index: 0,
            embedding,
        }
    }

    #[tokio::test]
    async fn upsert_and_search() {
        let store = test_store().await;
        store.ensure_collection("run_a").await.unwrap();

        let record = make_record("c1", "Hello world", "https://a.test/", vec![1.0, 0.0, 0.0]);
        store.upsert_batch("run_a", vec![record]).await.unwrap();
        assert_eq!(store.count("run_a").await.unwrap(), 1);

        let results = store.search("run_a", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "c1");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn search_missing_collection_is_not_found() {
        let store = test_store().await;
        let err = store.search("run_missing", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = test_store().await;
        store.ensure_collection("run_a").await.unwrap();
        store.ensure_collection("run_b").await.unwrap();

        store
            .upsert_batch(
                "run_a",
                vec![make_record("a1", "alpha", "https://a.test/", vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        store
            .upsert_batch(
                "run_b",
                vec![make_record("b1", "beta", "https://b.test/", vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let results = store.search("run_a", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "a1");
    }

    #[tokio::test]
    async fn delete_collection_removes_chunks_and_name() {
        let store = test_store().await;
        store.ensure_collection("run_a").await.unwrap();
        store
            .upsert_batch(
                "run_a",
                vec![
                    make_record("c1", "one", "https://a.test/1", vec![1.0]),
                    make_record("c2", "two", "https://a.test/2", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let removed = store.delete_collection("run_a").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(store.search("run_a", &[1.0], 5).await.is_err());

        // Dropping again is a quiet no-op.
        assert_eq!(store.delete_collection("run_a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = test_store().await;
        store.ensure_collection("run_a").await.unwrap();
        store
            .upsert_batch(
                "run_a",
                vec![
                    make_record("far", "far", "https://a.test/far", vec![0.0, 1.0]),
                    make_record("near", "near", "https://a.test/near", vec![1.0, 0.1]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("run_a", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results[0].chunk_id, "near");
        assert!(results[0].score > results[1].score);
    }
}
