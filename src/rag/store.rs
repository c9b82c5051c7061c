//! VectorStore trait — abstract interface for per-run chunk storage.
//!
//! Each pipeline run owns exactly one collection; chunks never cross
//! collection boundaries. The primary implementation is
//! `SqliteVectorStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// An indexed passage with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk identifier.
    pub chunk_id: String,
    /// Source page URL.
    pub url: String,
    /// Source page title.
    pub title: String,
    /// The passage text.
    pub text: String,
    /// Position of the chunk within its source page.
    pub chunk_index: usize,
    pub embedding: Vec<f32>,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub chunk_index: usize,
    /// Raw similarity score (higher = better).
    pub score: f32,
}

/// Abstract trait for collection-scoped vector storage.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self, collection: &str) -> Result<(), ApiError>;

    /// Upsert a batch of chunks into a collection.
    async fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<(), ApiError>;

    /// Ranked similarity search within one collection.
    ///
    /// A missing collection is `NotFound`, never an empty result set.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, ApiError>;

    /// Drop a collection and all its chunks; returns the chunk count
    /// removed. Deleting an absent collection is a no-op.
    async fn delete_collection(&self, collection: &str) -> Result<usize, ApiError>;

    /// Names of all known collections.
    async fn list_collections(&self) -> Result<Vec<String>, ApiError>;

    /// Chunk count within one collection.
    async fn count(&self, collection: &str) -> Result<usize, ApiError>;
}
