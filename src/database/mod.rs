// Database module
// SQLite for the build ledger, LanceDB for chunk vectors

pub mod lancedb;
pub mod sqlite;

use async_trait::async_trait;

use crate::Result;
use crate::embeddings::Chunk;

pub use sqlite::*;

/// A retrieved chunk and its similarity to the query, in `[0, 1]` for
/// normalized embeddings (higher is closer)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Where chunks are stored and retrieved from
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Replace the whole index with `chunks`, returning how many were stored
    async fn replace_all(&mut self, chunks: &[Chunk]) -> Result<usize>;

    /// Up to `limit` chunks scoring at least `score_threshold`, best first.
    /// `folder_filter` restricts hits to one exact folder label.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        folder_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<u64>;
}
