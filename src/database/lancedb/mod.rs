// LanceDB vector database module
// Handles vector storage and similarity search for embedded chunks


pub mod vector_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::database::{ChunkIndex, ScoredChunk};
use crate::embeddings::{Chunk, Embedder};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// The chunk this vector was computed from
    pub chunk: Chunk,
    /// The vector embedding (768 dimensions for nomic-embed-text)
    pub vector: Vec<f32>,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            chunk,
            vector,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// [`ChunkIndex`] backed by a LanceDB [`VectorStore`] and an [`Embedder`]
pub struct LanceIndex<E> {
    store: VectorStore,
    embedder: E,
    batch_size: usize,
}

impl<E: Embedder> LanceIndex<E> {
    #[inline]
    pub fn new(store: VectorStore, embedder: E, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl<E: Embedder> ChunkIndex for LanceIndex<E> {
    /// The previous table survives until every chunk has been embedded
    async fn replace_all(&mut self, chunks: &[Chunk]) -> Result<usize> {
        let records = VectorStore::embed_chunks(chunks, &self.embedder, self.batch_size).await?;
        self.store.reset().await?;
        self.store.write_records(&records, self.batch_size).await
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        folder_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let results = self
            .store
            .search(
                query,
                &self.embedder,
                limit,
                score_threshold,
                folder_filter,
            )
            .await?;

        Ok(results
            .into_iter()
            .map(|r| ScoredChunk {
                chunk: r.chunk,
                score: r.similarity_score,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        self.store.count().await
    }
}
