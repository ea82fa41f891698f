// Embeddings module
// Chunk assembly and the Ollama-backed embedder

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::{LoreError, Result};

pub use chunking::{Chunk, assemble_chunk, assemble_chunks, estimate_token_count};
pub use ollama::{EmbeddingResult, OllamaClient};

/// Turns text into vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, preserving order
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LoreError::Embedding("Embedder returned no vector".to_string()))
    }
}
