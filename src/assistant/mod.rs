// Assistant façade
// Vault walk to indexed chunks, and question to grounded answer

#[cfg(test)]
mod tests;

pub mod lock;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::database::{ChunkIndex, ScoredChunk};
use crate::embeddings::{Chunk, assemble_chunks};
use crate::generation::{AnswerGenerator, NO_GROUNDED_ANSWER};
use crate::vault::VaultWalker;
use crate::{LoreError, Result};

pub use lock::BuildLock;

/// What one index build did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub vault_path: PathBuf,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub notes_parsed: usize,
    pub sections: usize,
    pub chunks_indexed: usize,
    pub elapsed: Duration,
}

/// A grounded answer and the chunks it was written from
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer_text: String,
    pub sources: Vec<ScoredChunk>,
    /// Always `sources.len()`
    pub source_count: usize,
}

impl Answer {
    fn new(answer_text: String, sources: Vec<ScoredChunk>) -> Self {
        let source_count = sources.len();
        Self {
            answer_text,
            sources,
            source_count,
        }
    }

    /// The answer given when no chunk qualified
    #[inline]
    pub fn ungrounded() -> Self {
        Self::new(NO_GROUNDED_ANSWER.to_string(), Vec::new())
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.source_count > 0
    }
}

pub struct Assistant<I, G> {
    index: I,
    generator: G,
    lock_path: Option<PathBuf>,
}

impl<I: ChunkIndex, G: AnswerGenerator> Assistant<I, G> {
    #[inline]
    pub fn new(index: I, generator: G) -> Self {
        Self {
            index,
            generator,
            lock_path: None,
        }
    }

    /// Serialize builds and queries through a lock file at `path`
    #[inline]
    pub fn with_build_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    #[inline]
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Walk the vault, assemble chunks and replace the whole index with them.
    #[inline]
    pub async fn build_index(
        &mut self,
        vault_path: &Path,
        homebrew_folders: &[String],
    ) -> Result<BuildReport> {
        let _lock = self
            .lock_path
            .as_deref()
            .map(BuildLock::acquire)
            .transpose()?;

        let started = Instant::now();
        info!("Building index for vault {}", vault_path.display());

        let walker = VaultWalker::new(vault_path, homebrew_folders.iter().cloned());
        let scan = tokio::task::spawn_blocking(move || walker.walk())
            .await
            .map_err(|e| LoreError::Vault(format!("Vault walk task failed: {}", e)))??;

        let chunks = assemble_chunks(&scan.sections);
        debug!("Assembled {} chunks from {} notes", chunks.len(), scan.notes_parsed);

        let chunks_indexed = self.index.replace_all(&chunks).await.inspect_err(|e| {
            error!("Index build failed: {}", e);
        })?;

        let report = BuildReport {
            vault_path: vault_path.to_path_buf(),
            files_seen: scan.files_seen,
            files_skipped: scan.files_skipped,
            notes_parsed: scan.notes_parsed,
            sections: scan.sections.len(),
            chunks_indexed,
            elapsed: started.elapsed(),
        };

        info!(
            "Indexed {} chunks from {} files ({} skipped) in {:.1?}",
            report.chunks_indexed, report.files_seen, report.files_skipped, report.elapsed
        );

        Ok(report)
    }

    /// Answer `question` from at most `context_size` chunks scoring at least
    /// `score_threshold`, optionally restricted to one folder label.
    ///
    /// When nothing qualifies the generator is not consulted and the answer
    /// is [`NO_GROUNDED_ANSWER`] with no sources.
    #[inline]
    pub async fn ask(
        &self,
        question: &str,
        context_size: usize,
        score_threshold: f32,
        folder_filter: Option<&str>,
    ) -> Result<Answer> {
        let question = validate_query(question, context_size, score_threshold)?;

        if let Some(lock_path) = &self.lock_path {
            BuildLock::ensure_free(lock_path)?;
        }

        let folder_filter = folder_filter.map(str::trim).filter(|f| !f.is_empty());

        let sources = self
            .index
            .search(question, context_size, score_threshold, folder_filter)
            .await?;

        if sources.is_empty() {
            info!("No chunks scored at or above {}", score_threshold);
            return Ok(Answer::ungrounded());
        }

        debug!("Answering from {} chunks", sources.len());

        let context: Vec<Chunk> = sources.iter().map(|s| s.chunk.clone()).collect();
        let answer_text = self.generator.answer(question, &context).await?;

        Ok(Answer::new(answer_text, sources))
    }
}

fn validate_query(question: &str, context_size: usize, score_threshold: f32) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(LoreError::InvalidQuery("question is empty".to_string()));
    }

    if context_size == 0 {
        return Err(LoreError::InvalidQuery(
            "context size must be at least 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&score_threshold) {
        return Err(LoreError::InvalidQuery(format!(
            "score threshold {} is outside [0, 1]",
            score_threshold
        )));
    }

    Ok(question)
}
