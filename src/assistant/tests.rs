use super::*;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Scores chunks by how many question words their content contains
#[derive(Default)]
struct WordOverlapIndex {
    chunks: Vec<Chunk>,
    fail_search: bool,
}

#[async_trait]
impl ChunkIndex for WordOverlapIndex {
    async fn replace_all(&mut self, chunks: &[Chunk]) -> Result<usize> {
        self.chunks = chunks.to_vec();
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        folder_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        if self.fail_search {
            return Err(LoreError::Database("table missing".to_string()));
        }

        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.trim_matches('?').to_lowercase())
            .collect();

        let mut hits: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter(|c| folder_filter.is_none_or(|f| c.folder == f))
            .map(|c| {
                let content = c.content.to_lowercase();
                let matched = words.iter().filter(|w| content.contains(w.as_str())).count();
                ScoredChunk {
                    chunk: c.clone(),
                    score: matched as f32 / words.len().max(1) as f32,
                }
            })
            .filter(|hit| hit.score >= score_threshold)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.chunks.len() as u64)
    }
}

#[derive(Default)]
struct RecordingGenerator {
    calls: AtomicUsize,
    last_context: Mutex<Vec<String>>,
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn answer(&self, question: &str, context: &[Chunk]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock().expect("lock") = context.iter().map(|c| c.id.clone()).collect();
        Ok(format!("answer to {question}"))
    }
}

struct FailingGenerator;

#[async_trait]
impl AnswerGenerator for FailingGenerator {
    async fn answer(&self, _question: &str, _context: &[Chunk]) -> Result<String> {
        Err(LoreError::Generation("model not loaded".to_string()))
    }
}

fn write_vault() -> TempDir {
    let vault = TempDir::new().expect("should create temp dir");
    let root = vault.path();

    std::fs::create_dir_all(root.join("Party")).expect("mkdir");
    std::fs::create_dir_all(root.join("World")).expect("mkdir");

    std::fs::write(
        root.join("Party/Averlyn.md"),
        "---\ntitle: Averlyn\ntags: [party]\n---\n## Oath\nAverlyn swore an oath to the dragon queen.\n",
    )
    .expect("write note");
    std::fs::write(
        root.join("World/Srendia.md"),
        "# Rulers\nQueen Ysolde rules Srendia.\n# Trade\nSrendia exports amber.\n",
    )
    .expect("write note");
    std::fs::write(root.join("World/empty.md"), "").expect("write note");

    vault
}

async fn built_assistant() -> (TempDir, Assistant<WordOverlapIndex, RecordingGenerator>) {
    let vault = write_vault();
    let mut assistant = Assistant::new(WordOverlapIndex::default(), RecordingGenerator::default());
    assistant
        .build_index(vault.path(), &["Party".to_string()])
        .await
        .expect("build");
    (vault, assistant)
}

#[tokio::test]
async fn build_index_reports_walk_and_chunks() {
    let vault = write_vault();
    let mut assistant = Assistant::new(WordOverlapIndex::default(), RecordingGenerator::default());

    let report = assistant
        .build_index(vault.path(), &["Party".to_string()])
        .await
        .expect("build");

    assert_eq!(report.vault_path, vault.path());
    assert_eq!(report.files_seen, 3);
    assert_eq!(report.files_skipped, 0);
    assert_eq!(report.sections, 3);
    assert_eq!(report.chunks_indexed, 3);
    assert_eq!(assistant.index().count().await.expect("count"), 3);

    let folders: Vec<&str> = assistant
        .index()
        .chunks
        .iter()
        .map(|c| c.folder.as_str())
        .collect();
    assert!(folders.contains(&"[HOMEBREW] Party"));
    assert!(folders.contains(&"[GENERAL] World"));
}

#[tokio::test]
async fn rebuild_replaces_previous_chunks() {
    let (vault, mut assistant) = built_assistant().await;

    std::fs::remove_file(vault.path().join("World/Srendia.md")).expect("remove note");
    let report = assistant
        .build_index(vault.path(), &[])
        .await
        .expect("rebuild");

    assert_eq!(report.chunks_indexed, 1);
    assert_eq!(assistant.index().chunks[0].folder, "[GENERAL] Party");
}

#[tokio::test]
async fn build_index_missing_vault_is_vault_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut assistant = Assistant::new(WordOverlapIndex::default(), RecordingGenerator::default());

    let result = assistant
        .build_index(&temp_dir.path().join("nope"), &[])
        .await;

    assert!(matches!(result, Err(LoreError::Vault(_))));
}

#[tokio::test]
async fn ask_answers_from_retrieved_chunks() {
    let (_vault, assistant) = built_assistant().await;

    let answer = assistant
        .ask("Who rules Srendia?", 2, 0.3, None)
        .await
        .expect("ask");

    assert_eq!(answer.answer_text, "answer to Who rules Srendia?");
    assert!(answer.is_grounded());
    assert_eq!(answer.source_count, answer.sources.len());
    assert!(answer.source_count <= 2);
    assert_eq!(answer.sources[0].chunk.content, "Queen Ysolde rules Srendia.");
    assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 1);

    let context = assistant.generator.last_context.lock().expect("lock").clone();
    let source_ids: Vec<String> = answer.sources.iter().map(|s| s.chunk.id.clone()).collect();
    assert_eq!(context, source_ids);
}

#[tokio::test]
async fn threshold_above_every_score_skips_generation() {
    let (_vault, assistant) = built_assistant().await;

    let answer = assistant
        .ask("Who rules Srendia?", 5, 1.0, None)
        .await
        .expect("ask");

    assert_eq!(answer.source_count, 0);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.answer_text, NO_GROUNDED_ANSWER);
    assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_size_caps_sources() {
    let (_vault, assistant) = built_assistant().await;

    let answer = assistant
        .ask("srendia dragon queen", 1, 0.0, None)
        .await
        .expect("ask");

    assert_eq!(answer.source_count, 1);
}

#[tokio::test]
async fn folder_filter_restricts_sources() {
    let (_vault, assistant) = built_assistant().await;

    let answer = assistant
        .ask("queen", 5, 0.5, Some("[HOMEBREW] Party"))
        .await
        .expect("ask");

    assert_eq!(answer.source_count, 1);
    assert_eq!(answer.sources[0].chunk.file_title, "Averlyn");

    let blank_filter = assistant
        .ask("queen", 5, 0.5, Some("  "))
        .await
        .expect("ask");
    assert_eq!(blank_filter.source_count, 2);
}

#[tokio::test]
async fn invalid_arguments_are_rejected() {
    let (_vault, assistant) = built_assistant().await;

    for (question, context_size, threshold) in [
        ("   ", 5, 0.3),
        ("Who rules?", 0, 0.3),
        ("Who rules?", 5, -0.1),
        ("Who rules?", 5, 1.5),
        ("Who rules?", 5, f32::NAN),
    ] {
        let result = assistant.ask(question, context_size, threshold, None).await;
        assert!(
            matches!(result, Err(LoreError::InvalidQuery(_))),
            "expected InvalidQuery for {question:?}/{context_size}/{threshold}"
        );
    }
    assert_eq!(assistant.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backend_failures_surface_as_errors() {
    let index = WordOverlapIndex {
        fail_search: true,
        ..WordOverlapIndex::default()
    };
    let assistant = Assistant::new(index, RecordingGenerator::default());
    let result = assistant.ask("Who rules?", 5, 0.3, None).await;
    assert!(matches!(result, Err(LoreError::Database(_))));

    let (vault, _) = built_assistant().await;
    let mut failing = Assistant::new(WordOverlapIndex::default(), FailingGenerator);
    failing
        .build_index(vault.path(), &[])
        .await
        .expect("build");
    let result = failing.ask("Who rules Srendia?", 5, 0.3, None).await;
    assert!(matches!(result, Err(LoreError::Generation(_))));
}

#[tokio::test]
async fn ask_refuses_while_build_lock_is_held() {
    let (vault, _) = built_assistant().await;
    let base = TempDir::new().expect("should create temp dir");
    let lock_path = base.path().join(".build.lock");

    let mut assistant = Assistant::new(WordOverlapIndex::default(), RecordingGenerator::default())
        .with_build_lock(&lock_path);
    assistant
        .build_index(vault.path(), &[])
        .await
        .expect("build");
    assert!(!lock_path.exists());

    let held = BuildLock::acquire(&lock_path).expect("lock");
    let result = assistant.ask("Who rules Srendia?", 5, 0.3, None).await;
    assert!(matches!(result, Err(LoreError::IndexBusy(_))));

    let rebuild = assistant.build_index(vault.path(), &[]).await;
    assert!(matches!(rebuild, Err(LoreError::IndexBusy(_))));

    drop(held);
    assert!(
        assistant
            .ask("Who rules Srendia?", 5, 0.3, None)
            .await
            .is_ok()
    );
}
