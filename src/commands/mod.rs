#[cfg(test)]
mod tests;

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::assistant::{Answer, Assistant, BuildLock, BuildReport};
use crate::config::Config;
use crate::database::ScoredChunk;
use crate::database::lancedb::{LanceIndex, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{Build, BuildCounts, BuildStatus};
use crate::embeddings::OllamaClient;
use crate::generation::OllamaGenerator;
use crate::{LoreError, Result};

const PREVIEW_CHARS: usize = 200;

/// Arguments of the `index` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub vault: Option<PathBuf>,
    pub homebrew: Vec<String>,
    pub force: bool,
}

/// Arguments of the `ask` command; unset values fall back to `[retrieval]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AskOptions {
    pub context_size: Option<usize>,
    pub score_threshold: Option<f32>,
    pub folder: Option<String>,
}

type OllamaAssistant = Assistant<LanceIndex<OllamaClient>, OllamaGenerator>;

async fn open_assistant(config: &Config) -> Result<OllamaAssistant> {
    let embedder = OllamaClient::new(&config.ollama)?;
    let generator = OllamaGenerator::new(&config.ollama, &config.generation)?;
    let store = VectorStore::open(config).await?;
    let index = LanceIndex::new(store, embedder, config.retrieval.index_batch_size);

    Ok(Assistant::new(index, generator).with_build_lock(config.build_lock_path()))
}

/// Vault root from the command line, else from the config file
pub(crate) fn resolve_vault(config: &Config, options: &IndexOptions) -> Result<PathBuf> {
    options
        .vault
        .clone()
        .or_else(|| config.vault.path.clone())
        .ok_or_else(|| {
            LoreError::Config(
                "no vault configured; pass --vault or run `lorekeeper config`".to_string(),
            )
        })
}

/// Homebrew folders from the command line, else from the config file
pub(crate) fn resolve_homebrew(config: &Config, options: &IndexOptions) -> Vec<String> {
    if options.homebrew.is_empty() {
        config.vault.homebrew_folders.clone()
    } else {
        options.homebrew.clone()
    }
}

/// Build the index for the configured vault, recording the build in the ledger
#[inline]
pub async fn index_vault(config: &Config, options: IndexOptions) -> Result<BuildReport> {
    let vault_path = resolve_vault(config, &options)?;
    let homebrew = resolve_homebrew(config, &options);
    let lock_path = config.build_lock_path();

    let database = Database::initialize_from_config_dir(config.get_base_dir()).await?;

    if options.force {
        BuildLock::clear_stale(&lock_path)?;
        database.abandon_running_builds().await?;
    }
    BuildLock::ensure_free(&lock_path)?;

    let embedder = OllamaClient::new(&config.ollama)?;
    let probe = embedder.clone();
    tokio::task::spawn_blocking(move || probe.health_check())
        .await
        .map_err(|e| LoreError::Embedding(format!("Health check task failed: {}", e)))?
        .map_err(|e| LoreError::Embedding(format!("{:#}", e)))?;

    let mut assistant = open_assistant(config).await?;

    println!("Indexing vault: {}", vault_path.display());
    if !homebrew.is_empty() {
        println!("Homebrew folders: {}", homebrew.join(", "));
    }

    let build = database.start_build(&vault_path).await?;
    info!("Started build {}", build.id);

    match assistant.build_index(&vault_path, &homebrew).await {
        Ok(report) => {
            database
                .complete_build(&build.id, &build_counts(&report))
                .await?;

            println!("✓ Index build completed");
            println!("  Files found: {}", report.files_seen);
            println!("  Files skipped: {}", report.files_skipped);
            println!("  Notes parsed: {}", report.notes_parsed);
            println!("  Sections: {}", report.sections);
            println!("  Chunks indexed: {}", report.chunks_indexed);
            println!("  Duration: {:.1?}", report.elapsed);

            Ok(report)
        }
        Err(e) => {
            error!("Build {} failed: {}", build.id, e);
            if let Err(ledger_err) = database.fail_build(&build.id, &e.to_string()).await {
                warn!("Failed to record build failure: {:#}", ledger_err);
            }
            Err(e)
        }
    }
}

pub(crate) fn build_counts(report: &BuildReport) -> BuildCounts {
    let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);

    BuildCounts {
        files_seen: count(report.files_seen),
        files_skipped: count(report.files_skipped),
        sections: count(report.sections),
        chunks: count(report.chunks_indexed),
    }
}

/// Answer a question from the index and print it with its sources
#[inline]
pub async fn ask_question(config: &Config, question: &str, options: AskOptions) -> Result<Answer> {
    let context_size = options
        .context_size
        .unwrap_or(config.retrieval.context_size);
    let score_threshold = options
        .score_threshold
        .unwrap_or(config.retrieval.score_threshold);

    let assistant = open_assistant(config).await?;
    let answer = assistant
        .ask(
            question,
            context_size,
            score_threshold,
            options.folder.as_deref(),
        )
        .await?;

    println!("{}", answer.answer_text);
    println!();
    println!("Sources ({}):", answer.source_count);
    for (i, source) in answer.sources.iter().enumerate() {
        println!("{}", format_source(i + 1, source));
    }

    Ok(answer)
}

/// One numbered source entry: file, section, origin, folder and a preview
pub(crate) fn format_source(number: usize, source: &ScoredChunk) -> String {
    let chunk = &source.chunk;
    let section = if chunk.is_section {
        chunk.section_title.as_str()
    } else {
        "(whole note)"
    };

    format!(
        "{number}. {file} › {section} [{kind}] (score {score:.2})\n   Folder: {folder}\n   {preview}",
        file = chunk.file_title,
        kind = chunk.content_type,
        score = source.score,
        folder = chunk.folder,
        preview = chunk.preview(PREVIEW_CHARS).replace('\n', " "),
    )
}

/// Show the latest builds and the live state of the index
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Lorekeeper Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Vault:");
    match &config.vault.path {
        Some(path) => println!("   Path: {}", path.display()),
        None => println!("   Path: not configured"),
    }
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let probe = client.clone();
            match tokio::task::spawn_blocking(move || probe.health_check()).await {
                Ok(Ok(())) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Embedding model: {}", client.model());
                    println!("   💬 Answer model: {}", config.generation.model);
                }
                Ok(Err(e)) => println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e),
                Err(e) => println!("   ❌ Ollama: Health check failed - {}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Failed to connect - {:#}", e),
    }
    println!();

    println!("🔍 Vector Database Status:");
    match VectorStore::open(config).await {
        Ok(store) => match store.count().await {
            Ok(count) => {
                println!("   ✅ LanceDB: Connected");
                println!("   📦 Chunks: {}", count);
                println!("   🔢 Dimensions: {}", store.vector_dimension());
            }
            Err(e) => println!("   ⚠️  LanceDB: Connected but unreadable - {}", e),
        },
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    if BuildLock::is_held(&config.build_lock_path()) {
        println!("   🔒 A build is in progress (queries are refused until it ends)");
    }
    println!();

    println!("🗄️  Build History:");
    let database = match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(db) => db,
        Err(e) => {
            println!("   ❌ SQLite: Failed to connect - {:#}", e);
            return Ok(());
        }
    };

    let builds = database.recent_builds(5).await?;
    if builds.is_empty() {
        println!("   📭 No builds yet. Run `lorekeeper index` to build the index.");
        return Ok(());
    }

    for build in &builds {
        println!(
            "   {} {} ({})",
            build.started_at.format("%Y-%m-%d %H:%M:%S"),
            build.status,
            build.vault_path
        );
        println!(
            "      files {} (skipped {}), sections {}, chunks {}",
            build.files_seen, build.files_skipped, build.sections, build.chunks
        );
        if let Some(duration) = build.duration() {
            println!("      took {}s", duration.num_seconds());
        }
        if let Some(error) = &build.error_message {
            println!("      ⚠️  {}", error);
        }
    }

    let latest = database.latest_build().await?;
    let last_good = database.latest_completed_build().await?;
    println!();
    for line in build_health(latest.as_ref(), last_good.as_ref()) {
        println!("   {}", line);
    }

    Ok(())
}

/// What the index currently holds, judged from the newest build and the
/// newest completed one
pub(crate) fn build_health(latest: Option<&Build>, last_good: Option<&Build>) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(latest) = latest {
        match latest.status {
            BuildStatus::Failed => lines.push(
                "⚠️  Latest build failed; the index still holds the last good build".to_string(),
            ),
            BuildStatus::Running => {
                lines.push("⏳ Latest build has not finished".to_string());
            }
            BuildStatus::Completed => {}
        }
    }

    match last_good {
        Some(build) => lines.push(format!(
            "✅ Last good build: {} ({} chunks from {})",
            build
                .finished_at
                .unwrap_or(build.started_at)
                .format("%Y-%m-%d %H:%M:%S"),
            build.chunks,
            build.vault_path
        )),
        None => lines.push("📭 No completed build; questions will find no notes".to_string()),
    }

    lines
}
