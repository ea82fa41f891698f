use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lorekeeper::Result;
use lorekeeper::commands::{AskOptions, IndexOptions, ask_question, index_vault, show_status};
use lorekeeper::config::{Config, resolve_base_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "lorekeeper")]
#[command(about = "Ask questions about your Obsidian vault, answered only from your own notes")]
#[command(version)]
struct Cli {
    /// Directory holding config, ledger and vectors (default: $LOREKEEPER_HOME or ~/.lorekeeper)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the vault, Ollama connection and models
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the index from the vault, replacing any previous index
    Index {
        /// Vault directory (overrides the configured one)
        #[arg(long)]
        vault: Option<PathBuf>,
        /// Top-level folder holding homebrew content; repeat for several
        #[arg(long = "homebrew", value_name = "NAME")]
        homebrew: Vec<String>,
        /// Clear a stale build lock left by an interrupted build
        #[arg(long)]
        force: bool,
    },
    /// Ask a question about the vault
    Ask {
        /// The question to answer
        question: String,
        /// Maximum number of chunks handed to the model
        #[arg(long)]
        context_size: Option<usize>,
        /// Minimum similarity (0.0 to 1.0) a chunk needs to be used
        #[arg(long)]
        score_threshold: Option<f32>,
        /// Only use chunks from this folder label, e.g. "[HOMEBREW] 1-Party"
        #[arg(long)]
        folder: Option<String>,
    },
    /// Show the index, Ollama and build history
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Index {
            vault,
            homebrew,
            force,
        } => {
            let config = Config::load(&base_dir)?;
            index_vault(
                &config,
                IndexOptions {
                    vault,
                    homebrew,
                    force,
                },
            )
            .await?;
        }
        Commands::Ask {
            question,
            context_size,
            score_threshold,
            folder,
        } => {
            let config = Config::load(&base_dir)?;
            ask_question(
                &config,
                &question,
                AskOptions {
                    context_size,
                    score_threshold,
                    folder,
                },
            )
            .await?;
        }
        Commands::Status => {
            let config = Config::load(&base_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
