use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoreError>;

#[derive(Error, Debug)]
pub enum LoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Index is busy: {0}")]
    IndexBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for LoreError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl LoreError {
    /// Whether the error came from a backend (vector store, embedder, or
    /// generator) rather than from the caller's input.
    #[inline]
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Embedding(_) | Self::Generation(_)
        )
    }
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod vault;
