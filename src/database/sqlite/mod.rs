use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Build, BuildCounts};
use crate::database::sqlite::queries::BuildQueries;


pub mod models;
pub mod queries;

pub use models::BuildStatus;

pub type DbPool = Pool<Sqlite>;

/// SQLite build ledger
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("ledger.db")).await
    }

    // Build ledger operations
    pub async fn start_build(&self, vault_path: &Path) -> Result<Build> {
        BuildQueries::start(&self.pool, &vault_path.to_string_lossy()).await
    }

    pub async fn complete_build(&self, id: &str, counts: &BuildCounts) -> Result<Option<Build>> {
        BuildQueries::complete(&self.pool, id, counts).await
    }

    pub async fn fail_build(&self, id: &str, error_message: &str) -> Result<Option<Build>> {
        BuildQueries::fail(&self.pool, id, error_message).await
    }

    /// Close out builds left `running` by a process that died mid-build
    pub async fn abandon_running_builds(&self) -> Result<u64> {
        let abandoned =
            BuildQueries::fail_running(&self.pool, "Build interrupted before completion").await?;
        if abandoned > 0 {
            info!("Marked {} interrupted build(s) as failed", abandoned);
        }
        Ok(abandoned)
    }

    pub async fn latest_build(&self) -> Result<Option<Build>> {
        BuildQueries::latest(&self.pool).await
    }

    pub async fn latest_completed_build(&self) -> Result<Option<Build>> {
        BuildQueries::latest_completed(&self.pool).await
    }

    pub async fn recent_builds(&self, limit: i64) -> Result<Vec<Build>> {
        BuildQueries::list_recent(&self.pool, limit).await
    }
}
