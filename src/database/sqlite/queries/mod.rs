
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const BUILD_COLUMNS: &str = "id, vault_path, status, files_seen, files_skipped, sections, \
                             chunks, error_message, started_at, finished_at";

pub struct BuildQueries;

impl BuildQueries {
    /// Record a new running build
    #[inline]
    pub async fn start(pool: &SqlitePool, vault_path: &str) -> Result<Build> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO builds (id, vault_path, status, started_at) VALUES (?, ?, 'running', ?)",
        )
        .bind(&id)
        .bind(vault_path)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to record build start")?;

        debug!("Started build {} for {}", id, vault_path);

        Self::get_by_id(pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created build"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Build>> {
        let query = format!("SELECT {BUILD_COLUMNS} FROM builds WHERE id = ?");
        sqlx::query_as::<_, Build>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get build by id")
    }

    #[inline]
    pub async fn complete(
        pool: &SqlitePool,
        id: &str,
        counts: &BuildCounts,
    ) -> Result<Option<Build>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE builds
            SET status = 'completed',
                files_seen = ?,
                files_skipped = ?,
                sections = ?,
                chunks = ?,
                error_message = NULL,
                finished_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(counts.files_seen)
        .bind(counts.files_skipped)
        .bind(counts.sections)
        .bind(counts.chunks)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark build completed")?;

        if result.rows_affected() == 0 {
            warn!("Build {} was not running; completion not recorded", id);
            return Ok(None);
        }

        Self::get_by_id(pool, id).await
    }

    #[inline]
    pub async fn fail(pool: &SqlitePool, id: &str, error_message: &str) -> Result<Option<Build>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE builds SET status = 'failed', error_message = ?, finished_at = ? \
             WHERE id = ? AND status = 'running'",
        )
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark build failed")?;

        if result.rows_affected() == 0 {
            warn!("Build {} was not running; failure not recorded", id);
            return Ok(None);
        }

        Self::get_by_id(pool, id).await
    }

    /// Mark every build still `running` as failed, returning how many changed
    #[inline]
    pub async fn fail_running(pool: &SqlitePool, error_message: &str) -> Result<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE builds SET status = 'failed', error_message = ?, finished_at = ? \
             WHERE status = 'running'",
        )
        .bind(error_message)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to fail running builds")?;

        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<Build>> {
        let query = format!(
            "SELECT {BUILD_COLUMNS} FROM builds ORDER BY started_at DESC, rowid DESC LIMIT 1"
        );
        sqlx::query_as::<_, Build>(&query)
            .fetch_optional(pool)
            .await
            .context("Failed to get latest build")
    }

    #[inline]
    pub async fn latest_completed(pool: &SqlitePool) -> Result<Option<Build>> {
        let query = format!(
            "SELECT {BUILD_COLUMNS} FROM builds WHERE status = 'completed' \
             ORDER BY started_at DESC, rowid DESC LIMIT 1"
        );
        sqlx::query_as::<_, Build>(&query)
            .fetch_optional(pool)
            .await
            .context("Failed to get latest completed build")
    }

    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Build>> {
        let query = format!(
            "SELECT {BUILD_COLUMNS} FROM builds ORDER BY started_at DESC, rowid DESC LIMIT ?"
        );
        sqlx::query_as::<_, Build>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("Failed to list builds")
    }
}
