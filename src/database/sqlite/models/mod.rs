
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// One row of the build ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Build {
    pub id: String,
    pub vault_path: String,
    pub status: BuildStatus,
    pub files_seen: i64,
    pub files_skipped: i64,
    pub sections: i64,
    pub chunks: i64,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

impl Build {
    /// Wall-clock time the build took, if it has finished
    #[inline]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum BuildStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for BuildStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            BuildStatus::Running => write!(f, "Running"),
            BuildStatus::Completed => write!(f, "Completed"),
            BuildStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Counters recorded when a build completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildCounts {
    pub files_seen: i64,
    pub files_skipped: i64,
    pub sections: i64,
    pub chunks: i64,
}
