#[cfg(test)]
mod tests;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{LoreError, Result};

/// Exclusive marker held while an index build runs.
///
/// The file is created with `create_new`, so a second build (or a query)
/// sees it and backs off. It is removed when the lock is dropped.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    #[inline]
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(busy(path));
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(
            file,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        debug!("Acquired build lock at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    /// `IndexBusy` while a build holds the lock
    #[inline]
    pub fn ensure_free(path: &Path) -> Result<()> {
        if Self::is_held(path) {
            return Err(busy(path));
        }
        Ok(())
    }

    /// Remove a lock left behind by a build that never finished.
    /// Returns whether a file was removed.
    #[inline]
    pub fn clear_stale(path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                warn!("Removed stale build lock at {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                "Failed to release build lock at {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn busy(path: &Path) -> LoreError {
    LoreError::IndexBusy(format!(
        "an index build is in progress (lock file {}); use `index --force` if no build is running",
        path.display()
    ))
}
