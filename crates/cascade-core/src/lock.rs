//! Cross-process exclusion for ref-mutating operations

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// File name of the lock inside the git directory.
pub const LOCK_FILE: &str = "cascade.lock";

/// Exclusive advisory lock on a repository, released on drop.
#[derive(Debug)]
pub struct RepositoryLock {
    path: PathBuf,
    file: File,
}

impl RepositoryLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`Error::LockFailed`] while another process holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|e| Error::LockFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(?path, "Acquired repository lock");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to release repository lock");
        }
    }
}
