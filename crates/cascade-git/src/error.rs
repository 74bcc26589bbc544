//! Error types for cascade-git

use std::path::PathBuf;

/// Result type for cascade-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cascade-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("Branch '{name}' not found")]
    BranchNotFound { name: String },

    #[error("Branch '{name}' already exists")]
    BranchExists { name: String },

    #[error("Tag '{name}' already exists")]
    TagExists { name: String },

    #[error("Revision '{revision}' could not be resolved to a commit")]
    UnknownRevision { revision: String },

    #[error("HEAD does not point to a branch")]
    DetachedHead,

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Pull failed: {message}")]
    PullFailed { message: String },

    #[error("Merge conflicts detected: {message}")]
    MergeConflict { message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
