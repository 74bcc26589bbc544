//! Error types for cascade-core

use std::path::PathBuf;

/// Result type for cascade-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cascade-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A branch or tag name outside the release grammar
    #[error("Invalid reference name: {name}")]
    InvalidRefName { name: String },

    /// Parameter upsert rejected
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Release not present in the reference tree
    #[error("Unknown release: r{version}")]
    UnknownRelease { version: u32 },

    /// Environment not present in the reference tree
    #[error("Unknown environment: {branch}")]
    UnknownEnvironment { branch: String },

    /// A release, patch or candidate number has no successor
    #[error("No number left after {name}")]
    VersionOverflow { name: String },

    /// Operation needs at least one release
    #[error("No release exists yet")]
    NoRelease,

    /// Invalid configuration value
    #[error("Configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Artifact could not be resolved
    #[error("Artifact {artifact}: {message}")]
    Artifact { artifact: String, message: String },

    /// Another process holds the repository lock
    #[error("Failed to lock repository at {path}: {message}")]
    LockFailed { path: PathBuf, message: String },

    /// A previous holder of the in-process lock panicked
    #[error("Repository lock poisoned")]
    LockPoisoned,

    /// Encrypting or decrypting a sensitive value failed
    #[error("Cipher error: {message}")]
    Cipher { message: String },

    /// Stored record is not in the expected shape
    #[error("Cannot decode {path}: {message}")]
    Codec { path: String, message: String },

    // Transparent wrappers for underlying crate errors
    /// Git error from cascade-git
    #[error(transparent)]
    Git(#[from] cascade_git::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
