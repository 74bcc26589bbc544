//! Version-control abstraction for Release Cascade
//!
//! Exposes the small set of primitive operations the release automation needs
//! (ref listing, branch/tag creation, commits, historical blob reads, pull and
//! push) behind the [`VcsBackend`] trait, with a git2-backed implementation and
//! an in-memory one.

pub mod backend;
pub mod commits;
pub mod error;
pub mod local;
pub mod memory;
mod transport;

pub use backend::{Signature, VcsBackend};
pub use commits::{CommitInfo, RefInfo, commit_date};
pub use error::{Error, Result};
pub use local::LocalRepository;
pub use memory::{MemoryBackend, RemoteCall};
