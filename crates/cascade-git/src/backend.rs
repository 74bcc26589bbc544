//! Backend trait for the version-control operations the release cascade consumes

use crate::Result;
use crate::commits::{CommitInfo, RefInfo};

/// Identity used for commits created by the automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Primitive version-control operations.
///
/// The backend owns a single working tree, so only one branch can be checked
/// out at a time. Callers serialize every mutating operation on one handle.
/// Read operations that take an explicit commit never depend on the checkout.
pub trait VcsBackend: Send {
    /// Resolve a branch, tag or commit id to the commit it points at.
    ///
    /// Returns `None` when the revision does not exist.
    fn resolve(&self, revision: &str) -> Result<Option<CommitInfo>>;

    /// List local branches with the commit at their tip.
    fn list_branches(&self) -> Result<Vec<RefInfo>>;

    /// List tags with the commit they point at.
    fn list_tags(&self) -> Result<Vec<RefInfo>>;

    /// Check whether a local branch exists.
    fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Check whether a tag exists.
    fn tag_exists(&self, name: &str) -> Result<bool>;

    /// Name of the checked out branch.
    fn current_branch(&self) -> Result<String>;

    /// Check out a local branch, replacing the working tree.
    fn checkout(&mut self, branch: &str) -> Result<()>;

    /// Create a branch at `start` (a branch, tag or commit id) without checking it out.
    fn create_branch(&mut self, name: &str, start: &str) -> Result<CommitInfo>;

    /// Create a tag pointing at `commit`.
    fn create_tag(&mut self, name: &str, commit: &str) -> Result<CommitInfo>;

    /// Write a file into the working tree (path relative to the root, `/` separated).
    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()>;

    /// Stage every change in the working tree.
    fn add_all(&mut self) -> Result<()>;

    /// Commit the staged tree on top of the checked out branch.
    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitInfo>;

    /// Read a file as it existed at `commit`. Returns `None` when absent.
    fn read_blob_at_commit(&self, path: &str, commit: &str) -> Result<Option<Vec<u8>>>;

    /// List every file path in the tree of `commit`.
    fn list_files_at_commit(&self, commit: &str) -> Result<Vec<String>>;

    /// Fetch from `remote` and fast-forward the checked out branch.
    ///
    /// Fails with [`crate::Error::MergeConflict`] when a fast-forward is not possible.
    fn pull(&mut self, remote: &str, include_tags: bool) -> Result<()>;

    /// Push all local branches (and tags when requested) to `remote`.
    fn push(&mut self, remote: &str, include_tags: bool) -> Result<()>;

    /// Commits reachable from `include` but not from `exclude`, newest first.
    fn log_between(&self, include: &str, exclude: Option<&str>) -> Result<Vec<CommitInfo>>;
}
