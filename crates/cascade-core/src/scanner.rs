//! Builds the [`ReferenceTree`] from the backend's branches and tags

use cascade_git::{RefInfo, VcsBackend};

use crate::Result;
use crate::refs::{RefName, RefTarget, ReferenceTree};

/// Caches the tree of one repository between scans.
#[derive(Debug, Default)]
pub struct RepositoryScanner {
    tree: Option<ReferenceTree>,
}

impl RepositoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached tree, scanning first if nothing is cached yet.
    pub fn tree(&mut self, backend: &dyn VcsBackend) -> Result<&ReferenceTree> {
        if self.tree.is_none() {
            self.tree = Some(Self::scan(backend)?);
        }
        Ok(self.tree.get_or_insert_with(ReferenceTree::new))
    }

    /// Drop the cached tree and build a new one.
    pub fn rescan(&mut self, backend: &dyn VcsBackend) -> Result<&ReferenceTree> {
        self.tree = None;
        self.tree(backend)
    }

    /// Forget the cached tree; the next [`tree`](Self::tree) call rescans.
    pub fn invalidate(&mut self) {
        self.tree = None;
    }

    /// Build a tree from scratch. Has no side effects on the backend.
    pub fn scan(backend: &dyn VcsBackend) -> Result<ReferenceTree> {
        let mut tree = ReferenceTree::new();

        for branch in backend.list_branches()? {
            match classify(&branch) {
                Some(name) if !name.is_tag() => tree.upsert(&name, Some(target(&branch))),
                _ => tracing::debug!(branch = %branch.name, "Ignoring branch"),
            }
        }

        for tag in backend.list_tags()? {
            match classify(&tag) {
                Some(name) if name.is_tag() => tree.upsert(&name, Some(target(&tag))),
                _ => tracing::debug!(tag = %tag.name, "Ignoring tag"),
            }
        }

        tracing::debug!(releases = tree.releases.len(), "Scanned references");
        Ok(tree)
    }
}

fn classify(reference: &RefInfo) -> Option<RefName> {
    RefName::parse_ref(&reference.name).ok()
}

fn target(reference: &RefInfo) -> RefTarget {
    RefTarget::new(reference.commit.id.clone(), reference.commit.date)
}
