//! Single-checkout git repository backed by git2

use std::fs;
use std::path::{Path, PathBuf};

use git2::{
    BranchType, ErrorCode, IndexAddOption, ObjectType, Oid, Repository, Sort, TreeWalkMode,
    TreeWalkResult,
};

use crate::commits::{CommitInfo, RefInfo, commit_info};
use crate::{Error, Result, Signature, VcsBackend, transport};

/// A classic single-checkout repository on disk.
///
/// Every branch switch rewrites the one working tree, so a handle must not be
/// shared between concurrent operations.
pub struct LocalRepository {
    root: PathBuf,
    repo: Repository,
}

impl LocalRepository {
    /// Open the repository rooted at `root` (the directory containing `.git`).
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.join(".git").exists() {
            return Err(Error::NotARepository { path: root });
        }
        let repo = Repository::open(&root)?;
        Ok(Self { root, repo })
    }

    /// Root of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the git database.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    fn find_commit(&self, revision: &str) -> Result<Option<git2::Commit<'_>>> {
        match self.repo.revparse_single(revision) {
            Ok(object) => Ok(Some(object.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::Ambiguous => {
                // a short name can still be a branch or tag shadowed by revparse rules
                for prefix in ["refs/heads/", "refs/tags/"] {
                    if let Ok(reference) = self.repo.find_reference(&format!("{prefix}{revision}"))
                    {
                        return Ok(Some(reference.peel_to_commit()?));
                    }
                }
                Ok(None)
            }
            Err(e) if e.class() == git2::ErrorClass::Reference => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_commit(&self, revision: &str) -> Result<git2::Commit<'_>> {
        self.find_commit(revision)?
            .ok_or_else(|| Error::UnknownRevision {
                revision: revision.to_string(),
            })
    }

    fn commit_by_id(&self, commit: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(commit).map_err(|_| Error::UnknownRevision {
            revision: commit.to_string(),
        })?;
        Ok(self.repo.find_commit(oid)?)
    }
}

impl VcsBackend for LocalRepository {
    fn resolve(&self, revision: &str) -> Result<Option<CommitInfo>> {
        Ok(self.find_commit(revision)?.map(|c| commit_info(&c)))
    }

    fn list_branches(&self) -> Result<Vec<RefInfo>> {
        let mut refs = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let reference = branch.get();
            let Some(name) = reference.name() else {
                tracing::debug!("Skipping branch with a non UTF-8 name");
                continue;
            };
            let commit = reference.peel_to_commit()?;
            refs.push(RefInfo {
                name: name.to_string(),
                commit: commit_info(&commit),
            });
        }
        Ok(refs)
    }

    fn list_tags(&self) -> Result<Vec<RefInfo>> {
        let mut refs = Vec::new();
        for tag in self.repo.tag_names(None)?.iter().flatten() {
            let name = format!("refs/tags/{tag}");
            let commit = self.repo.find_reference(&name)?.peel_to_commit()?;
            refs.push(RefInfo {
                name,
                commit: commit_info(&commit),
            });
        }
        Ok(refs)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        match self.repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().unwrap_or("HEAD").to_string())
        } else {
            Err(Error::DetachedHead)
        }
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        let refname = format!("refs/heads/{branch}");
        let reference = self
            .repo
            .find_reference(&refname)
            .map_err(|_| Error::BranchNotFound {
                name: branch.to_string(),
            })?;
        let target = reference.peel(ObjectType::Commit)?;

        // untracked leftovers of a failed merge must not leak into the next branch
        self.repo.checkout_tree(
            &target,
            Some(
                git2::build::CheckoutBuilder::default()
                    .force()
                    .remove_untracked(true),
            ),
        )?;
        self.repo.set_head(&refname)?;
        tracing::debug!(branch = %branch, "Checked out branch");
        Ok(())
    }

    fn create_branch(&mut self, name: &str, start: &str) -> Result<CommitInfo> {
        if self.branch_exists(name)? {
            return Err(Error::BranchExists {
                name: name.to_string(),
            });
        }
        let commit = self.require_commit(start)?;
        self.repo.branch(name, &commit, false)?;
        Ok(commit_info(&commit))
    }

    fn create_tag(&mut self, name: &str, commit: &str) -> Result<CommitInfo> {
        if self.tag_exists(name)? {
            return Err(Error::TagExists {
                name: name.to_string(),
            });
        }
        let target = self.require_commit(commit)?;
        self.repo.tag_lightweight(name, target.as_object(), false)?;
        Ok(commit_info(&target))
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let target = self.root.join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| Error::io(&target, e))
    }

    fn add_all(&mut self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitInfo> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = git2::Signature::now(&author.name, &author.email)?;
        let parent = self.repo.head()?.peel_to_commit()?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        let commit = self.repo.find_commit(oid)?;
        Ok(commit_info(&commit))
    }

    fn read_blob_at_commit(&self, path: &str, commit: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.commit_by_id(commit)?.tree()?;
        let entry = match tree.get_path(Path::new(path.trim_start_matches('/'))) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(Some(blob.content().to_vec()))
    }

    fn list_files_at_commit(&self, commit: &str) -> Result<Vec<String>> {
        let tree = self.commit_by_id(commit)?.tree()?;
        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob)
                && let Some(name) = entry.name()
            {
                files.push(format!("{root}{name}"));
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    fn pull(&mut self, remote: &str, include_tags: bool) -> Result<()> {
        let branch = self.current_branch()?;
        tracing::info!(branch = %branch, remote = %remote, "Pulling latest changes");
        transport::pull(&self.repo, remote, &branch, include_tags)
    }

    fn push(&mut self, remote: &str, include_tags: bool) -> Result<()> {
        transport::push(&self.repo, remote, include_tags)
    }

    fn log_between(&self, include: &str, exclude: Option<&str>) -> Result<Vec<CommitInfo>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(self.require_commit(include)?.id())?;
        if let Some(exclude) = exclude {
            revwalk.hide(self.require_commit(exclude)?.id())?;
        }
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(commit_info(&commit));
        }
        Ok(commits)
    }
}
