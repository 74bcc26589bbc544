//! Real git repositories with controllable commit dates.
//!
//! Every fixture commit gets an author time from a private clock that starts
//! at a fixed instant and moves one minute per commit, so date comparisons in
//! tests never depend on how fast the test runs.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

/// Author time of the first fixture commit (2023-11-14T22:13:20Z).
pub const EPOCH: i64 = 1_700_000_000;

/// A temporary git repository with a `README.md` commit on the main branch.
///
/// # Panics
/// Every helper panics when the underlying git operation fails.
pub struct GitFixture {
    temp_dir: TempDir,
    repo: Repository,
    clock: i64,
}

impl GitFixture {
    /// Initialise a repository whose only branch is `main_branch`.
    pub fn new(main_branch: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut options = RepositoryInitOptions::new();
        options.initial_head(main_branch);
        let repo = Repository::init_opts(temp_dir.path(), &options).unwrap_or_else(|e| {
            panic!(
                "GitFixture: failed to init repository at {}: {e}",
                temp_dir.path().display()
            )
        });

        let fixture = Self {
            temp_dir,
            repo,
            clock: EPOCH,
        };
        fixture.write_and_commit("Initial commit", &[("README.md", "# Test")], &[], EPOCH);
        fixture
    }

    /// Clone `remote` (a path to another repository) into a new fixture.
    pub fn clone_of(remote: &Path) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let url = remote.to_str().unwrap();
        let repo = Repository::clone(url, temp_dir.path())
            .unwrap_or_else(|e| panic!("GitFixture: failed to clone {url}: {e}"));
        Self {
            temp_dir,
            repo,
            clock: EPOCH + 86_400,
        }
    }

    /// Root of the working tree.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Commit `files` on `branch` with the next clock tick as author time.
    pub fn commit(&mut self, branch: &str, message: &str, files: &[(&str, &str)]) -> Oid {
        self.clock += 60;
        self.commit_at(branch, message, files, self.clock)
    }

    /// Commit `files` on `branch` with an explicit author time (seconds since epoch).
    ///
    /// Leaves `branch` checked out.
    pub fn commit_at(
        &mut self,
        branch: &str,
        message: &str,
        files: &[(&str, &str)],
        seconds: i64,
    ) -> Oid {
        self.checkout(branch);
        let parent = self.repo.head().unwrap().peel_to_commit().unwrap();
        let oid = self.write_and_commit(message, files, &[&parent], seconds);
        self.clock = self.clock.max(seconds);
        oid
    }

    /// Commit with an author time a minute past the wall clock.
    ///
    /// Needed once the code under test has committed with the current time,
    /// since fixture dates otherwise lie in the past.
    pub fn commit_later(&mut self, branch: &str, message: &str, files: &[(&str, &str)]) -> Oid {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        self.commit_at(branch, message, files, now.max(self.clock) + 60)
    }

    /// Create `name` at `start` (branch, tag or commit id).
    pub fn branch(&self, name: &str, start: &str) -> Oid {
        let commit = self
            .repo
            .revparse_single(start)
            .and_then(|o| o.peel_to_commit())
            .unwrap_or_else(|e| panic!("GitFixture: cannot resolve {start}: {e}"));
        self.repo
            .branch(name, &commit, false)
            .unwrap_or_else(|e| panic!("GitFixture: failed to create branch {name}: {e}"));
        commit.id()
    }

    /// Create a lightweight tag `name` at `revision`.
    pub fn tag(&self, name: &str, revision: &str) -> Oid {
        let object = self
            .repo
            .revparse_single(revision)
            .unwrap_or_else(|e| panic!("GitFixture: cannot resolve {revision}: {e}"));
        self.repo
            .tag_lightweight(name, &object, false)
            .unwrap_or_else(|e| panic!("GitFixture: failed to create tag {name}: {e}"))
    }

    /// Check out `branch`, forcing the working tree to match.
    pub fn checkout(&self, branch: &str) {
        let refname = format!("refs/heads/{branch}");
        self.repo
            .set_head(&refname)
            .unwrap_or_else(|e| panic!("GitFixture: failed to set HEAD to {branch}: {e}"));
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::default().force()))
            .unwrap();
    }

    /// Name of the branch HEAD points at.
    pub fn head_branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    /// Whether a local branch exists.
    pub fn has_branch(&self, name: &str) -> bool {
        self.repo.find_branch(name, git2::BranchType::Local).is_ok()
    }

    /// Whether a tag exists.
    pub fn has_tag(&self, name: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/tags/{name}"))
            .is_ok()
    }

    /// Read a file as committed at the tip of `revision`.
    pub fn read_at(&self, revision: &str, path: &str) -> Option<String> {
        let tree = self
            .repo
            .revparse_single(revision)
            .and_then(|o| o.peel_to_tree())
            .ok()?;
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = entry.to_object(&self.repo).ok()?.peel_to_blob().ok()?;
        Some(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Create a bare repository, register it as remote `name` and push every branch to it.
    ///
    /// The returned directory must outlive the fixture's use of the remote.
    pub fn add_bare_remote(&self, name: &str) -> TempDir {
        let remote_dir = TempDir::new().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();
        let mut remote = self
            .repo
            .remote(name, remote_dir.path().to_str().unwrap())
            .unwrap();

        let refspecs: Vec<String> = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .unwrap()
            .filter_map(|b| b.ok())
            .filter_map(|(b, _)| b.get().name().map(|n| format!("{n}:{n}")))
            .collect();
        remote.push(&refspecs, None).unwrap();
        remote_dir
    }

    /// Push `branch` to remote `name`.
    pub fn push(&self, name: &str, branch: &str) {
        let mut remote = self.repo.find_remote(name).unwrap();
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote
            .push(&[refspec.as_str()], None)
            .unwrap_or_else(|e| panic!("GitFixture: failed to push {branch}: {e}"));
    }

    fn write_and_commit(
        &self,
        message: &str,
        files: &[(&str, &str)],
        parents: &[&git2::Commit<'_>],
        seconds: i64,
    ) -> Oid {
        let mut index = self.repo.index().unwrap();
        // another handle may have rewritten the index on disk
        index.read(true).unwrap();
        for (path, content) in files {
            let target = self.root().join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&target, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let signature = Signature::new("Test User", "test@test.com", &Time::new(seconds, 0))
            .unwrap();
        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, parents)
            .unwrap_or_else(|e| panic!("GitFixture: commit {message:?} failed: {e}"))
    }
}
