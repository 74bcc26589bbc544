//! In-memory backend
//!
//! Keeps commits, branches and tags in plain maps. Commit ids are
//! deterministic. The clock moves one minute per commit and otherwise only
//! when told to, so the date-driven drift rules can be exercised without
//! touching the disk.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::commits::{CommitInfo, RefInfo};
use crate::{Error, Result, Signature, VcsBackend};

#[derive(Debug, Clone)]
struct MemoryCommit {
    info: CommitInfo,
    parents: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
}

/// A remote interaction recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub remote: String,
    pub include_tags: bool,
}

/// Repository kept entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    commits: HashMap<String, MemoryCommit>,
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    head: String,
    worktree: BTreeMap<String, Vec<u8>>,
    counter: u64,
    clock: DateTime<Utc>,
    pulls: Vec<RemoteCall>,
    pushes: Vec<RemoteCall>,
    pull_failure: Option<String>,
}

impl MemoryBackend {
    /// Create a repository with one empty commit on `main_branch`, checked out.
    pub fn init(main_branch: &str) -> Self {
        let mut backend = Self {
            commits: HashMap::new(),
            branches: BTreeMap::new(),
            tags: BTreeMap::new(),
            head: main_branch.to_string(),
            worktree: BTreeMap::new(),
            counter: 0,
            clock: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            pulls: Vec::new(),
            pushes: Vec::new(),
            pull_failure: None,
        };
        let root = backend.store_commit("Initial commit", Vec::new(), BTreeMap::new());
        backend.branches.insert(main_branch.to_string(), root);
        backend
    }

    /// Current value of the clock stamped onto new commits.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Move the clock forward.
    pub fn advance_clock(&mut self, by: Duration) {
        self.clock += by;
    }

    /// Commit `files` directly on top of `branch` without touching the checkout.
    pub fn commit_on(
        &mut self,
        branch: &str,
        message: &str,
        files: &[(&str, &str)],
    ) -> Result<CommitInfo> {
        let parent = self
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::BranchNotFound {
                name: branch.to_string(),
            })?;
        let mut tree = self.commits[&parent].files.clone();
        for (path, content) in files {
            tree.insert(normalize(path), content.as_bytes().to_vec());
        }
        let id = self.store_commit(message, vec![parent], tree.clone());
        self.branches.insert(branch.to_string(), id.clone());
        if self.head == branch {
            self.worktree = tree;
        }
        Ok(self.commits[&id].info.clone())
    }

    /// Make the next pull fail with `message`.
    pub fn fail_next_pull(&mut self, message: impl Into<String>) {
        self.pull_failure = Some(message.into());
    }

    /// Every pull requested so far.
    pub fn pulls(&self) -> &[RemoteCall] {
        &self.pulls
    }

    /// Every push requested so far.
    pub fn pushes(&self) -> &[RemoteCall] {
        &self.pushes
    }

    /// Content of a file in the working tree.
    pub fn worktree_file(&self, path: &str) -> Option<&[u8]> {
        self.worktree.get(&normalize(path)).map(Vec::as_slice)
    }

    fn store_commit(
        &mut self,
        message: &str,
        parents: Vec<String>,
        files: BTreeMap<String, Vec<u8>>,
    ) -> String {
        self.counter += 1;
        self.clock += Duration::minutes(1);
        let id = format!("{:040x}", self.counter);
        let info = CommitInfo {
            id: id.clone(),
            message: message.lines().next().unwrap_or("").to_string(),
            author: Some("cascade".to_string()),
            date: self.clock,
        };
        self.commits.insert(
            id.clone(),
            MemoryCommit {
                info,
                parents,
                files,
            },
        );
        id
    }

    fn lookup(&self, revision: &str) -> Option<&MemoryCommit> {
        let id = if let Some(name) = revision.strip_prefix("refs/heads/") {
            self.branches.get(name)
        } else if let Some(name) = revision.strip_prefix("refs/tags/") {
            self.tags.get(name)
        } else {
            self.branches
                .get(revision)
                .or_else(|| self.tags.get(revision))
        };
        match id {
            Some(id) => self.commits.get(id),
            None => self.commits.get(revision),
        }
    }

    fn require(&self, revision: &str) -> Result<&MemoryCommit> {
        self.lookup(revision).ok_or_else(|| Error::UnknownRevision {
            revision: revision.to_string(),
        })
    }

    fn ancestors(&self, start: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut pending = vec![start.to_string()];
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&id) {
                pending.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    fn ref_list(&self, prefix: &str, refs: &BTreeMap<String, String>) -> Vec<RefInfo> {
        refs.iter()
            .filter_map(|(name, id)| {
                self.commits.get(id).map(|commit| RefInfo {
                    name: format!("{prefix}{name}"),
                    commit: commit.info.clone(),
                })
            })
            .collect()
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

impl VcsBackend for MemoryBackend {
    fn resolve(&self, revision: &str) -> Result<Option<CommitInfo>> {
        Ok(self.lookup(revision).map(|c| c.info.clone()))
    }

    fn list_branches(&self) -> Result<Vec<RefInfo>> {
        Ok(self.ref_list("refs/heads/", &self.branches))
    }

    fn list_tags(&self) -> Result<Vec<RefInfo>> {
        Ok(self.ref_list("refs/tags/", &self.tags))
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.branches.contains_key(name))
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tags.contains_key(name))
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.head.clone())
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        let id = self
            .branches
            .get(branch)
            .ok_or_else(|| Error::BranchNotFound {
                name: branch.to_string(),
            })?;
        self.worktree = self.commits[id].files.clone();
        self.head = branch.to_string();
        Ok(())
    }

    fn create_branch(&mut self, name: &str, start: &str) -> Result<CommitInfo> {
        if self.branches.contains_key(name) {
            return Err(Error::BranchExists {
                name: name.to_string(),
            });
        }
        let info = self.require(start)?.info.clone();
        self.branches.insert(name.to_string(), info.id.clone());
        Ok(info)
    }

    fn create_tag(&mut self, name: &str, commit: &str) -> Result<CommitInfo> {
        if self.tags.contains_key(name) {
            return Err(Error::TagExists {
                name: name.to_string(),
            });
        }
        let info = self.require(commit)?.info.clone();
        self.tags.insert(name.to_string(), info.id.clone());
        Ok(info)
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.worktree.insert(normalize(path), content.to_vec());
        Ok(())
    }

    fn add_all(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitInfo> {
        let parent = self
            .branches
            .get(&self.head)
            .cloned()
            .ok_or(Error::DetachedHead)?;
        let id = self.store_commit(message, vec![parent], self.worktree.clone());
        if let Some(commit) = self.commits.get_mut(&id) {
            commit.info.author = Some(author.name.clone());
        }
        self.branches.insert(self.head.clone(), id.clone());
        Ok(self.commits[&id].info.clone())
    }

    fn read_blob_at_commit(&self, path: &str, commit: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.require(commit)?.files.get(&normalize(path)).cloned())
    }

    fn list_files_at_commit(&self, commit: &str) -> Result<Vec<String>> {
        Ok(self.require(commit)?.files.keys().cloned().collect())
    }

    fn pull(&mut self, remote: &str, include_tags: bool) -> Result<()> {
        self.pulls.push(RemoteCall {
            remote: remote.to_string(),
            include_tags,
        });
        match self.pull_failure.take() {
            Some(message) => Err(Error::PullFailed { message }),
            None => Ok(()),
        }
    }

    fn push(&mut self, remote: &str, include_tags: bool) -> Result<()> {
        self.pushes.push(RemoteCall {
            remote: remote.to_string(),
            include_tags,
        });
        Ok(())
    }

    fn log_between(&self, include: &str, exclude: Option<&str>) -> Result<Vec<CommitInfo>> {
        let start = self.require(include)?.info.id.clone();
        let hidden = match exclude {
            Some(exclude) => self.ancestors(&self.require(exclude)?.info.id.clone()),
            None => HashSet::new(),
        };
        let mut commits: Vec<CommitInfo> = self
            .ancestors(&start)
            .into_iter()
            .filter(|id| !hidden.contains(id))
            .filter_map(|id| self.commits.get(&id).map(|c| c.info.clone()))
            .collect();
        commits.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn author() -> Signature {
        Signature::new("Cascade", "cascade@example.com")
    }

    #[test]
    fn test_init_checks_out_main() {
        let backend = MemoryBackend::init("master");
        assert_eq!(backend.current_branch().unwrap(), "master");
        assert!(backend.branch_exists("master").unwrap());
        assert_eq!(backend.list_branches().unwrap()[0].name, "refs/heads/master");
    }

    #[test]
    fn test_commit_on_other_branch_leaves_worktree() {
        let mut backend = MemoryBackend::init("master");
        backend.create_branch("r1", "master").unwrap();
        backend
            .commit_on("r1", "Add file", &[("app/config.json", "{}")])
            .unwrap();

        assert!(backend.worktree_file("app/config.json").is_none());
        backend.checkout("r1").unwrap();
        assert_eq!(backend.worktree_file("app/config.json"), Some(&b"{}"[..]));
    }

    #[test]
    fn test_commit_snapshots_worktree() {
        let mut backend = MemoryBackend::init("master");
        backend.write_file("/a.txt", b"one").unwrap();
        backend.add_all().unwrap();
        let first = backend.commit("First", &author()).unwrap();
        backend.write_file("a.txt", b"two").unwrap();
        let second = backend.commit("Second", &author()).unwrap();

        assert_eq!(
            backend.read_blob_at_commit("a.txt", &first.id).unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(
            backend.read_blob_at_commit("a.txt", &second.id).unwrap(),
            Some(b"two".to_vec())
        );
        assert!(second.date > first.date);
    }

    #[test]
    fn test_duplicate_tag_is_rejected() {
        let mut backend = MemoryBackend::init("master");
        backend.create_tag("v1", "master").unwrap();
        let err = backend.create_tag("v1", "master").unwrap_err();
        assert!(matches!(err, Error::TagExists { .. }));
    }

    #[test]
    fn test_log_between_excludes_ancestors() {
        let mut backend = MemoryBackend::init("master");
        backend.create_branch("r1", "master").unwrap();
        backend.commit_on("master", "Feature", &[]).unwrap();
        backend.create_branch("r2", "master").unwrap();

        let log = backend.log_between("r2", Some("r1")).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "Feature");

        let all = backend.log_between("r2", None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_pull_failure_is_injected_once() {
        let mut backend = MemoryBackend::init("master");
        backend.fail_next_pull("offline");
        assert!(backend.pull("origin", true).is_err());
        assert!(backend.pull("origin", true).is_ok());
        assert_eq!(backend.pulls().len(), 2);
    }

    #[test]
    fn test_checkout_unknown_branch() {
        let mut backend = MemoryBackend::init("master");
        assert!(matches!(
            backend.checkout("missing"),
            Err(Error::BranchNotFound { .. })
        ));
    }
}
