//! Branch cascade
//!
//! Turns drift events into branches and release candidates. A new release
//! brings its first patch, a new patch brings a copy of every environment of
//! the patch it follows, and every new or drifted environment is merged and
//! tagged. Creation is guarded by existence checks so that an interrupted
//! cycle can simply be run again.

use cascade_git::VcsBackend;

use crate::drift::DriftEvent;
use crate::merge::{MergeCycle, MergeTarget};
use crate::refs::{Environment, RefName, ReferenceTree, is_environment_name};
use crate::{Error, Result};

/// An environment that could not be cascaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFailure {
    pub branch: String,
    pub message: String,
}

/// Everything one or more cascade steps created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub created_branches: Vec<String>,
    /// Candidate tags, in creation order
    pub candidates: Vec<String>,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.created_branches.is_empty() && self.candidates.is_empty() && self.failures.is_empty()
    }

    pub fn extend(&mut self, other: CascadeReport) {
        self.created_branches.extend(other.created_branches);
        self.candidates.extend(other.candidates);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, branch: String, error: &Error) {
        tracing::error!(branch = %branch, error = %error, "Cascade failed");
        self.failures.push(CascadeFailure {
            branch,
            message: error.to_string(),
        });
    }
}

/// Applies drift events to the backend.
pub struct BranchCascade<'a> {
    backend: &'a mut dyn VcsBackend,
    merge: MergeCycle<'a>,
}

impl<'a> BranchCascade<'a> {
    pub fn new(backend: &'a mut dyn VcsBackend, merge: MergeCycle<'a>) -> Self {
        Self { backend, merge }
    }

    /// Apply one event; `tree` is the state scanned before it.
    ///
    /// Backend failures creating releases and patches abort the event. A
    /// failure on one environment is recorded and its siblings continue.
    pub fn apply(&mut self, tree: &ReferenceTree, event: &DriftEvent) -> Result<CascadeReport> {
        let mut report = CascadeReport::default();
        match event {
            DriftEvent::NewRelease { version, start } => {
                self.ensure_branch(&RefName::release(*version).to_string(), start, &mut report)?;
                self.new_patch(tree, *version, 0, &mut report)?;
            }
            DriftEvent::NewPatch { release, patch } => {
                self.new_patch(tree, *release, *patch, &mut report)?;
            }
            DriftEvent::Remerge {
                release,
                patch,
                environment,
            } => {
                let env = tree
                    .environment(*release, *patch, environment)
                    .ok_or_else(|| Error::UnknownEnvironment {
                        branch: RefName::environment(*release, *patch, environment).to_string(),
                    })?;
                let mut target = MergeTarget::new(*release, *patch, environment.clone());
                if let Some(predecessor) = branched(tree.predecessor_environment(*release, *patch, environment)) {
                    target = target.with_predecessor(predecessor.branch());
                }
                let merged = env
                    .next_candidate()
                    .and_then(|candidate| self.merge_environment(&target, candidate, &mut report));
                if let Err(e) = merged {
                    report.fail(target.branch(), &e);
                }
            }
        }
        Ok(report)
    }

    /// Create environment `name` on the latest patch of the latest release.
    ///
    /// With `copy_from`, the new environment inherits the merge result of
    /// that environment on the same patch; otherwise it inherits from its
    /// namesake on the predecessor patch, if there is one.
    pub fn add_environment(
        &mut self,
        tree: &ReferenceTree,
        name: &str,
        copy_from: Option<&str>,
    ) -> Result<CascadeReport> {
        if !is_environment_name(name) {
            return Err(Error::InvalidRefName {
                name: name.to_string(),
            });
        }
        let patch = tree
            .last_release()
            .and_then(|r| r.last_patch())
            .ok_or(Error::NoRelease)?;

        let mut target = MergeTarget::new(patch.release, patch.patch, name);
        let predecessor = match copy_from {
            Some(source) => Some(branched(patch.environment(source)).ok_or_else(|| {
                Error::UnknownEnvironment {
                    branch: RefName::environment(patch.release, patch.patch, source).to_string(),
                }
            })?),
            None => branched(tree.predecessor_environment(patch.release, patch.patch, name)),
        };
        if let Some(predecessor) = predecessor {
            target = target.with_predecessor(predecessor.branch());
        }
        let candidate = patch.environment(name).map_or(Ok(1), Environment::next_candidate)?;

        let mut report = CascadeReport::default();
        self.ensure_branch(&target.branch(), &patch.branch(), &mut report)?;
        self.merge_environment(&target, candidate, &mut report)?;
        Ok(report)
    }

    fn new_patch(
        &mut self,
        tree: &ReferenceTree,
        release: u32,
        patch: u32,
        report: &mut CascadeReport,
    ) -> Result<()> {
        let branch = RefName::patch(release, patch).to_string();
        self.ensure_branch(&branch, &RefName::release(release).to_string(), report)?;

        let Some(source) = tree.predecessor_patch(release, patch) else {
            tracing::debug!(branch = %branch, "No environments to copy");
            return Ok(());
        };
        for env in source.environments.iter().filter(|e| e.target.is_some()) {
            let target = MergeTarget::new(release, patch, env.name.clone()).with_predecessor(env.branch());
            let created = tree
                .environment(release, patch, &env.name)
                .map_or(Ok(1), Environment::next_candidate)
                .and_then(|candidate| {
                    self.ensure_branch(&target.branch(), &branch, report)?;
                    self.merge_environment(&target, candidate, report)
                });
            if let Err(e) = created {
                report.fail(target.branch(), &e);
            }
        }
        Ok(())
    }

    fn merge_environment(
        &mut self,
        target: &MergeTarget,
        candidate: u32,
        report: &mut CascadeReport,
    ) -> Result<()> {
        let outcome = self.merge.run(&mut *self.backend, target, candidate)?;
        report.candidates.push(outcome.tag);
        Ok(())
    }

    fn ensure_branch(&mut self, name: &str, start: &str, report: &mut CascadeReport) -> Result<()> {
        if self.backend.branch_exists(name)? {
            tracing::debug!(branch = %name, "Branch already exists");
            return Ok(());
        }
        let commit = self.backend.create_branch(name, start)?;
        tracing::info!(branch = %name, commit = %commit.short_id(), "Created branch");
        report.created_branches.push(name.to_string());
        Ok(())
    }
}

/// The environment, if it exists as a branch rather than only through its tags.
fn branched(env: Option<&Environment>) -> Option<&Environment> {
    env.filter(|e| e.target.is_some())
}
