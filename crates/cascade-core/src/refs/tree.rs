//! In-memory model of the release hierarchy
//!
//! Nodes hold the numbers of their ancestors instead of pointers, so the tree
//! is plain owned data that can be rebuilt wholesale on every scan.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::RefName;
use crate::{Error, Result};

/// The commit a branch or tag resolved to when the tree was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTarget {
    pub commit: String,
    pub date: DateTime<Utc>,
}

impl RefTarget {
    pub fn new(commit: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            commit: commit.into(),
            date,
        }
    }
}

/// `r<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: u32,
    pub target: Option<RefTarget>,
    pub patches: BTreeMap<u32, Patch>,
}

/// `r<release>.<patch>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub release: u32,
    pub patch: u32,
    pub target: Option<RefTarget>,
    /// Environments in the order they were first seen.
    pub environments: Vec<Environment>,
}

/// `r<release>.<patch>-<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub release: u32,
    pub patch: u32,
    pub name: String,
    pub target: Option<RefTarget>,
    pub candidates: BTreeMap<u32, ReleaseCandidate>,
}

/// `r<release>.<patch>-<environment>-RC<candidate>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub release: u32,
    pub patch: u32,
    pub environment: String,
    pub candidate: u32,
    pub target: Option<RefTarget>,
}

impl Release {
    fn new(version: u32) -> Self {
        Self {
            version,
            target: None,
            patches: BTreeMap::new(),
        }
    }

    pub fn ref_name(&self) -> RefName {
        RefName::release(self.version)
    }

    pub fn branch(&self) -> String {
        self.ref_name().to_string()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.target.as_ref().map(|t| t.date)
    }

    pub fn patch(&self, patch: u32) -> Option<&Patch> {
        self.patches.get(&patch)
    }

    pub fn last_patch(&self) -> Option<&Patch> {
        self.patches.values().next_back()
    }

    /// Nearest patch numerically below `patch`.
    pub fn previous_patch(&self, patch: u32) -> Option<&Patch> {
        self.patches.range(..patch).next_back().map(|(_, p)| p)
    }
}

impl Patch {
    fn new(release: u32, patch: u32) -> Self {
        Self {
            release,
            patch,
            target: None,
            environments: Vec::new(),
        }
    }

    pub fn ref_name(&self) -> RefName {
        RefName::patch(self.release, self.patch)
    }

    pub fn branch(&self) -> String {
        self.ref_name().to_string()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.target.as_ref().map(|t| t.date)
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    fn environment_mut(&mut self, name: &str) -> &mut Environment {
        let index = match self.environments.iter().position(|e| e.name == name) {
            Some(index) => index,
            None => {
                self.environments
                    .push(Environment::new(self.release, self.patch, name));
                self.environments.len() - 1
            }
        };
        &mut self.environments[index]
    }
}

impl Environment {
    fn new(release: u32, patch: u32, name: &str) -> Self {
        Self {
            release,
            patch,
            name: name.to_string(),
            target: None,
            candidates: BTreeMap::new(),
        }
    }

    pub fn ref_name(&self) -> RefName {
        RefName::environment(self.release, self.patch, &self.name)
    }

    pub fn branch(&self) -> String {
        self.ref_name().to_string()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.target.as_ref().map(|t| t.date)
    }

    pub fn last_candidate(&self) -> Option<&ReleaseCandidate> {
        self.candidates.values().next_back()
    }

    /// Number the next candidate of this environment would get.
    pub fn next_candidate(&self) -> Result<u32> {
        match self.last_candidate() {
            None => Ok(1),
            Some(last) => last.candidate.checked_add(1).ok_or_else(|| Error::VersionOverflow {
                name: last.tag(),
            }),
        }
    }
}

impl ReleaseCandidate {
    pub fn ref_name(&self) -> RefName {
        RefName::candidate(self.release, self.patch, &self.environment, self.candidate)
    }

    pub fn tag(&self) -> String {
        self.ref_name().to_string()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.target.as_ref().map(|t| t.date)
    }
}

/// Every release, patch, environment and candidate known to the repository,
/// plus the `v<int>` version tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTree {
    pub releases: BTreeMap<u32, Release>,
    pub version_tags: BTreeMap<u32, RefTarget>,
}

impl ReferenceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty() && self.version_tags.is_empty()
    }

    /// Record `name`, creating any missing ancestors.
    ///
    /// Idempotent: upserting the same name twice leaves one node. Ancestors
    /// created on the way have no target until their own name is upserted.
    pub fn upsert(&mut self, name: &RefName, target: Option<RefTarget>) {
        match name {
            RefName::VersionTag { version } => {
                if let Some(target) = target {
                    self.version_tags.insert(*version, target);
                }
            }
            RefName::Release { version } => {
                let release = self.release_mut(*version);
                if target.is_some() {
                    release.target = target;
                }
            }
            RefName::Patch { release, patch } => {
                let node = self.patch_mut(*release, *patch);
                if target.is_some() {
                    node.target = target;
                }
            }
            RefName::Environment {
                release,
                patch,
                name,
            } => {
                let node = self.patch_mut(*release, *patch).environment_mut(name);
                if target.is_some() {
                    node.target = target;
                }
            }
            RefName::Candidate {
                release,
                patch,
                environment,
                candidate,
            } => {
                let env = self.patch_mut(*release, *patch).environment_mut(environment);
                let node = env
                    .candidates
                    .entry(*candidate)
                    .or_insert_with(|| ReleaseCandidate {
                        release: *release,
                        patch: *patch,
                        environment: environment.clone(),
                        candidate: *candidate,
                        target: None,
                    });
                if target.is_some() {
                    node.target = target;
                }
            }
        }
    }

    fn release_mut(&mut self, version: u32) -> &mut Release {
        self.releases
            .entry(version)
            .or_insert_with(|| Release::new(version))
    }

    fn patch_mut(&mut self, release: u32, patch: u32) -> &mut Patch {
        self.release_mut(release)
            .patches
            .entry(patch)
            .or_insert_with(|| Patch::new(release, patch))
    }

    pub fn release(&self, version: u32) -> Option<&Release> {
        self.releases.get(&version)
    }

    pub fn last_release(&self) -> Option<&Release> {
        self.releases.values().next_back()
    }

    /// Nearest release numerically below `version`.
    pub fn previous_release(&self, version: u32) -> Option<&Release> {
        self.releases.range(..version).next_back().map(|(_, r)| r)
    }

    /// Releases from the highest version down.
    pub fn releases_newest_first(&self) -> impl Iterator<Item = &Release> {
        self.releases.values().rev()
    }

    pub fn patch(&self, release: u32, patch: u32) -> Option<&Patch> {
        self.release(release)?.patch(patch)
    }

    pub fn environment(&self, release: u32, patch: u32, name: &str) -> Option<&Environment> {
        self.patch(release, patch)?.environment(name)
    }

    /// The patch whose environments seed `r<release>.<patch>`.
    ///
    /// Patch 0 inherits from the last patch of the nearest lower release; any
    /// other patch from the nearest lower patch of its own release.
    pub fn predecessor_patch(&self, release: u32, patch: u32) -> Option<&Patch> {
        if patch == 0 {
            self.previous_release(release)?.last_patch()
        } else {
            self.release(release)?.previous_patch(patch)
        }
    }

    /// The same-named environment on the predecessor patch.
    pub fn predecessor_environment(
        &self,
        release: u32,
        patch: u32,
        name: &str,
    ) -> Option<&Environment> {
        self.predecessor_patch(release, patch)?.environment(name)
    }

    pub fn last_candidate(&self, release: u32, patch: u32, name: &str) -> Option<&ReleaseCandidate> {
        self.environment(release, patch, name)?.last_candidate()
    }

    /// Number a newly auto-assigned release gets.
    pub fn next_release_version(&self) -> Result<u32> {
        match self.last_release() {
            None => Ok(1),
            Some(last) => last.version.checked_add(1).ok_or_else(|| Error::VersionOverflow {
                name: last.branch(),
            }),
        }
    }
}

impl fmt::Display for ReferenceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for release in self.releases.values() {
            write!(f, "r{} {{", release.version)?;
            for patch in release.patches.values() {
                write!(f, " p{} {{", patch.patch)?;
                for (index, env) in patch.environments.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    let candidates: Vec<String> = env
                        .candidates
                        .keys()
                        .map(|c| format!("RC{c}"))
                        .collect();
                    write!(f, " {}: [{}]", env.name, candidates.join(", "))?;
                }
                write!(f, " }}")?;
            }
            writeln!(f, " }}")?;
        }
        if !self.version_tags.is_empty() {
            let tags: Vec<String> = self.version_tags.keys().map(|v| format!("v{v}")).collect();
            writeln!(f, "tags: [{}]", tags.join(", "))?;
        }
        Ok(())
    }
}
