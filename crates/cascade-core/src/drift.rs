//! Drift detection
//!
//! Compares the recorded hierarchy with what the backend holds now and emits
//! the events the cascade has to act on. Every comparison is by commit date
//! (author date, committer time as fallback), never by ancestry. A node whose
//! date is unknown always counts as drifted.

use std::fmt;

use chrono::{DateTime, Utc};

use cascade_git::VcsBackend;

use crate::refs::{RefName, ReferenceTree, Release};
use crate::{Error, Result};

/// Something the cascade has to create or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftEvent {
    /// Branch release `version` from commit `start`.
    NewRelease { version: u32, start: String },
    /// Branch `r<release>.<patch>` from the release tip.
    NewPatch { release: u32, patch: u32 },
    /// Rerun the merge on an existing environment branch.
    Remerge {
        release: u32,
        patch: u32,
        environment: String,
    },
}

impl fmt::Display for DriftEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewRelease { version, start } => {
                let short = &start[..start.len().min(7)];
                write!(f, "new release {} from {short}", RefName::release(*version))
            }
            Self::NewPatch { release, patch } => {
                write!(f, "new patch {}", RefName::patch(*release, *patch))
            }
            Self::Remerge {
                release,
                patch,
                environment,
            } => write!(
                f,
                "remerge {}",
                RefName::environment(*release, *patch, environment)
            ),
        }
    }
}

/// Which releases the secondary check looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondaryScope {
    /// Only the most recent `depth` releases; 0 means all of them.
    pub depth: usize,
    /// Only this release.
    pub release: Option<u32>,
}

impl SecondaryScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn release(version: u32) -> Self {
        Self {
            depth: 0,
            release: Some(version),
        }
    }
}

/// Evaluates the three drift policies against one scanned tree.
pub struct DriftDetector<'a> {
    backend: &'a dyn VcsBackend,
    tree: &'a ReferenceTree,
}

impl<'a> DriftDetector<'a> {
    pub fn new(backend: &'a dyn VcsBackend, tree: &'a ReferenceTree) -> Self {
        Self { backend, tree }
    }

    /// New work on the main line since the highest release was cut.
    pub fn primary(&self, main_branch: &str) -> Result<Option<DriftEvent>> {
        let tip = self
            .backend
            .resolve(main_branch)?
            .ok_or_else(|| cascade_git::Error::BranchNotFound {
                name: main_branch.to_string(),
            })?;

        let drifted = match self.tree.last_release() {
            None => true,
            Some(release) => is_after(tip.date, release.date()),
        };
        if !drifted {
            return Ok(None);
        }

        let version = self.tree.next_release_version()?;
        tracing::info!(release = version, commit = %tip.short_id(), "Main line drifted");
        Ok(Some(DriftEvent::NewRelease {
            version,
            start: tip.id,
        }))
    }

    /// Version tags that have no release yet, in ascending order.
    pub fn version_tags(&self) -> Vec<DriftEvent> {
        self.tree
            .version_tags
            .iter()
            .filter(|(version, _)| self.tree.release(**version).is_none())
            .map(|(version, target)| {
                tracing::info!(release = *version, "Version tag without release");
                DriftEvent::NewRelease {
                    version: *version,
                    start: target.commit.clone(),
                }
            })
            .collect()
    }

    /// Hotfixes on release branches and new commits on environment branches.
    ///
    /// Releases are visited newest first. A release that cannot be evaluated
    /// is logged and skipped.
    pub fn secondary(&self, scope: &SecondaryScope) -> Vec<DriftEvent> {
        let releases = self
            .tree
            .releases_newest_first()
            .filter(|r| scope.release.is_none_or(|v| r.version == v));
        let limit = if scope.depth == 0 { usize::MAX } else { scope.depth };

        let mut events = Vec::new();
        for release in releases.take(limit) {
            match self.release_drift(release) {
                Ok(found) => events.extend(found),
                Err(e) => {
                    tracing::warn!(release = release.version, error = %e, "Skipping release");
                }
            }
        }
        events
    }

    fn release_drift(&self, release: &Release) -> Result<Vec<DriftEvent>> {
        let tip = release
            .date()
            .ok_or(Error::UnknownRelease {
                version: release.version,
            })?;

        let mut events = Vec::new();
        match release.last_patch() {
            None => events.push(DriftEvent::NewPatch {
                release: release.version,
                patch: 0,
            }),
            Some(patch) if is_after(tip, patch.date()) => {
                let next = patch.patch.checked_add(1).ok_or_else(|| Error::VersionOverflow {
                    name: patch.branch(),
                })?;
                tracing::info!(release = release.version, patch = next, "Release branch drifted");
                events.push(DriftEvent::NewPatch {
                    release: release.version,
                    patch: next,
                });
            }
            Some(_) => {}
        }

        if let Some(patch) = release.last_patch() {
            for env in &patch.environments {
                let Some(env_date) = env.date() else {
                    tracing::debug!(branch = %env.branch(), "Environment has no branch");
                    continue;
                };
                let last = env.last_candidate().and_then(|c| c.date());
                if env.last_candidate().is_none() || is_after(env_date, last) {
                    tracing::info!(branch = %env.branch(), "Environment drifted");
                    events.push(DriftEvent::Remerge {
                        release: env.release,
                        patch: env.patch,
                        environment: env.name.clone(),
                    });
                }
            }
        }
        Ok(events)
    }
}

fn is_after(tip: DateTime<Utc>, recorded: Option<DateTime<Utc>>) -> bool {
    recorded.is_none_or(|date| tip > date)
}
