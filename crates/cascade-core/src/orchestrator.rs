//! Entry point tying scanner, drift detection, cascade and merge together
//!
//! All operations that touch refs or the working tree run under one
//! [`Mutex`] per repository handle, plus the advisory [`RepositoryLock`] when
//! a lock file is configured. Every such operation leaves the main branch
//! checked out, whether it succeeded or not.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use cascade_git::VcsBackend;

use crate::cascade::{BranchCascade, CascadeReport};
use crate::config::{CascadeConfig, ReleasePolicy};
use crate::drift::{DriftDetector, DriftEvent, SecondaryScope};
use crate::lock::RepositoryLock;
use crate::merge::{MergeCycle, MergeOutcome, MergeResult, MergeTarget, ResolverRegistry};
use crate::persist::{Cipher, PlainCipher, read_merge_result};
use crate::refs::{RefName, ReferenceTree};
use crate::scanner::RepositoryScanner;
use crate::{Error, Result};

/// What one cycle detected and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: Vec<DriftEvent>,
    pub cascade: CascadeReport,
}

impl CycleReport {
    /// Nothing drifted.
    pub fn is_idle(&self) -> bool {
        self.events.is_empty()
    }
}

struct State<B> {
    backend: B,
    scanner: RepositoryScanner,
}

/// Runs release cycles and operator requests against one repository.
pub struct Orchestrator<B: VcsBackend> {
    state: Mutex<State<B>>,
    config: CascadeConfig,
    resolvers: ResolverRegistry,
    cipher: Box<dyn Cipher>,
    lock_path: Option<PathBuf>,
}

impl<B: VcsBackend> Orchestrator<B> {
    /// Orchestrator with the built-in resolvers and no encryption.
    pub fn new(backend: B, config: CascadeConfig) -> Self {
        let resolvers = ResolverRegistry::with_defaults(config.parameter_options());
        Self {
            state: Mutex::new(State {
                backend,
                scanner: RepositoryScanner::new(),
            }),
            config,
            resolvers,
            cipher: Box::new(PlainCipher),
            lock_path: None,
        }
    }

    pub fn with_cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Box::new(cipher);
        self
    }

    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Also hold an advisory lock on `path` during mutating operations.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Pull, detect drift under the configured release policy, cascade and
    /// push.
    pub fn run_cycle(&self) -> Result<CycleReport> {
        let scope = SecondaryScope {
            depth: self.config.secondary_depth,
            release: None,
        };
        self.exclusive(|state| self.cycle(state, true, &scope))
    }

    /// Like [`run_cycle`](Self::run_cycle), but only looks for hotfixes and
    /// drifted environments, optionally on a single release.
    pub fn check_hotfixes(&self, release: Option<u32>) -> Result<CycleReport> {
        let scope = match release {
            Some(version) => SecondaryScope::release(version),
            None => SecondaryScope::all(),
        };
        self.exclusive(|state| self.cycle(state, false, &scope))
    }

    /// Add an environment to the latest patch of the latest release.
    pub fn add_environment(&self, name: &str, copy_from: Option<&str>) -> Result<CascadeReport> {
        self.exclusive(|state| {
            let tree = state.scanner.rescan(&state.backend)?.clone();
            let settings = self.config.merge_settings();
            let report = BranchCascade::new(
                &mut state.backend,
                MergeCycle::new(&settings, &self.resolvers, self.cipher.as_ref()),
            )
            .add_environment(&tree, name, copy_from)?;
            state.scanner.invalidate();
            self.push(state)?;
            Ok(report)
        })
    }

    /// The merge result stored at the tip of an environment branch.
    pub fn merge_result(&self, branch: &str) -> Result<Option<MergeResult>> {
        let state = self.state()?;
        let tip = environment_tip(&state.backend, branch)?;
        read_merge_result(
            &state.backend,
            &self.config.merge.result_file,
            &tip,
            self.cipher.as_ref(),
        )
    }

    /// Store an edited merge result on an environment branch as its next
    /// release candidate.
    pub fn submit_merge_result(&self, branch: &str, result: MergeResult) -> Result<MergeOutcome> {
        let target = environment_target(branch)?;
        self.exclusive(|state| {
            let tree = state.scanner.rescan(&state.backend)?;
            let candidate = tree
                .environment(target.release, target.patch, &target.environment)
                .filter(|e| e.target.is_some())
                .ok_or_else(|| Error::UnknownEnvironment {
                    branch: branch.to_string(),
                })?
                .next_candidate()?;

            let settings = self.config.merge_settings();
            let outcome = MergeCycle::new(&settings, &self.resolvers, self.cipher.as_ref()).submit(
                &mut state.backend,
                &target,
                candidate,
                result,
            )?;
            state.scanner.invalidate();
            self.push(state)?;
            Ok(outcome)
        })
    }

    /// First lines of the commits on release `version` that are not on the
    /// release before it, newest first.
    pub fn release_notes(&self, version: u32) -> Result<Vec<String>> {
        let mut state = self.state()?;
        let state = &mut *state;
        let tree = state.scanner.rescan(&state.backend)?;
        let release = tree
            .release(version)
            .filter(|r| r.target.is_some())
            .ok_or(Error::UnknownRelease { version })?;
        let previous = tree
            .previous_release(version)
            .filter(|r| r.target.is_some())
            .map(|r| r.branch());

        let commits = state
            .backend
            .log_between(&release.branch(), previous.as_deref())?;
        Ok(commits.into_iter().map(|c| c.message).collect())
    }

    /// A fresh scan of the repository.
    pub fn tree(&self) -> Result<ReferenceTree> {
        let mut state = self.state()?;
        let state = &mut *state;
        Ok(state.scanner.rescan(&state.backend)?.clone())
    }

    /// Consume the orchestrator and hand back the backend.
    pub fn into_backend(self) -> Result<B> {
        let state = self.state.into_inner().map_err(|_| Error::LockPoisoned)?;
        Ok(state.backend)
    }

    fn state(&self) -> Result<MutexGuard<'_, State<B>>> {
        self.state.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `operation` holding both locks, then check out the main branch
    /// again.
    fn exclusive<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut State<B>) -> Result<T>,
    {
        let mut state = self.state()?;
        let _lock = match &self.lock_path {
            Some(path) => Some(RepositoryLock::acquire(path)?),
            None => None,
        };
        let state = &mut *state;
        let main = self.config.main_branch.as_str();

        state.backend.checkout(main)?;
        let outcome = operation(state);
        let restored = state.backend.checkout(main);
        match (outcome, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore)) => {
                tracing::error!(branch = %main, error = %restore, "Failed to restore checkout");
                Err(e)
            }
        }
    }

    fn cycle(&self, state: &mut State<B>, primary: bool, scope: &SecondaryScope) -> Result<CycleReport> {
        if let Some(remote) = &self.config.remote {
            let include_tags = self.config.release_policy == ReleasePolicy::VersionTags;
            tracing::info!(remote = %remote, include_tags, "Pulling");
            state.backend.pull(remote, include_tags)?;
        }

        let mut tree = state.scanner.rescan(&state.backend)?.clone();
        let events = {
            let detector = DriftDetector::new(&state.backend, &tree);
            let mut events = Vec::new();
            if primary {
                match self.config.release_policy {
                    ReleasePolicy::Primary => match detector.primary(&self.config.main_branch) {
                        Ok(event) => events.extend(event),
                        Err(e @ Error::VersionOverflow { .. }) => {
                            tracing::warn!(error = %e, "No new release possible");
                        }
                        Err(e) => return Err(e),
                    },
                    ReleasePolicy::VersionTags => events.extend(detector.version_tags()),
                }
            }
            events.extend(detector.secondary(scope));
            events
        };

        let settings = self.config.merge_settings();
        let mut cascade = CascadeReport::default();
        for event in &events {
            tracing::info!(event = %event, "Applying drift");
            let applied = BranchCascade::new(
                &mut state.backend,
                MergeCycle::new(&settings, &self.resolvers, self.cipher.as_ref()),
            )
            .apply(&tree, event)?;
            cascade.extend(applied);
            tree = state.scanner.rescan(&state.backend)?.clone();
        }

        if !events.is_empty() {
            self.push(state)?;
        }
        tracing::info!(
            events = events.len(),
            branches = cascade.created_branches.len(),
            candidates = cascade.candidates.len(),
            failures = cascade.failures.len(),
            "Cycle finished"
        );
        Ok(CycleReport { events, cascade })
    }

    fn push(&self, state: &mut State<B>) -> Result<()> {
        if !self.config.push {
            return Ok(());
        }
        match &self.config.remote {
            Some(remote) => {
                tracing::info!(remote = %remote, "Pushing branches and tags");
                state.backend.push(remote, true)?;
            }
            None => tracing::warn!("Push requested without a remote, skipping"),
        }
        Ok(())
    }
}

fn environment_target(branch: &str) -> Result<MergeTarget> {
    match RefName::parse_ref(branch)? {
        RefName::Environment {
            release,
            patch,
            name,
        } => Ok(MergeTarget::new(release, patch, name)),
        _ => Err(Error::UnknownEnvironment {
            branch: branch.to_string(),
        }),
    }
}

fn environment_tip(backend: &dyn VcsBackend, branch: &str) -> Result<String> {
    let target = environment_target(branch)?;
    backend
        .resolve(&target.branch())?
        .map(|c| c.id)
        .ok_or_else(|| Error::UnknownEnvironment {
            branch: branch.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeState;
    use cascade_git::MemoryBackend;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = "[[fields]]\nname = \"host\"\nenvironment_specific = true\n";

    fn backend() -> MemoryBackend {
        let mut backend = MemoryBackend::init("master");
        backend
            .commit_on(
                "master",
                "Database",
                &[
                    ("db/node.toml", "manager = \"config\"\n"),
                    ("db/schema.toml", SCHEMA),
                    ("db/config.json", "{\"host\": \"dev-db\"}"),
                ],
            )
            .unwrap();
        backend
    }

    fn orchestrator(backend: MemoryBackend) -> Orchestrator<MemoryBackend> {
        let config = CascadeConfig {
            project: "shop".to_string(),
            ..CascadeConfig::default()
        };
        Orchestrator::new(backend, config)
    }

    #[test]
    fn test_first_cycle_creates_release() {
        let orchestrator = orchestrator(backend());

        let report = orchestrator.run_cycle().unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.cascade.created_branches, vec!["r1", "r1.0"]);

        let backend = orchestrator.into_backend().unwrap();
        assert_eq!(backend.current_branch().unwrap(), "master");
    }

    #[test]
    fn test_second_cycle_without_commits_is_idle() {
        let orchestrator = orchestrator(backend());
        orchestrator.run_cycle().unwrap();
        orchestrator.add_environment("dev", None).unwrap();

        let report = orchestrator.run_cycle().unwrap();
        assert!(report.is_idle());
        assert!(report.cascade.is_empty());
    }

    #[test]
    fn test_environment_commit_triggers_remerge() {
        let orchestrator = orchestrator(backend());
        orchestrator.run_cycle().unwrap();
        orchestrator.add_environment("dev", None).unwrap();

        let mut backend = orchestrator.into_backend().unwrap();
        backend.advance_clock(Duration::hours(1));
        backend
            .commit_on("r1.0-dev", "Tune", &[("db/config.json", "{\"host\": \"dev-db-2\"}")])
            .unwrap();
        let orchestrator = self::orchestrator(backend);

        let report = orchestrator.run_cycle().unwrap();
        assert_eq!(
            report.events,
            vec![DriftEvent::Remerge {
                release: 1,
                patch: 0,
                environment: "dev".to_string(),
            }]
        );
        assert_eq!(report.cascade.candidates, vec!["r1.0-dev-RC2"]);
    }

    #[test]
    fn test_merge_result_round_trip_through_submit() {
        let orchestrator = orchestrator(backend());
        orchestrator.run_cycle().unwrap();
        orchestrator.add_environment("dev", None).unwrap();

        let mut result = orchestrator.merge_result("r1.0-dev").unwrap().unwrap();
        assert_eq!(result.state, Some(MergeState::Succeeded));
        result
            .entry_mut("shop.db")
            .unwrap()
            .parameter_mut("host")
            .unwrap()
            .current = Some("curated".to_string());

        let outcome = orchestrator
            .submit_merge_result("refs/heads/r1.0-dev", result)
            .unwrap();
        assert_eq!(outcome.tag, "r1.0-dev-RC2");

        let stored = orchestrator.merge_result("r1.0-dev").unwrap().unwrap();
        let host = stored.entry("shop.db").unwrap().parameter("host").unwrap();
        assert_eq!(host.current.as_deref(), Some("curated"));
    }

    #[test]
    fn test_operator_errors() {
        let orchestrator = orchestrator(backend());
        assert!(matches!(
            orchestrator.add_environment("dev", None),
            Err(Error::NoRelease)
        ));
        assert!(matches!(
            orchestrator.merge_result("r1.0"),
            Err(Error::UnknownEnvironment { .. })
        ));
        assert!(matches!(
            orchestrator.submit_merge_result("r9.0-dev", MergeResult::default()),
            Err(Error::UnknownEnvironment { .. })
        ));
        assert!(matches!(
            orchestrator.release_notes(4),
            Err(Error::UnknownRelease { version: 4 })
        ));
    }

    #[test]
    fn test_release_notes_exclude_previous_release() {
        let mut backend = backend();
        backend.create_branch("r1", "master").unwrap();
        backend.commit_on("master", "Add search", &[("search.txt", "1")]).unwrap();
        backend.commit_on("master", "Fix typo", &[("search.txt", "2")]).unwrap();
        backend.create_branch("r2", "master").unwrap();

        let notes = orchestrator(backend).release_notes(2).unwrap();
        assert_eq!(notes, vec!["Fix typo", "Add search"]);
    }

    #[test]
    fn test_exhausted_release_numbers_still_check_hotfixes() {
        let mut backend = backend();
        backend.create_branch("r4294967295", "master").unwrap();
        backend.commit_on("master", "Feature", &[("feature.txt", "1")]).unwrap();

        let report = orchestrator(backend).run_cycle().unwrap();
        assert_eq!(report.cascade.created_branches, vec!["r4294967295.0"]);
    }

    #[test]
    fn test_version_tag_policy() {
        let mut backend = backend();
        backend.create_tag("v3", "master").unwrap();
        let config = CascadeConfig {
            project: "shop".to_string(),
            release_policy: ReleasePolicy::VersionTags,
            remote: Some("origin".to_string()),
            push: true,
            ..CascadeConfig::default()
        };
        let orchestrator = Orchestrator::new(backend, config);

        let report = orchestrator.run_cycle().unwrap();
        assert_eq!(report.cascade.created_branches, vec!["r3", "r3.0"]);

        let backend = orchestrator.into_backend().unwrap();
        assert!(backend.pulls()[0].include_tags);
        assert_eq!(backend.pushes().len(), 1);
    }

    #[test]
    fn test_pull_failure_is_fatal_and_restores_checkout() {
        let mut backend = backend();
        backend.fail_next_pull("remote rejected");
        let config = CascadeConfig {
            remote: Some("origin".to_string()),
            ..CascadeConfig::default()
        };
        let orchestrator = Orchestrator::new(backend, config);

        assert!(matches!(orchestrator.run_cycle(), Err(Error::Git(_))));
        let backend = orchestrator.into_backend().unwrap();
        assert_eq!(backend.current_branch().unwrap(), "master");
        assert_eq!(backend.list_branches().unwrap().len(), 1);
    }

    #[test]
    fn test_check_hotfixes_targets_one_release() {
        let orchestrator = orchestrator(backend());
        orchestrator.run_cycle().unwrap();

        let mut backend = orchestrator.into_backend().unwrap();
        backend.advance_clock(Duration::hours(1));
        backend.commit_on("r1", "Hotfix", &[("fix.txt", "1")]).unwrap();
        let orchestrator = self::orchestrator(backend);

        assert!(orchestrator.check_hotfixes(Some(2)).unwrap().is_idle());
        let report = orchestrator.check_hotfixes(Some(1)).unwrap();
        assert_eq!(report.cascade.created_branches, vec!["r1.1"]);
    }
}
