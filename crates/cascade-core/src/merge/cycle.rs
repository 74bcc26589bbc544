//! One merge of an environment branch against its predecessor

use chrono::Utc;

use cascade_git::{CommitInfo, Signature, VcsBackend};

use super::artifact::{Artifact, discover, read_node};
use super::context::{MergeContext, TreeReader};
use super::model::{MergeEntry, MergeResult, MergeState};
use super::resolver::ResolverRegistry;
use crate::build::{BuildInformation, external_dependencies};
use crate::persist::{Cipher, encode_build_information, encode_merge_result, read_merge_result};
use crate::refs::RefName;
use crate::{Error, Result};

/// Where merge records are written and who commits them.
#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// Prefix of every entry id
    pub project: String,
    pub result_file: String,
    pub build_file: String,
    pub author: Signature,
}

/// The environment branch being merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTarget {
    pub release: u32,
    pub patch: u32,
    pub environment: String,
    /// Branch whose merge result supplies the curated values
    pub predecessor: Option<String>,
}

impl MergeTarget {
    pub fn new(release: u32, patch: u32, environment: impl Into<String>) -> Self {
        Self {
            release,
            patch,
            environment: environment.into(),
            predecessor: None,
        }
    }

    pub fn with_predecessor(mut self, branch: impl Into<String>) -> Self {
        self.predecessor = Some(branch.into());
        self
    }

    pub fn branch(&self) -> String {
        RefName::environment(self.release, self.patch, &self.environment).to_string()
    }

    pub fn candidate_tag(&self, candidate: u32) -> String {
        RefName::candidate(self.release, self.patch, &self.environment, candidate).to_string()
    }
}

/// What a merge committed.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub result: MergeResult,
    pub candidate: u32,
    pub tag: String,
    pub commit: CommitInfo,
}

/// Runs the resolvers over an environment branch and records the outcome as a
/// new release candidate.
pub struct MergeCycle<'a> {
    settings: &'a MergeSettings,
    resolvers: &'a ResolverRegistry,
    cipher: &'a dyn Cipher,
}

impl<'a> MergeCycle<'a> {
    pub fn new(
        settings: &'a MergeSettings,
        resolvers: &'a ResolverRegistry,
        cipher: &'a dyn Cipher,
    ) -> Self {
        Self {
            settings,
            resolvers,
            cipher,
        }
    }

    /// Merge `target`, commit the records and tag candidate `candidate`.
    ///
    /// The working result starts from the one stored on the branch itself, so
    /// parameters are never dropped. Leaves the environment branch checked out.
    pub fn run(
        &self,
        backend: &mut dyn VcsBackend,
        target: &MergeTarget,
        candidate: u32,
    ) -> Result<MergeOutcome> {
        let branch = target.branch();
        backend.checkout(&branch)?;
        let tip = require_branch(&*backend, &branch)?;

        let mut result = read_merge_result(&*backend, &self.settings.result_file, &tip.id, self.cipher)?
            .unwrap_or_default();
        result.started = Some(Utc::now());

        let previous_commit = match &target.predecessor {
            Some(predecessor) => Some(require_branch(&*backend, predecessor)?),
            None => None,
        };
        let previous = match &previous_commit {
            Some(commit) => {
                read_merge_result(&*backend, &self.settings.result_file, &commit.id, self.cipher)?
            }
            None => None,
        };

        let artifacts = discover(&*backend, &tip.id, &self.settings.project)?;
        for artifact in &artifacts {
            let Some(resolver) = self.resolvers.get(artifact) else {
                tracing::debug!(artifact = %artifact.id, manager = ?artifact.manager(), "No resolver");
                continue;
            };
            let index = entry_index(&mut result, &artifact.id);
            let entry = &mut result.entries[index];
            entry.state = MergeState::Pending;
            entry.error_log = None;
            entry.description = artifact.node.description.clone();
            entry.summary = artifact.node.summary.clone();
            entry.tags = artifact.node.tags.clone();
            entry.comment = artifact.node.comment.clone();
            entry.created = artifact.node.created;
            entry.modified = artifact.node.last_modified;
            entry.changed = match &previous_commit {
                Some(commit) => match read_node(&*backend, &commit.id, &artifact.dir) {
                    Ok(Some(old)) => artifact.node.differs_from(&old),
                    _ => true,
                },
                None => true,
            };

            let previous_entry = previous.as_ref().and_then(|r| r.entry(&artifact.id));
            let mut context = MergeContext::new(
                artifact,
                entry,
                previous_entry,
                TreeReader::new(&*backend, Some(tip.id.as_str())),
                TreeReader::new(&*backend, previous_commit.as_ref().map(|c| c.id.as_str())),
            );
            let outcome = resolver.resolve(artifact, &mut context);
            let log = context.finish();

            let entry = &mut result.entries[index];
            entry.log = log;
            match outcome {
                Ok(()) => entry.state = MergeState::Succeeded,
                Err(e) => {
                    tracing::warn!(branch = %branch, artifact = %artifact.id, error = %e, "Artifact merge failed");
                    entry.state = MergeState::Failed;
                    entry.error_log = Some(e.to_string());
                }
            }
        }

        result.state = Some(result.aggregate_state());
        result.stopped = Some(Utc::now());
        self.commit_result(backend, target, candidate, result, &artifacts)
    }

    /// Store an externally edited result on `target` as a new candidate.
    pub fn submit(
        &self,
        backend: &mut dyn VcsBackend,
        target: &MergeTarget,
        candidate: u32,
        result: MergeResult,
    ) -> Result<MergeOutcome> {
        let branch = target.branch();
        backend.checkout(&branch)?;
        let tip = require_branch(&*backend, &branch)?;
        let artifacts = discover(&*backend, &tip.id, &self.settings.project)?;
        self.commit_result(backend, target, candidate, result, &artifacts)
    }

    fn commit_result(
        &self,
        backend: &mut dyn VcsBackend,
        target: &MergeTarget,
        candidate: u32,
        result: MergeResult,
        artifacts: &[Artifact],
    ) -> Result<MergeOutcome> {
        let mut candidate = candidate.max(1);
        while backend.tag_exists(&target.candidate_tag(candidate))? {
            candidate = candidate.checked_add(1).ok_or_else(|| Error::VersionOverflow {
                name: target.candidate_tag(candidate),
            })?;
        }
        let tag = target.candidate_tag(candidate);

        let build = BuildInformation {
            release: target.release,
            patch: target.patch,
            rc: candidate,
            environment: target.environment.clone(),
            tag: tag.clone(),
            built: Some(Utc::now()),
            dependencies: external_dependencies(artifacts),
        };
        backend.write_file(
            &self.settings.result_file,
            &encode_merge_result(&result, self.cipher)?,
        )?;
        backend.write_file(&self.settings.build_file, &encode_build_information(&build)?)?;
        backend.add_all()?;
        let commit = backend.commit(&format!("Merged for RC{candidate}"), &self.settings.author)?;
        backend.create_tag(&tag, &commit.id)?;

        tracing::info!(
            tag = %tag,
            commit = %commit.short_id(),
            state = ?result.state,
            "Created release candidate"
        );
        Ok(MergeOutcome {
            result,
            candidate,
            tag,
            commit,
        })
    }
}

fn require_branch(backend: &dyn VcsBackend, branch: &str) -> Result<CommitInfo> {
    backend
        .resolve(branch)?
        .ok_or_else(|| Error::Git(cascade_git::Error::BranchNotFound {
            name: branch.to_string(),
        }))
}

fn entry_index(result: &mut MergeResult, entry_id: &str) -> usize {
    match result.entries.iter().position(|e| e.entry_id == entry_id) {
        Some(index) => index,
        None => {
            result.entries.push(MergeEntry::new(entry_id));
            result.entries.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ConfigFileResolver, ParameterOptions};
    use crate::persist::PlainCipher;
    use cascade_git::MemoryBackend;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = "[[fields]]\nname = \"host\"\nenvironment_specific = true\n";

    fn settings() -> MergeSettings {
        MergeSettings {
            project: "shop".to_string(),
            result_file: "merge-result.json".to_string(),
            build_file: "build.json".to_string(),
            author: Signature::new("cascade", "cascade@localhost"),
        }
    }

    fn node(version: &str) -> String {
        format!("manager = \"config\"\nversion = \"{version}\"\nreferences = [\"platform.auth\"]\n")
    }

    fn backend_with(host: &str) -> MemoryBackend {
        let mut backend = MemoryBackend::init("master");
        let v1 = node("1");
        let config = format!("{{\"host\": \"{host}\"}}");
        backend
            .commit_on(
                "master",
                "Database",
                &[
                    ("db/node.toml", v1.as_str()),
                    ("db/schema.toml", SCHEMA),
                    ("db/config.json", config.as_str()),
                    ("broken/node.toml", "manager = \"config\"\n"),
                ],
            )
            .unwrap();
        backend.create_branch("r1.0-dev", "master").unwrap();
        backend
    }

    #[test]
    fn test_run_commits_records_and_tags_candidate() {
        let settings = settings();
        let resolvers = ResolverRegistry::with_defaults(ParameterOptions::default());
        let mut backend = backend_with("dev-db");

        let outcome = MergeCycle::new(&settings, &resolvers, &PlainCipher)
            .run(&mut backend, &MergeTarget::new(1, 0, "dev"), 1)
            .unwrap();

        assert_eq!(outcome.tag, "r1.0-dev-RC1");
        assert!(backend.tag_exists("r1.0-dev-RC1").unwrap());
        assert_eq!(backend.current_branch().unwrap(), "r1.0-dev");
        assert_eq!(outcome.commit.message, "Merged for RC1");

        let db = outcome.result.entry("shop.db").unwrap();
        assert_eq!(db.state, MergeState::Succeeded);
        assert!(db.changed);
        assert_eq!(db.parameter("host").unwrap().current.as_deref(), Some("dev-db"));

        // no schema.toml: failed, yet the candidate is minted
        let broken = outcome.result.entry("shop.broken").unwrap();
        assert_eq!(broken.state, MergeState::Failed);
        assert!(broken.error_log.as_deref().unwrap().contains("missing schema.toml"));
        assert_eq!(outcome.result.state, Some(MergeState::Pending));

        let build = backend
            .read_blob_at_commit("build.json", &outcome.commit.id)
            .unwrap()
            .unwrap();
        let build = crate::persist::decode_build_information(&build).unwrap();
        assert_eq!(build.rc, 1);
        assert_eq!(build.dependencies, vec!["platform.auth"]);
    }

    #[test]
    fn test_run_inherits_from_predecessor() {
        let settings = settings();
        let resolvers = ResolverRegistry::with_defaults(ParameterOptions::default());
        let mut backend = backend_with("dev-db");
        let cycle = MergeCycle::new(&settings, &resolvers, &PlainCipher);

        // operator curated the value on r1.0-dev
        let mut first = cycle
            .run(&mut backend, &MergeTarget::new(1, 0, "dev"), 1)
            .unwrap()
            .result;
        first.entry_mut("shop.db").unwrap().parameter_mut("host").unwrap().current =
            Some("prod-db".to_string());
        cycle
            .submit(&mut backend, &MergeTarget::new(1, 0, "dev"), 2, first)
            .unwrap();

        backend
            .commit_on("master", "New host", &[("db/config.json", "{\"host\": \"dev-db-2\"}")])
            .unwrap();
        backend.create_branch("r2.0-dev", "master").unwrap();

        let target = MergeTarget::new(2, 0, "dev").with_predecessor("r1.0-dev");
        let outcome = cycle.run(&mut backend, &target, 1).unwrap();
        let host = outcome.result.entry("shop.db").unwrap().parameter("host").unwrap();
        assert_eq!(host.current.as_deref(), Some("prod-db"));
        assert_eq!(host.previous.as_deref(), Some("prod-db"));
        assert_eq!(host.raw.as_deref(), Some("dev-db-2"));
        assert!(host.changed);
        // the descriptor did not change between the two commits
        assert!(!outcome.result.entry("shop.db").unwrap().changed);
    }

    /// Upserts one fixed parameter, or fails, without touching the entry's tags.
    struct FixedResolver {
        fail: bool,
    }

    impl crate::merge::ArtifactResolver for FixedResolver {
        fn resolve(&self, artifact: &Artifact, context: &mut MergeContext<'_>) -> Result<()> {
            if self.fail {
                return Err(Error::Artifact {
                    artifact: artifact.id.clone(),
                    message: "unreachable service".to_string(),
                });
            }
            context.parameter(crate::merge::ParameterSpec::new("endpoint").raw("http://svc"))?;
            Ok(())
        }
    }

    #[test]
    fn test_entries_carry_node_tags_whatever_the_resolver() {
        let settings = settings();
        let mut resolvers = ResolverRegistry::new();
        resolvers.register("service", FixedResolver { fail: false });
        resolvers.register("flaky", FixedResolver { fail: true });

        let mut backend = MemoryBackend::init("master");
        backend
            .commit_on(
                "master",
                "Services",
                &[
                    ("api/node.toml", "manager = \"service\"\ntags = [\"edge\", \"public\"]\n"),
                    ("queue/node.toml", "manager = \"flaky\"\ntags = [\"async\"]\n"),
                ],
            )
            .unwrap();
        backend.create_branch("r1.0-dev", "master").unwrap();

        let outcome = MergeCycle::new(&settings, &resolvers, &PlainCipher)
            .run(&mut backend, &MergeTarget::new(1, 0, "dev"), 1)
            .unwrap();

        let api = outcome.result.entry("shop.api").unwrap();
        assert_eq!(api.state, MergeState::Succeeded);
        assert_eq!(api.tags, vec!["edge", "public"]);
        let queue = outcome.result.entry("shop.queue").unwrap();
        assert_eq!(queue.state, MergeState::Failed);
        assert_eq!(queue.tags, vec!["async"]);
    }

    #[test]
    fn test_existing_candidate_tag_is_skipped() {
        let settings = settings();
        let resolvers = ResolverRegistry::new();
        let mut backend = backend_with("dev-db");
        backend.create_tag("r1.0-dev-RC1", "master").unwrap();

        let outcome = MergeCycle::new(&settings, &resolvers, &PlainCipher)
            .run(&mut backend, &MergeTarget::new(1, 0, "dev"), 1)
            .unwrap();

        assert_eq!(outcome.candidate, 2);
        assert!(outcome.result.entries.is_empty());
        assert_eq!(outcome.result.state, Some(MergeState::Succeeded));
    }

    #[test]
    fn test_missing_branch_is_an_error() {
        let settings = settings();
        let resolvers = ResolverRegistry::new();
        let mut backend = MemoryBackend::init("master");
        let result = MergeCycle::new(&settings, &resolvers, &PlainCipher).run(
            &mut backend,
            &MergeTarget::new(1, 0, "qa"),
            1,
        );
        assert!(result.is_err());
    }
}
