//! Release lifecycle scenarios
//!
//! Each test drives an [`Orchestrator`] through several cycles the way a
//! scheduler would, committing between cycles like developers and operators
//! do, and checks the resulting reference tree and merge results.

use cascade_core::{CascadeConfig, MergeResult, MergeState, Orchestrator, ReleasePolicy};
use cascade_git::{LocalRepository, MemoryBackend, VcsBackend};
use cascade_test_utils::git::GitFixture;
use cascade_test_utils::nodes::ConfigArtifact;
use pretty_assertions::assert_eq;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn config() -> CascadeConfig {
    CascadeConfig {
        project: "shop".to_string(),
        ..CascadeConfig::default()
    }
}

fn database() -> ConfigArtifact {
    ConfigArtifact::new("db")
        .host("db.internal")
        .servers(&["http://a", "http://b"])
}

fn shop() -> GitFixture {
    let mut fixture = GitFixture::new("master");
    fixture.commit("master", "Add database config", &database().files());
    fixture
}

fn on_disk(fixture: &GitFixture, config: CascadeConfig) -> Orchestrator<LocalRepository> {
    Orchestrator::new(LocalRepository::open(fixture.root()).unwrap(), config)
}

/// `(parameter, current)` pairs of one entry, for comparisons across backends.
fn currents(result: &MergeResult, entry_id: &str) -> Vec<(String, Option<String>)> {
    result
        .entry(entry_id)
        .unwrap()
        .parameters
        .iter()
        .map(|p| (p.name.clone(), p.current.clone()))
        .collect()
}

fn set_current(result: &mut MergeResult, parameter: &str, value: &str) {
    result
        .entry_mut("shop.db")
        .unwrap()
        .parameter_mut(parameter)
        .unwrap()
        .current = Some(value.to_string());
}

// =============================================================================
// Scenarios
// =============================================================================

/// Release, hotfix and next release, with two environments carried along.
#[test]
fn test_release_hotfix_and_next_release() {
    let mut fixture = shop();
    let orchestrator = on_disk(&fixture, config());

    orchestrator.run_cycle().unwrap();
    orchestrator.add_environment("dev", None).unwrap();
    orchestrator.add_environment("qa", Some("dev")).unwrap();

    let mut qa = orchestrator.merge_result("r1.0-qa").unwrap().unwrap();
    set_current(&mut qa, "host", "qa-db.internal");
    orchestrator.submit_merge_result("r1.0-qa", qa).unwrap();

    fixture.commit_later("r1", "Fix connection leak", &[("fix.txt", "1")]);
    let hotfix = orchestrator.run_cycle().unwrap();
    assert_eq!(
        hotfix.cascade.created_branches,
        vec!["r1.1", "r1.1-dev", "r1.1-qa"]
    );

    fixture.commit_later("master", "Add search", &[("search.txt", "on")]);
    let release = orchestrator.run_cycle().unwrap();
    assert_eq!(
        release.cascade.created_branches,
        vec!["r2", "r2.0", "r2.0-dev", "r2.0-qa"]
    );
    assert!(release.cascade.failures.is_empty());

    assert_eq!(
        orchestrator.tree().unwrap().to_string(),
        "r1 { p0 { dev: [RC1], qa: [RC1, RC2] } p1 { dev: [RC1], qa: [RC1] } }\n\
         r2 { p0 { dev: [RC1], qa: [RC1] } }\n"
    );

    // the curated qa value travels r1.0-qa -> r1.1-qa -> r2.0-qa
    let inherited = orchestrator.merge_result("r2.0-qa").unwrap().unwrap();
    let host = inherited.entry("shop.db").unwrap().parameter("host").unwrap();
    assert_eq!(host.current.as_deref(), Some("qa-db.internal"));
    assert_eq!(host.raw.as_deref(), Some("db.internal"));
    assert!(!host.changed);

    assert!(orchestrator.run_cycle().unwrap().is_idle());
    assert_eq!(orchestrator.release_notes(2).unwrap(), vec!["Add search"]);
}

/// Removing a list element keeps the parameter of the removed index.
#[test]
fn test_shrinking_list_keeps_element_parameters() {
    let mut fixture = shop();
    let orchestrator = on_disk(&fixture, config());
    orchestrator.run_cycle().unwrap();
    orchestrator.add_environment("dev", None).unwrap();

    let shrunk = database().version("2").servers(&["http://a"]);
    fixture.commit_later("r1.0-dev", "Drop server b", &shrunk.files());
    let report = orchestrator.run_cycle().unwrap();
    assert_eq!(report.cascade.candidates, vec!["r1.0-dev-RC2"]);

    let result = orchestrator.merge_result("r1.0-dev").unwrap().unwrap();
    let entry = result.entry("shop.db").unwrap();
    let second = entry.parameter("servers[1]/url").unwrap();
    assert_eq!(second.current.as_deref(), Some("http://b"));
    assert!(entry.parameter("servers[0]/url").is_some());
}

/// An artifact that cannot be resolved fails its entry, not the cycle.
#[test]
fn test_broken_artifact_fails_only_its_entry() {
    let mut fixture = shop();
    fixture.commit(
        "master",
        "Add cache config",
        &[
            ("cache/node.toml", "manager = \"config\"\n"),
            ("cache/config.json", "{\"size\": 1}"),
        ],
    );
    let orchestrator = on_disk(&fixture, config());
    orchestrator.run_cycle().unwrap();
    let report = orchestrator.add_environment("dev", None).unwrap();
    assert_eq!(report.candidates, vec!["r1.0-dev-RC1"]);

    let result = orchestrator.merge_result("r1.0-dev").unwrap().unwrap();
    assert_eq!(
        result.entry("shop.cache").unwrap().state,
        MergeState::Failed
    );
    assert!(result.entry("shop.cache").unwrap().error_log.is_some());
    assert_eq!(
        result.entry("shop.db").unwrap().state,
        MergeState::Succeeded
    );
    // no distinct aggregate for partial failure
    assert_eq!(result.state, Some(MergeState::Pending));
}

/// Under the version tag policy only `v<N>` tags start releases.
#[test]
fn test_version_tags_start_releases() {
    let mut fixture = shop();
    let config = CascadeConfig {
        release_policy: ReleasePolicy::VersionTags,
        ..config()
    };
    let orchestrator = on_disk(&fixture, config);

    assert!(orchestrator.run_cycle().unwrap().is_idle());

    fixture.commit("master", "Ship it", &[("ship.txt", "1")]);
    fixture.tag("v5", "master");
    let report = orchestrator.run_cycle().unwrap();
    assert_eq!(report.cascade.created_branches, vec!["r5", "r5.0"]);
    assert!(orchestrator.run_cycle().unwrap().is_idle());
}

/// The in-memory backend and a real repository agree on the outcome.
#[test]
fn test_memory_backend_matches_repository() {
    let mut memory = MemoryBackend::init("master");
    memory
        .commit_on("master", "Add database config", &database().files())
        .unwrap();
    let fixture = shop();

    let in_memory = Orchestrator::new(memory, config());
    let disk = on_disk(&fixture, config());
    for orchestrator in [&in_memory as &dyn Scenario, &disk as &dyn Scenario] {
        orchestrator.play();
    }

    assert_eq!(
        in_memory.tree().unwrap().to_string(),
        disk.tree().unwrap().to_string()
    );
    let memory_result = in_memory.merge_result("r1.0-qa").unwrap().unwrap();
    let disk_result = disk.merge_result("r1.0-qa").unwrap().unwrap();
    assert_eq!(
        currents(&memory_result, "shop.db"),
        currents(&disk_result, "shop.db")
    );

    let backend = in_memory.into_backend().unwrap();
    assert_eq!(backend.current_branch().unwrap(), "master");
}

/// Operator steps shared by the backend comparison.
trait Scenario {
    fn play(&self);
}

impl<B: VcsBackend> Scenario for Orchestrator<B> {
    fn play(&self) {
        self.run_cycle().unwrap();
        self.add_environment("dev", None).unwrap();
        let mut dev = self.merge_result("r1.0-dev").unwrap().unwrap();
        set_current(&mut dev, "password", "dev-secret");
        self.submit_merge_result("r1.0-dev", dev).unwrap();
        self.add_environment("qa", Some("dev")).unwrap();
    }
}
