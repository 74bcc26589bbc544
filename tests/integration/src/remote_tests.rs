//! Cycles against a shared remote
//!
//! A bare repository plays the central server. The orchestrator's
//! repository pulls from and pushes to it while a colleague's clone pushes
//! new work in between.

use cascade_core::{CascadeConfig, Error, Orchestrator};
use cascade_git::{LocalRepository, VcsBackend};
use cascade_test_utils::git::GitFixture;
use cascade_test_utils::nodes::ConfigArtifact;
use pretty_assertions::assert_eq;

fn shop() -> GitFixture {
    let mut fixture = GitFixture::new("master");
    let db = ConfigArtifact::new("db").host("db.internal");
    fixture.commit("master", "Add database config", &db.files());
    fixture
}

fn connected(fixture: &GitFixture) -> Orchestrator<LocalRepository> {
    let config = CascadeConfig {
        project: "shop".to_string(),
        remote: Some("origin".to_string()),
        push: true,
        ..CascadeConfig::default()
    };
    Orchestrator::new(LocalRepository::open(fixture.root()).unwrap(), config)
}

fn remote_has(remote: &git2::Repository, reference: &str) -> bool {
    remote.find_reference(reference).is_ok()
}

#[test]
fn test_cycle_publishes_and_picks_up_remote_work() {
    let fixture = shop();
    let origin = fixture.add_bare_remote("origin");
    let orchestrator = connected(&fixture);

    orchestrator.run_cycle().unwrap();
    orchestrator.add_environment("dev", None).unwrap();

    let remote = git2::Repository::open_bare(origin.path()).unwrap();
    assert!(remote_has(&remote, "refs/heads/r1.0-dev"));
    assert!(remote_has(&remote, "refs/tags/r1.0-dev-RC1"));

    let mut colleague = GitFixture::clone_of(origin.path());
    colleague.commit("master", "Add search", &[("search.txt", "on")]);
    colleague.push("origin", "master");

    let report = orchestrator.run_cycle().unwrap();
    assert_eq!(
        report.cascade.created_branches,
        vec!["r2", "r2.0", "r2.0-dev"]
    );
    assert!(remote_has(&remote, "refs/heads/r2.0-dev"));
    assert!(remote_has(&remote, "refs/tags/r2.0-dev-RC1"));
    assert_eq!(
        fixture.read_at("r2", "search.txt").as_deref(),
        Some("on")
    );
}

#[test]
fn test_idle_cycle_does_not_push() {
    let fixture = shop();
    let origin = fixture.add_bare_remote("origin");
    let orchestrator = connected(&fixture);
    orchestrator.run_cycle().unwrap();

    // a branch created locally after the last push stays local on an idle cycle
    let mut repo = LocalRepository::open(fixture.root()).unwrap();
    repo.create_branch("scratch", "master").unwrap();

    assert!(orchestrator.run_cycle().unwrap().is_idle());
    let remote = git2::Repository::open_bare(origin.path()).unwrap();
    assert!(remote_has(&remote, "refs/heads/r1.0"));
    assert!(!remote_has(&remote, "refs/heads/scratch"));
}

#[test]
fn test_diverged_main_line_stops_the_cycle() {
    let mut fixture = shop();
    let origin = fixture.add_bare_remote("origin");

    let mut colleague = GitFixture::clone_of(origin.path());
    colleague.commit("master", "Remote change", &[("remote.txt", "1")]);
    colleague.push("origin", "master");
    fixture.commit("master", "Local change", &[("local.txt", "1")]);

    let orchestrator = connected(&fixture);
    assert!(matches!(
        orchestrator.run_cycle(),
        Err(Error::Git(cascade_git::Error::MergeConflict { .. }))
    ));
    assert!(!fixture.has_branch("r1"));

    let backend = orchestrator.into_backend().unwrap();
    assert_eq!(backend.current_branch().unwrap(), "master");
}
