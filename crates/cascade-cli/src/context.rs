//! Repository context
//!
//! Opens the repository named on the command line, resolves the layered
//! configuration and builds the orchestrator every command works with.

use std::path::Path;

use cascade_core::{CascadeConfig, ConfigLayer, ConfigResolver, LOCK_FILE, Orchestrator};
use cascade_git::LocalRepository;

use crate::error::Result;

/// Command line values that override configuration files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub remote: Option<String>,
    pub push: bool,
}

impl Overrides {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            remote: self.remote.clone(),
            push: self.push.then_some(true),
            ..ConfigLayer::default()
        }
    }
}

/// Effective configuration for the repository at `path`.
pub fn resolve_config(path: &Path, overrides: &Overrides) -> Result<CascadeConfig> {
    let repo = LocalRepository::open(path)?;
    Ok(ConfigResolver::new(repo.root(), repo.git_dir()).resolve_with(&overrides.layer())?)
}

/// Orchestrator over the repository at `path`, holding the repository lock
/// file during mutating operations.
pub fn open(path: &Path, overrides: &Overrides) -> Result<Orchestrator<LocalRepository>> {
    let repo = LocalRepository::open(path)?;
    let config = ConfigResolver::new(repo.root(), repo.git_dir())
        .resolve_with(&overrides.layer())?;
    let lock_file = repo.git_dir().join(LOCK_FILE);
    tracing::debug!(root = %repo.root().display(), project = %config.project, "Opened repository");
    Ok(Orchestrator::new(repo, config).with_lock_file(lock_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_test_utils::git::GitFixture;

    #[test]
    fn test_overrides_win_over_repository_config() {
        let fixture = GitFixture::new("master");
        std::fs::write(
            fixture.root().join(".git").join("cascade.toml"),
            "project = \"shop\"\nremote = \"upstream\"\n",
        )
        .unwrap();

        let overrides = Overrides {
            remote: Some("origin".to_string()),
            push: true,
        };
        let config = resolve_config(fixture.root(), &overrides).unwrap();
        assert_eq!(config.project, "shop");
        assert_eq!(config.remote.as_deref(), Some("origin"));
        assert!(config.push);
    }

    #[test]
    fn test_plain_directory_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(open(dir.path(), &Overrides::default()).is_err());
    }
}
