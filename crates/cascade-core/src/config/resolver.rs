//! Configuration resolution with hierarchical merge

use std::fs;
use std::path::{Path, PathBuf};

use super::CascadeConfig;
use super::layer::ConfigLayer;
use crate::{Error, Result};

/// File name of the repository layer inside the git directory.
pub const REPOSITORY_CONFIG: &str = "cascade.toml";

/// Resolves the configuration of one repository.
pub struct ConfigResolver {
    /// Working tree root; its directory name is the default project
    root: PathBuf,

    git_dir: PathBuf,

    /// Override for the global config directory (used for testing).
    /// When `None`, `dirs::config_dir()/release-cascade` is used.
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git_dir: git_dir.into(),
            global_config_dir_override: None,
        }
    }

    /// Create a resolver with a custom global config directory.
    pub fn with_global_config_dir(
        root: impl Into<PathBuf>,
        git_dir: impl Into<PathBuf>,
        global_config_dir: PathBuf,
    ) -> Self {
        Self {
            root: root.into(),
            git_dir: git_dir.into(),
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("release-cascade"))
    }

    /// Path of the repository layer.
    pub fn repository_config_path(&self) -> PathBuf {
        self.git_dir.join(REPOSITORY_CONFIG)
    }

    pub fn has_config(&self) -> bool {
        self.repository_config_path().is_file()
    }

    /// Resolve without command line overrides.
    pub fn resolve(&self) -> Result<CascadeConfig> {
        self.resolve_with(&ConfigLayer::default())
    }

    /// Merge defaults, the global layer, the repository layer and
    /// `overrides`, in that order.
    ///
    /// Missing files are skipped; a file that does not parse is an error.
    pub fn resolve_with(&self, overrides: &ConfigLayer) -> Result<CascadeConfig> {
        let mut layer = ConfigLayer::default();

        if let Some(global_dir) = self.global_config_dir() {
            let global_config_path = global_dir.join("config.toml");
            if global_config_path.is_file() {
                tracing::debug!(?global_config_path, "Loading global config");
                layer.merge(&load(&global_config_path)?);
            } else {
                tracing::debug!(?global_config_path, "No global config found, skipping");
            }
        }

        let repo_config_path = self.repository_config_path();
        if repo_config_path.is_file() {
            tracing::debug!(?repo_config_path, "Loading repository config");
            layer.merge(&load(&repo_config_path)?);
        }

        layer.merge(overrides);

        let mut defaults = CascadeConfig::default();
        if let Some(name) = self.root.file_name().and_then(|n| n.to_str()) {
            defaults.project = name.to_string();
        }
        let config = layer.apply_to(defaults);
        validate(&config, &repo_config_path)?;
        Ok(config)
    }
}

fn load(path: &Path) -> Result<ConfigLayer> {
    let content = fs::read_to_string(path)?;
    ConfigLayer::parse(&content).map_err(|e| Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn validate(config: &CascadeConfig, path: &Path) -> Result<()> {
    let invalid = |message: &str| {
        Err(Error::Config {
            path: path.to_path_buf(),
            message: message.to_string(),
        })
    };
    if config.project.is_empty() {
        return invalid("project must not be empty");
    }
    if config.main_branch.is_empty() {
        return invalid("main_branch must not be empty");
    }
    if config.merge.result_file == config.merge.build_file {
        return invalid("merge.result_file and merge.build_file must differ");
    }
    Ok(())
}
