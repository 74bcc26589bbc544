//! Configuration of the release cascade
//!
//! Configuration is merged from these sources, later ones overriding earlier:
//!
//! 1. **Built-in defaults**
//! 2. **Global config** - `<config_dir>/release-cascade/config.toml`
//! 3. **Repository config** - `<git_dir>/cascade.toml`, outside the working
//!    tree so that branch checkouts never change it
//! 4. **Command line overrides**

mod layer;
mod resolver;

pub use layer::{AuthorLayer, ConfigLayer, MergeLayer};
pub use resolver::{ConfigResolver, REPOSITORY_CONFIG};

use serde::{Deserialize, Serialize};

use cascade_git::Signature;

use crate::merge::{MergeSettings, ParameterOptions};

/// How new releases are started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleasePolicy {
    /// A release per batch of new commits on the main branch
    #[default]
    Primary,
    /// A release per `v<n>` tag
    VersionTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub explode: bool,
    pub force_all: bool,
    pub result_file: String,
    pub build_file: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            explode: true,
            force_all: false,
            result_file: "merge-result.json".to_string(),
            build_file: "build.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "release-cascade".to_string(),
            email: "release-cascade@localhost".to_string(),
        }
    }
}

/// The effective configuration after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Prefix of artifact entry ids
    pub project: String,
    pub main_branch: String,
    /// Pull before and push after a cycle; no remote means a local-only cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub release_policy: ReleasePolicy,
    /// Releases checked for hotfixes, newest first; 0 checks all
    pub secondary_depth: usize,
    pub push: bool,
    pub merge: MergeConfig,
    pub author: AuthorConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            project: "project".to_string(),
            main_branch: "master".to_string(),
            remote: None,
            release_policy: ReleasePolicy::default(),
            secondary_depth: 0,
            push: false,
            merge: MergeConfig::default(),
            author: AuthorConfig::default(),
        }
    }
}

impl CascadeConfig {
    pub fn signature(&self) -> Signature {
        Signature::new(&self.author.name, &self.author.email)
    }

    pub fn merge_settings(&self) -> MergeSettings {
        MergeSettings {
            project: self.project.clone(),
            result_file: self.merge.result_file.clone(),
            build_file: self.merge.build_file.clone(),
            author: self.signature(),
        }
    }

    pub fn parameter_options(&self) -> ParameterOptions {
        ParameterOptions {
            force_all: self.merge.force_all,
            explode: self.merge.explode,
            prefix: None,
        }
    }

    /// Render as TOML, the way it would be written to `cascade.toml`.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
