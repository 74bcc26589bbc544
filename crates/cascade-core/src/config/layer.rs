//! A single configuration file
//!
//! Every key is optional so that a layer only overrides what it names.

use serde::{Deserialize, Serialize};

use super::{CascadeConfig, ReleasePolicy};
use crate::Result;

/// `[merge]` section of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeLayer {
    pub explode: Option<bool>,
    pub force_all: Option<bool>,
    pub result_file: Option<String>,
    pub build_file: Option<String>,
}

/// `[author]` section of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorLayer {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Configuration parsed from one `config.toml` / `cascade.toml`, or built
/// from command line overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub project: Option<String>,
    pub main_branch: Option<String>,
    pub remote: Option<String>,
    pub release_policy: Option<ReleasePolicy>,
    pub secondary_depth: Option<usize>,
    pub push: Option<bool>,
    pub merge: MergeLayer,
    pub author: AuthorLayer,
}

impl ConfigLayer {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `other` onto this layer; keys set in `other` win.
    pub fn merge(&mut self, other: &ConfigLayer) {
        overlay(&mut self.project, &other.project);
        overlay(&mut self.main_branch, &other.main_branch);
        overlay(&mut self.remote, &other.remote);
        overlay(&mut self.release_policy, &other.release_policy);
        overlay(&mut self.secondary_depth, &other.secondary_depth);
        overlay(&mut self.push, &other.push);
        overlay(&mut self.merge.explode, &other.merge.explode);
        overlay(&mut self.merge.force_all, &other.merge.force_all);
        overlay(&mut self.merge.result_file, &other.merge.result_file);
        overlay(&mut self.merge.build_file, &other.merge.build_file);
        overlay(&mut self.author.name, &other.author.name);
        overlay(&mut self.author.email, &other.author.email);
    }

    /// Fill every key this layer leaves unset from `defaults`.
    pub fn apply_to(&self, defaults: CascadeConfig) -> CascadeConfig {
        let mut config = defaults;
        set(&mut config.project, &self.project);
        set(&mut config.main_branch, &self.main_branch);
        if self.remote.is_some() {
            config.remote = self.remote.clone();
        }
        set(&mut config.release_policy, &self.release_policy);
        set(&mut config.secondary_depth, &self.secondary_depth);
        set(&mut config.push, &self.push);
        set(&mut config.merge.explode, &self.merge.explode);
        set(&mut config.merge.force_all, &self.merge.force_all);
        set(&mut config.merge.result_file, &self.merge.result_file);
        set(&mut config.merge.build_file, &self.merge.build_file);
        set(&mut config.author.name, &self.author.name);
        set(&mut config.author.email, &self.author.email);
        config
    }
}

fn overlay<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        base.clone_from(other);
    }
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}
