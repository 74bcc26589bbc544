//! Build descriptor written next to the merge result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Artifact;

/// Identifies the candidate an environment branch was built into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInformation {
    pub release: u32,
    pub patch: u32,
    pub rc: u32,
    pub environment: String,
    pub tag: String,
    pub built: Option<DateTime<Utc>>,
    /// Artifacts referenced by this build but not shipped in it
    pub dependencies: Vec<String>,
}

/// References of `artifacts` that are not themselves part of the build.
///
/// Deduplicated, in the order they are first seen.
pub fn external_dependencies(artifacts: &[Artifact]) -> Vec<String> {
    let mut dependencies: Vec<String> = Vec::new();
    for reference in artifacts.iter().flat_map(|a| a.node.references.iter()) {
        let shipped = artifacts.iter().any(|a| &a.id == reference);
        if !shipped && !dependencies.contains(reference) {
            dependencies.push(reference.clone());
        }
    }
    dependencies
}
