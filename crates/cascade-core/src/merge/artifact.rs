//! Artifacts: directories of a branch tree described by a `node.toml`

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cascade_git::VcsBackend;

use crate::{Error, Result};

/// File name of an artifact descriptor.
pub const NODE_FILE: &str = "node.toml";

/// Contents of `node.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNode {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub comment: Option<String>,
    pub tags: Vec<String>,
    /// Ids of other artifacts this one depends on
    pub references: Vec<String>,
    pub version: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub environment_id: Option<String>,
    /// Selects the resolver that extracts parameters
    pub manager: Option<String>,
}

impl ArtifactNode {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Whether this descriptor differs from an earlier one in a way that
    /// makes the artifact itself count as changed.
    pub fn differs_from(&self, previous: &ArtifactNode) -> bool {
        self.last_modified != previous.last_modified
            || self.environment_id != previous.environment_id
            || self.version != previous.version
    }
}

/// An artifact found in a branch tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Dotted id: the project name followed by the directory parts
    pub id: String,
    /// Directory relative to the tree root, `/` separated, empty for the root
    pub dir: String,
    pub node: ArtifactNode,
}

impl Artifact {
    /// Path of `file` inside this artifact's directory.
    pub fn path_of(&self, file: &str) -> String {
        let file = file.trim_start_matches('/');
        if self.dir.is_empty() {
            file.to_string()
        } else {
            format!("{}/{file}", self.dir)
        }
    }

    pub fn manager(&self) -> Option<&str> {
        self.node.manager.as_deref()
    }
}

/// Every artifact in the tree of `commit`, ordered by directory.
///
/// Hidden directories are skipped, and an artifact's subdirectories belong to
/// it rather than forming artifacts of their own. A descriptor that cannot be
/// parsed is logged and skipped.
pub fn discover(backend: &dyn VcsBackend, commit: &str, project: &str) -> Result<Vec<Artifact>> {
    let dirs: BTreeSet<String> = backend
        .list_files_at_commit(commit)?
        .into_iter()
        .filter(|path| !path.split('/').any(|part| part.starts_with('.')))
        .filter_map(|path| descriptor_dir(&path))
        .collect();

    let mut artifacts: Vec<Artifact> = Vec::new();
    for dir in dirs {
        if artifacts.iter().any(|a| is_within(&dir, &a.dir)) {
            continue;
        }
        let path = if dir.is_empty() {
            NODE_FILE.to_string()
        } else {
            format!("{dir}/{NODE_FILE}")
        };
        let Some(bytes) = backend.read_blob_at_commit(&path, commit)? else {
            continue;
        };
        match parse_node(&path, &bytes) {
            Ok(node) => artifacts.push(Artifact {
                id: artifact_id(project, &dir),
                dir,
                node,
            }),
            Err(e) => tracing::warn!(path = %path, error = %e, "Skipping artifact"),
        }
    }
    Ok(artifacts)
}

/// Read the descriptor of `dir` as it was at `commit`.
pub fn read_node(backend: &dyn VcsBackend, commit: &str, dir: &str) -> Result<Option<ArtifactNode>> {
    let path = if dir.is_empty() {
        NODE_FILE.to_string()
    } else {
        format!("{dir}/{NODE_FILE}")
    };
    match backend.read_blob_at_commit(&path, commit)? {
        Some(bytes) => parse_node(&path, &bytes).map(Some),
        None => Ok(None),
    }
}

fn parse_node(path: &str, bytes: &[u8]) -> Result<ArtifactNode> {
    let content = std::str::from_utf8(bytes).map_err(|e| Error::Codec {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    ArtifactNode::from_toml(content)
}

fn descriptor_dir(path: &str) -> Option<String> {
    if path == NODE_FILE {
        return Some(String::new());
    }
    path.strip_suffix(NODE_FILE)?
        .strip_suffix('/')
        .map(str::to_string)
}

fn is_within(dir: &str, ancestor: &str) -> bool {
    ancestor.is_empty() || dir.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}

fn artifact_id(project: &str, dir: &str) -> String {
    if dir.is_empty() {
        project.to_string()
    } else {
        format!("{project}.{}", dir.replace('/', "."))
    }
}
