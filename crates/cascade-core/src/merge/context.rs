//! What a resolver can see and do while one artifact is merged

use cascade_git::VcsBackend;

use super::artifact::Artifact;
use super::engine::{ParameterMerger, ParameterOptions, ParameterSpec};
use super::model::{MergeEntry, MergeParameter};
use super::schema::{Schema, ValueSource};
use crate::Result;

/// Reads files of one commit, or nothing when there is no commit.
#[derive(Clone, Copy)]
pub struct TreeReader<'a> {
    backend: &'a dyn VcsBackend,
    commit: Option<&'a str>,
}

impl<'a> TreeReader<'a> {
    pub fn new(backend: &'a dyn VcsBackend, commit: Option<&'a str>) -> Self {
        Self { backend, commit }
    }

    pub fn commit(&self) -> Option<&'a str> {
        self.commit
    }

    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.commit {
            Some(commit) => Ok(self.backend.read_blob_at_commit(path, commit)?),
            None => Ok(None),
        }
    }
}

/// Per-artifact merge session handed to an
/// [`ArtifactResolver`](super::resolver::ArtifactResolver).
pub struct MergeContext<'a> {
    artifact: &'a Artifact,
    merger: ParameterMerger<'a>,
    current: TreeReader<'a>,
    previous: TreeReader<'a>,
    log: Vec<String>,
}

impl<'a> MergeContext<'a> {
    pub fn new(
        artifact: &'a Artifact,
        entry: &'a mut MergeEntry,
        previous_entry: Option<&'a MergeEntry>,
        current: TreeReader<'a>,
        previous: TreeReader<'a>,
    ) -> Self {
        Self {
            artifact,
            merger: ParameterMerger::new(entry, previous_entry),
            current,
            previous,
            log: Vec::new(),
        }
    }

    pub fn artifact(&self) -> &Artifact {
        self.artifact
    }

    /// Upsert a parameter for every environment-specific value of `schema`.
    pub fn parameters(
        &mut self,
        schema: &Schema,
        source: &dyn ValueSource,
        options: &ParameterOptions,
    ) -> Result<Vec<MergeParameter>> {
        self.merger.collect(&schema.fields, source, options)
    }

    /// Upsert a single parameter.
    pub fn parameter(&mut self, spec: ParameterSpec) -> Result<MergeParameter> {
        self.merger.upsert(spec)
    }

    /// The same-named parameter of the predecessor environment.
    pub fn previous_parameter(&self, name: &str) -> Option<&MergeParameter> {
        self.merger.previous()?.parameter(name)
    }

    /// A file of this artifact as it is on the predecessor environment.
    pub fn previous_content(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.previous.read(&self.artifact.path_of(path))
    }

    /// A file of this artifact as it is on the branch being merged.
    pub fn current_content(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.current.read(&self.artifact.path_of(path))
    }

    /// Replace the entry's tags; an empty list clears them.
    pub fn tag<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merger.entry_mut().tags = tags.into_iter().map(Into::into).collect();
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Collected log lines, newline separated, or `None` when nothing was logged.
    pub fn finish(self) -> Option<String> {
        if self.log.is_empty() {
            None
        } else {
            Some(self.log.join("\n"))
        }
    }
}
