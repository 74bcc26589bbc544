//! Commit metadata extraction

use chrono::{DateTime, TimeZone, Utc};
use git2::Commit;

/// Information about a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full hexadecimal commit id
    pub id: String,

    /// First line of the commit message
    pub message: String,

    /// Commit author name, if the commit carries an author identity
    pub author: Option<String>,

    /// Author date, or the commit timestamp when the author identity is absent
    pub date: DateTime<Utc>,
}

impl CommitInfo {
    /// Short commit hash (7 characters)
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(7)]
    }
}

/// A branch or tag together with the commit it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    /// Full reference name, e.g. `refs/heads/r1.0`
    pub name: String,

    pub commit: CommitInfo,
}

/// The date used for every temporal comparison: the author date, falling
/// back to the commit timestamp when the commit has no author identity.
pub fn commit_date(commit: &Commit<'_>) -> DateTime<Utc> {
    let author = commit.author();
    let has_identity = author.name().is_some_and(|n| !n.is_empty())
        || author.email().is_some_and(|e| !e.is_empty());

    let seconds = if has_identity {
        author.when().seconds()
    } else {
        commit.time().seconds()
    };

    Utc.timestamp_opt(seconds, 0).single().unwrap_or_default()
}

pub(crate) fn commit_info(commit: &Commit<'_>) -> CommitInfo {
    let message = commit
        .message()
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .to_string();

    let author = commit
        .author()
        .name()
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    CommitInfo {
        id: commit.id().to_string(),
        message,
        author,
        date: commit_date(commit),
    }
}
