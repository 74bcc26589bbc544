//! Shared git2 helpers for talking to remotes
//!
//! Fetch is followed by a fast-forward of the checked out branch; push sends
//! every local branch and optionally every tag.

use git2::{AutotagOption, BranchType, FetchOptions, Repository};

use crate::{Error, Result};

/// Pull changes from a remote repository using fetch + fast-forward.
///
/// # Arguments
/// * `repo` - The repository to pull into
/// * `remote_name` - Remote to fetch from
/// * `branch_name` - Checked out branch to fast-forward
/// * `include_tags` - Also download every tag of the remote
pub fn pull(
    repo: &Repository,
    remote_name: &str,
    branch_name: &str,
    include_tags: bool,
) -> Result<()> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| Error::RemoteNotFound {
            name: remote_name.to_string(),
        })?;

    let mut options = FetchOptions::new();
    if include_tags {
        options.download_tags(AutotagOption::All);
    }

    remote
        .fetch(&[branch_name], Some(&mut options), None)
        .map_err(|e| Error::PullFailed {
            message: format!("Fetch failed: {}", e.message()),
        })?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .map_err(|e| Error::PullFailed {
            message: format!("Could not find FETCH_HEAD: {}", e.message()),
        })?;

    let fetch_commit = fetch_head.peel_to_commit().map_err(|e| Error::PullFailed {
        message: format!("Could not resolve FETCH_HEAD: {}", e.message()),
    })?;

    let head_commit = repo.head()?.peel_to_commit()?;

    let (merge_analysis, _) =
        repo.merge_analysis(&[&repo.find_annotated_commit(fetch_commit.id())?])?;

    if merge_analysis.is_up_to_date() {
        return Ok(());
    }

    if merge_analysis.is_fast_forward() {
        let refname = format!("refs/heads/{}", branch_name);
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(
            fetch_commit.id(),
            &format!("pull: fast-forward to {}", fetch_commit.id()),
        )?;

        repo.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))?;
        return Ok(());
    }

    Err(Error::MergeConflict {
        message: format!(
            "Cannot fast-forward {} from {} to {}. Manual merge required.",
            branch_name,
            head_commit.id(),
            fetch_commit.id()
        ),
    })
}

/// Push every local branch, and every tag when `include_tags` is set.
pub fn push(repo: &Repository, remote_name: &str, include_tags: bool) -> Result<()> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| Error::RemoteNotFound {
            name: remote_name.to_string(),
        })?;

    let mut refspecs = Vec::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let Some(name) = branch.get().name() {
            refspecs.push(format!("{name}:{name}"));
        }
    }
    if include_tags {
        for tag in repo.tag_names(None)?.iter().flatten() {
            refspecs.push(format!("refs/tags/{tag}:refs/tags/{tag}"));
        }
    }

    remote.push(&refspecs, None).map_err(|e| Error::PushFailed {
        message: e.message().to_string(),
    })?;

    tracing::info!(remote = %remote_name, refs = refspecs.len(), "Pushed references");
    Ok(())
}
