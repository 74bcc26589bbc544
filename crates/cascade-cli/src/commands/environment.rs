//! Environment commands: add, inspect and submit merge results

use std::fs;
use std::path::Path;

use cascade_core::MergeResult;
use colored::Colorize;

use super::cycle::{check_failures, print_cascade};
use crate::context::{self, Overrides};
use crate::error::{CliError, Result};

/// Add an environment to the latest patch of the latest release
pub fn run_add_environment(
    path: &Path,
    overrides: &Overrides,
    name: &str,
    copy_from: Option<&str>,
) -> Result<()> {
    let report = context::open(path, overrides)?.add_environment(name, copy_from)?;
    print_cascade(&report);
    check_failures(&report)
}

/// Print the stored merge result of an environment as JSON
pub fn run_merge_result(path: &Path, overrides: &Overrides, branch: &str) -> Result<()> {
    let result = context::open(path, overrides)?
        .merge_result(branch)?
        .ok_or_else(|| CliError::user(format!("No merge result on {branch}")))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Store the merge result in `file` as the next release candidate of `branch`
pub fn run_submit(path: &Path, overrides: &Overrides, branch: &str, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)?;
    let result: MergeResult = serde_json::from_str(&content)?;
    let outcome = context::open(path, overrides)?.submit_merge_result(branch, result)?;
    println!(
        "{} candidate {} ({})",
        "+".green(),
        outcome.tag.cyan(),
        outcome.commit.short_id().dimmed()
    );
    Ok(())
}
