//! Read-only views: reference tree and release notes

use std::path::Path;

use colored::Colorize;

use crate::context::{self, Overrides};
use crate::error::Result;

/// Print the release hierarchy
pub fn run_tree(path: &Path, overrides: &Overrides) -> Result<()> {
    let tree = context::open(path, overrides)?.tree()?;
    if tree.is_empty() {
        println!("{}", "No releases".dimmed());
    } else {
        print!("{tree}");
    }
    Ok(())
}

/// Print the commit messages new in release `version`
pub fn run_release_notes(path: &Path, overrides: &Overrides, version: u32) -> Result<()> {
    let notes = context::open(path, overrides)?.release_notes(version)?;
    println!("{} r{}", "Release notes".bold(), version);
    for message in notes {
        println!("  {} {}", "-".dimmed(), message);
    }
    Ok(())
}
