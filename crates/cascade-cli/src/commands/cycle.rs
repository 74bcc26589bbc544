//! Cycle and hotfix commands

use std::path::Path;

use cascade_core::{CascadeReport, CycleReport};
use colored::Colorize;

use crate::context::{self, Overrides};
use crate::error::{CliError, Result};

/// Run one full release cycle
pub fn run_cycle(path: &Path, overrides: &Overrides) -> Result<()> {
    let report = context::open(path, overrides)?.run_cycle()?;
    print_cycle(&report);
    check_failures(&report.cascade)
}

/// Check releases for hotfixes and environments for new commits
pub fn run_hotfix(path: &Path, overrides: &Overrides, release: Option<u32>) -> Result<()> {
    let report = context::open(path, overrides)?.check_hotfixes(release)?;
    print_cycle(&report);
    check_failures(&report.cascade)
}

fn print_cycle(report: &CycleReport) {
    if report.is_idle() {
        println!("{}", "Nothing to do".dimmed());
        return;
    }
    println!("{}:", "Detected".bold());
    for event in &report.events {
        println!("  {} {}", "*".cyan(), event);
    }
    println!();
    print_cascade(&report.cascade);
}

/// Print created branches, release candidates and failures.
pub fn print_cascade(report: &CascadeReport) {
    for branch in &report.created_branches {
        println!("{} branch {}", "+".green(), branch.cyan());
    }
    for tag in &report.candidates {
        println!("{} candidate {}", "+".green(), tag.cyan());
    }
    for failure in &report.failures {
        println!("{} {}: {}", "x".red(), failure.branch.yellow(), failure.message);
    }
}

/// Failed environments make the command fail once everything else is done.
pub fn check_failures(report: &CascadeReport) -> Result<()> {
    match report.failures.len() {
        0 => Ok(()),
        1 => Err(CliError::user("1 environment failed")),
        n => Err(CliError::user(format!("{n} environments failed"))),
    }
}
