//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Release Cascade - release branches, patches and environments from git refs
#[derive(Parser, Debug)]
#[command(name = "cascade")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Values of encrypted parameters are committed as plain text: this binary has no cipher.")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository to operate on
    #[arg(short, long, global = true, env = "CASCADE_REPO", default_value = ".")]
    pub repo: PathBuf,

    /// Remote to pull from and push to, overriding the configuration
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Push after every operation that created refs
    #[arg(long, global = true)]
    pub push: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one release cycle
    ///
    /// Pulls, detects new releases, hotfixes and environment commits,
    /// creates the missing branches and merges every touched environment.
    Cycle,

    /// Look for hotfixes and environment commits only
    Hotfix {
        /// Only check this release
        #[arg(long)]
        release: Option<u32>,
    },

    /// Show releases, patches, environments and release candidates
    Tree,

    /// Add an environment to the latest patch
    ///
    /// Examples:
    ///   cascade add-environment dev
    ///   cascade add-environment qa --copy-from dev
    AddEnvironment {
        /// Environment name, e.g. dev or qa
        name: String,

        /// Environment whose merge result seeds the new one
        #[arg(long)]
        copy_from: Option<String>,
    },

    /// Print the merge result of an environment branch as JSON
    MergeResult {
        /// Environment branch, e.g. r1.0-dev
        branch: String,
    },

    /// Store an edited merge result as the next release candidate
    Submit {
        /// Environment branch, e.g. r1.0-dev
        branch: String,

        /// JSON file holding the merge result
        file: PathBuf,
    },

    /// List the commits of a release that the previous release lacks
    ReleaseNotes {
        /// Release version
        version: u32,
    },

    /// Show the effective configuration
    Config,
}
