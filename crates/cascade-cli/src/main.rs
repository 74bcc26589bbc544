//! Release Cascade CLI
//!
//! Runs release cycles and operator requests against a local repository.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use context::Overrides;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides {
        remote: cli.remote.clone(),
        push: cli.push,
    };
    match cli.command {
        Some(cmd) => execute_command(cmd, &cli.repo, &overrides),
        None => {
            println!("{} Release Cascade CLI", "cascade".green().bold());
            println!();
            println!("Run {} for available commands.", "cascade --help".cyan());
            Ok(())
        }
    }
}

/// Logs go to stderr so that JSON output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let installed = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    };
    if !installed {
        eprintln!("{}: tracing subscriber already set", "warning".yellow());
    }
    tracing::debug!("Verbose mode enabled");
}

fn execute_command(cmd: Commands, repo: &std::path::Path, overrides: &Overrides) -> Result<()> {
    match cmd {
        Commands::Cycle => commands::run_cycle(repo, overrides),
        Commands::Hotfix { release } => commands::run_hotfix(repo, overrides, release),
        Commands::Tree => commands::run_tree(repo, overrides),
        Commands::AddEnvironment { name, copy_from } => {
            commands::run_add_environment(repo, overrides, &name, copy_from.as_deref())
        }
        Commands::MergeResult { branch } => commands::run_merge_result(repo, overrides, &branch),
        Commands::Submit { branch, file } => commands::run_submit(repo, overrides, &branch, &file),
        Commands::ReleaseNotes { version } => {
            commands::run_release_notes(repo, overrides, version)
        }
        Commands::Config => commands::run_config(repo, overrides),
    }
}
