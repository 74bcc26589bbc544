//! Command implementations for cascade-cli

pub mod config;
pub mod cycle;
pub mod environment;
pub mod tree;

pub use config::run_config;
pub use cycle::{run_cycle, run_hotfix};
pub use environment::{run_add_environment, run_merge_result, run_submit};
pub use tree::{run_release_notes, run_tree};
