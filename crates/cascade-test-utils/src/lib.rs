//! Shared test utilities for the release-cascade workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: real git repositories with controllable commit dates
//! - [`nodes`]: configuration artifact trees ready to be committed

pub mod git;
pub mod nodes;
