//! Reference naming grammar and the release hierarchy built from it

mod name;
mod tree;

pub use name::{RefName, is_environment_name, short_name};
pub use tree::{Environment, Patch, RefTarget, ReferenceTree, Release, ReleaseCandidate};
