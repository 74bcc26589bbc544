//! Release automation on top of git
//!
//! The whole release hierarchy lives in branch and tag names:
//!
//! ```text
//! r2                 release
//! r2.1               patch of the release
//! r2.1-qa            environment of the patch
//! r2.1-qa-RC3        release candidate of the environment (tag)
//! v2                 version tag that may start a release (tag)
//! ```
//!
//! Each cycle scans those names into a [`ReferenceTree`], compares the tree
//! against the commit dates the backend reports ([`DriftDetector`]), creates
//! whatever is missing ([`BranchCascade`]) and merges the environment
//! specific parameters of every touched environment ([`merge`]). The
//! [`Orchestrator`] runs the whole sequence under a repository lock.
//!
//! # Example
//!
//! ```ignore
//! use cascade_core::{ConfigResolver, Orchestrator};
//! use cascade_git::LocalRepository;
//!
//! let repo = LocalRepository::open("/srv/shop")?;
//! let config = ConfigResolver::new(repo.root(), repo.git_dir()).resolve()?;
//! let report = Orchestrator::new(repo, config).run_cycle()?;
//! println!("{} events", report.events.len());
//! ```

pub mod build;
pub mod cascade;
pub mod config;
pub mod drift;
pub mod error;
pub mod lock;
pub mod merge;
pub mod orchestrator;
pub mod persist;
pub mod refs;
pub mod scanner;

pub use build::{BuildInformation, external_dependencies};
pub use cascade::{BranchCascade, CascadeFailure, CascadeReport};
pub use config::{CascadeConfig, ConfigLayer, ConfigResolver, ReleasePolicy};
pub use drift::{DriftDetector, DriftEvent, SecondaryScope};
pub use error::{Error, Result};
pub use lock::{LOCK_FILE, RepositoryLock};
pub use merge::{MergeEntry, MergeParameter, MergeResult, MergeState};
pub use orchestrator::{CycleReport, Orchestrator};
pub use persist::{Cipher, PlainCipher};
pub use refs::{RefName, ReferenceTree};
pub use scanner::RepositoryScanner;
