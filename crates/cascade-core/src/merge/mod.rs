//! Parameter merge
//!
//! Every artifact on an environment branch is resolved into a [`MergeEntry`]
//! whose parameters inherit the values curated on the predecessor
//! environment. The entries together form the [`MergeResult`] stored on the
//! branch.

mod artifact;
mod context;
mod cycle;
mod engine;
mod model;
mod resolver;
mod schema;

pub use artifact::{Artifact, ArtifactNode, NODE_FILE, discover, read_node};
pub use context::{MergeContext, TreeReader};
pub use cycle::{MergeCycle, MergeOutcome, MergeSettings, MergeTarget};
pub use engine::{ParameterMerger, ParameterOptions, ParameterSpec, strip_indexes};
pub use model::{MergeEntry, MergeParameter, MergeResult, MergeState, ParameterType};
pub use resolver::{ArtifactResolver, CONFIG_MANAGER, ConfigFileResolver, ResolverRegistry};
pub use schema::{
    ElementIndex, JsonValueSource, RawValue, Schema, SchemaField, StaticValues, ValueSource,
};
