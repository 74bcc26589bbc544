//! Artifact resolvers, selected by the `manager` of an artifact

use std::collections::HashMap;

use super::artifact::Artifact;
use super::context::MergeContext;
use super::engine::ParameterOptions;
use super::schema::{JsonValueSource, Schema};
use crate::{Error, Result};

/// Manager name handled by [`ConfigFileResolver`].
pub const CONFIG_MANAGER: &str = "config";

/// Extracts the parameters of one kind of artifact.
pub trait ArtifactResolver: Send + Sync {
    /// Upsert the artifact's parameters through `context`.
    ///
    /// An error marks the artifact's entry as failed; other artifacts are
    /// still resolved.
    fn resolve(&self, artifact: &Artifact, context: &mut MergeContext<'_>) -> Result<()>;
}

/// Resolvers keyed by manager name.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Box<dyn ArtifactResolver>>,
}

impl ResolverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in resolvers.
    pub fn with_defaults(options: ParameterOptions) -> Self {
        let mut registry = Self::new();
        registry.register(CONFIG_MANAGER, ConfigFileResolver::new(options));
        registry
    }

    /// Register `resolver` for `manager`, replacing any earlier one.
    pub fn register(&mut self, manager: impl Into<String>, resolver: impl ArtifactResolver + 'static) {
        self.resolvers.insert(manager.into(), Box::new(resolver));
    }

    /// Resolver for the artifact's manager, if one is registered.
    pub fn get(&self, artifact: &Artifact) -> Option<&dyn ArtifactResolver> {
        let manager = artifact.manager()?;
        self.resolvers.get(manager).map(|r| r.as_ref())
    }

    pub fn managers(&self) -> Vec<&str> {
        let mut managers: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        managers.sort_unstable();
        managers
    }
}

/// Reads `schema.toml` and `config.json` from the artifact directory.
///
/// The schema marks which fields are environment specific; the JSON document
/// holds the values the artifact currently declares.
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    options: ParameterOptions,
    schema_file: String,
    values_file: String,
}

impl ConfigFileResolver {
    pub fn new(options: ParameterOptions) -> Self {
        Self {
            options,
            schema_file: "schema.toml".to_string(),
            values_file: "config.json".to_string(),
        }
    }
}

impl ArtifactResolver for ConfigFileResolver {
    fn resolve(&self, artifact: &Artifact, context: &mut MergeContext<'_>) -> Result<()> {
        let schema = context
            .current_content(&self.schema_file)?
            .ok_or_else(|| Error::Artifact {
                artifact: artifact.id.clone(),
                message: format!("missing {}", self.schema_file),
            })?;
        let schema = std::str::from_utf8(&schema).map_err(|e| Error::Codec {
            path: artifact.path_of(&self.schema_file),
            message: e.to_string(),
        })?;
        let schema = Schema::from_toml(schema)?;

        let source = match context.current_content(&self.values_file)? {
            Some(bytes) => JsonValueSource::from_slice(&bytes)?,
            None => {
                context.log(format!("No {} found, using empty values", self.values_file));
                JsonValueSource::new(serde_json::Value::Object(Default::default()))
            }
        };

        let parameters = context.parameters(&schema, &source, &self.options)?;
        let changed = parameters.iter().filter(|p| p.changed).count();
        context.log(format!(
            "Resolved {} parameters ({changed} changed)",
            parameters.len()
        ));
        context.tag(artifact.node.tags.iter().cloned());
        Ok(())
    }
}
