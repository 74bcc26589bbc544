//! Parameter inheritance and change detection
//!
//! A [`ParameterMerger`] builds the parameters of one [`MergeEntry`] for one
//! merge cycle. Values already chosen for the environment are carried over
//! from the previous cycle; what the artifact declares now only lands in
//! `raw`, and a difference from the previous `raw` marks the parameter as
//! changed so an operator can review it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::model::{MergeEntry, MergeParameter, ParameterType};
use super::schema::{SchemaField, ValueSource};
use crate::{Error, Result};

static ELEMENT_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]").expect("Invalid element index regex"));

/// A parameter as requested by a resolver. Unset fields leave the stored
/// value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<ParameterType>,
    pub encrypted: Option<bool>,
    pub optional: Option<bool>,
    pub raw: Option<String>,
    pub priority: Option<i32>,
    pub show: Option<String>,
    pub hide: Option<String>,
    pub default_value: Option<String>,
    pub enumeration: Vec<String>,
    pub list: Option<bool>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn maybe_raw(mut self, raw: Option<String>) -> Self {
        self.raw = raw;
        self
    }

    pub fn kind(mut self, kind: ParameterType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = Some(encrypted);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn show(mut self, condition: impl Into<String>) -> Self {
        self.show = Some(condition.into());
        self
    }

    pub fn hide(mut self, condition: impl Into<String>) -> Self {
        self.hide = Some(condition.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    fn list(mut self, list: bool) -> Self {
        self.list = Some(list);
        self
    }

    fn from_field(path: String, field: &SchemaField, raw: Option<String>) -> Self {
        let spec = Self::new(path)
            .kind(field.kind)
            .optional(field.optional)
            .maybe_raw(raw);
        if field.encrypted {
            spec.encrypted(true)
        } else {
            spec
        }
    }
}

/// How a schema is turned into parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterOptions {
    /// Treat every field as environment specific
    pub force_all: bool,
    /// Expand list fields into one parameter per element
    pub explode: bool,
    /// Path prepended to every parameter name
    pub prefix: Option<String>,
}

impl Default for ParameterOptions {
    fn default() -> Self {
        Self {
            force_all: false,
            explode: true,
            prefix: None,
        }
    }
}

/// Builds the parameters of one entry during one merge cycle.
pub struct ParameterMerger<'a> {
    entry: &'a mut MergeEntry,
    previous: Option<&'a MergeEntry>,
    touched: HashSet<String>,
}

impl<'a> ParameterMerger<'a> {
    /// `entry` is the entry being built, possibly holding what the same
    /// environment stored last time; `previous` is the same entry in the
    /// predecessor environment's result.
    pub fn new(entry: &'a mut MergeEntry, previous: Option<&'a MergeEntry>) -> Self {
        Self {
            entry,
            previous,
            touched: HashSet::new(),
        }
    }

    pub fn entry(&self) -> &MergeEntry {
        self.entry
    }

    pub fn entry_mut(&mut self) -> &mut MergeEntry {
        self.entry
    }

    pub fn previous(&self) -> Option<&'a MergeEntry> {
        self.previous
    }

    /// Create or update one parameter and return its merged state.
    pub fn upsert(&mut self, spec: ParameterSpec) -> Result<MergeParameter> {
        if spec.name.trim().is_empty() {
            return Err(Error::InvalidParameter {
                message: "parameter name is mandatory".to_string(),
            });
        }
        let raw = spec.raw.filter(|r| !r.is_empty());
        let first_touch = self.touched.insert(spec.name.clone());

        let index = match self.entry.parameters.iter().position(|p| p.name == spec.name) {
            Some(index) => {
                let parameter = &mut self.entry.parameters[index];
                // a pending review flag stays raised until an operator clears it
                if first_touch {
                    parameter.changed |= raw_changed(raw.as_deref(), parameter.raw.as_deref());
                    parameter.raw = None;
                }
                index
            }
            None => {
                let parameter = match self.previous.and_then(|p| p.parameter(&spec.name)) {
                    Some(old) => MergeParameter {
                        name: spec.name.clone(),
                        category: old.category.clone(),
                        title: old.title.clone(),
                        description: old.description.clone(),
                        kind: old.kind,
                        current: old.current.clone(),
                        previous: old.current.clone(),
                        optional: old.optional,
                        encrypted: old.encrypted,
                        changed: raw_changed(raw.as_deref(), old.raw.as_deref()),
                        ignore: old.ignore,
                        enumeration: old.enumeration.clone(),
                        ..MergeParameter::default()
                    },
                    None => MergeParameter {
                        name: spec.name.clone(),
                        current: raw.clone(),
                        changed: true,
                        ..MergeParameter::default()
                    },
                };
                self.entry.parameters.push(parameter);
                self.entry.parameters.len() - 1
            }
        };

        let parameter = &mut self.entry.parameters[index];
        if spec.description.is_some() {
            parameter.description = spec.description;
        }
        if spec.title.is_some() {
            parameter.title = spec.title;
        }
        if spec.category.is_some() {
            parameter.category = spec.category;
        }
        if spec.kind.is_some() {
            parameter.kind = spec.kind;
        }
        if let Some(optional) = spec.optional {
            parameter.optional = optional;
        }
        if let Some(encrypted) = spec.encrypted {
            parameter.encrypted = encrypted;
        }
        // later calls in the same cycle no longer see the artifact's value
        if raw.is_some() && parameter.raw.is_none() {
            parameter.raw = raw;
        }
        if !spec.enumeration.is_empty() {
            parameter.enumeration = spec.enumeration;
        }
        if let Some(priority) = spec.priority {
            parameter.priority = priority;
        }
        if spec.default_value.is_some() {
            parameter.default_value = spec.default_value;
        }
        if spec.show.is_some() {
            parameter.show = spec.show;
        }
        if spec.hide.is_some() {
            parameter.hide = spec.hide;
        }
        if let Some(list) = spec.list {
            parameter.list = list;
        }
        Ok(parameter.clone())
    }

    /// Walk `fields` and upsert a parameter for every environment-specific value.
    pub fn collect(
        &mut self,
        fields: &[SchemaField],
        source: &dyn ValueSource,
        options: &ParameterOptions,
    ) -> Result<Vec<MergeParameter>> {
        let mut produced = Vec::new();
        self.descend(fields, options.prefix.as_deref(), source, options, &mut produced)?;
        if options.explode {
            self.reconcile(&mut produced);
        }
        Ok(produced)
    }

    fn descend(
        &mut self,
        fields: &[SchemaField],
        path: Option<&str>,
        source: &dyn ValueSource,
        options: &ParameterOptions,
        produced: &mut Vec<MergeParameter>,
    ) -> Result<()> {
        for field in fields {
            let field_path = match path {
                Some(path) if !path.is_empty() => format!("{path}/{}", field.name),
                _ => field.name.clone(),
            };
            let included = options.force_all || field.environment_specific;

            if field.list && options.explode {
                // lists can only be expanded when the source has some value for them
                let Some(raw) = source.value(&field_path) else {
                    continue;
                };
                for (index, element) in raw.elements() {
                    let element_path = format!("{field_path}{index}");
                    if field.is_complex() {
                        if !element.is_null() {
                            self.descend(&field.children, Some(element_path.as_str()), source, options, produced)?;
                        }
                    } else if included {
                        let spec = ParameterSpec::from_field(element_path, field, element.as_text());
                        produced.push(self.upsert(spec)?);
                    }
                }
            } else if !field.is_complex() {
                if included {
                    let raw = source.value(&field_path);
                    let text = if field.list {
                        raw.and_then(|r| r.joined())
                    } else {
                        raw.and_then(|r| r.as_text())
                    };
                    let spec = ParameterSpec::from_field(field_path, field, text);
                    let spec = if field.list { spec.list(true) } else { spec };
                    produced.push(self.upsert(spec)?);
                }
            } else if !field.list {
                self.descend(&field.children, Some(field_path.as_str()), source, options, produced)?;
            }
        }
        Ok(())
    }

    /// Re-add known variants of the list elements seen in this cycle.
    ///
    /// When a list shrinks or grows, parameters for indexes the artifact no
    /// longer declares still belong to the entry. Any known parameter whose
    /// index-free path matches a path produced this cycle is kept verbatim.
    fn reconcile(&mut self, produced: &mut Vec<MergeParameter>) {
        let impacted: HashSet<String> = produced.iter().map(|p| strip_indexes(&p.name)).collect();
        let mut seen: HashSet<String> = produced.iter().map(|p| p.name.clone()).collect();

        let known: Vec<MergeParameter> = self
            .previous
            .map(|p| p.parameters.clone())
            .unwrap_or_default()
            .into_iter()
            .chain(self.entry.parameters.iter().cloned())
            .collect();

        for parameter in known {
            if seen.contains(&parameter.name) || !impacted.contains(&strip_indexes(&parameter.name)) {
                continue;
            }
            seen.insert(parameter.name.clone());
            if self.entry.parameter(&parameter.name).is_none() {
                self.entry.parameters.push(parameter.clone());
            }
            produced.push(parameter);
        }
    }
}

fn raw_changed(raw: Option<&str>, old_raw: Option<&str>) -> bool {
    match (raw, old_raw) {
        (None, old) => old.is_some(),
        (Some(raw), old) => old != Some(raw),
    }
}

/// Parameter name with every `[..]` element index removed.
pub fn strip_indexes(name: &str) -> String {
    ELEMENT_INDEX.replace_all(name, "").into_owned()
}
