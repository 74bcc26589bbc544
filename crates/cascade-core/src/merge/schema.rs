//! Structural schemas and the value sources parameters are read from

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::ParameterType;
use crate::{Error, Result};

/// The structure of an artifact's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

impl Schema {
    /// Parse a schema from its TOML form.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// One field of a [`Schema`]. A field with children is complex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub list: bool,
    /// Value differs per environment and becomes a parameter
    pub environment_specific: bool,
    pub optional: bool,
    pub encrypted: bool,
    pub children: Vec<SchemaField>,
}

impl SchemaField {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_complex(&self) -> bool {
        !self.children.is_empty()
    }
}

/// A value as read from a source, before it is turned into parameter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Null,
    Text(String),
    List(Vec<RawValue>),
    /// Keyed collection in source order
    Map(Vec<(String, RawValue)>),
}

/// Position of an element inside a list or map value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementIndex {
    Position(usize),
    Key(String),
}

impl fmt::Display for ElementIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, "[\"{key}\"]"),
        }
    }
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Elements of a collection value.
    ///
    /// A scalar where a collection was expected counts as a one-element list.
    pub fn elements(&self) -> Vec<(ElementIndex, &RawValue)> {
        match self {
            Self::Null => Vec::new(),
            Self::Text(_) => vec![(ElementIndex::Position(0), self)],
            Self::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (ElementIndex::Position(index), item))
                .collect(),
            Self::Map(entries) => entries
                .iter()
                .map(|(key, value)| (ElementIndex::Key(key.clone()), value))
                .collect(),
        }
    }

    /// Scalar text of the value; collections render as [`joined`](Self::joined).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::Map(_) => None,
            Self::Text(text) => Some(text.clone()),
            Self::List(_) => self.joined(),
        }
    }

    /// Every non-null element rendered as text and joined with `", "`.
    pub fn joined(&self) -> Option<String> {
        let parts: Vec<String> = self
            .elements()
            .into_iter()
            .filter_map(|(_, value)| value.as_text())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Looks up the value at a `/` separated path, e.g. `servers[1]/url`.
pub trait ValueSource {
    fn value(&self, path: &str) -> Option<RawValue>;
}

/// Values read from a JSON document.
#[derive(Debug, Clone)]
pub struct JsonValueSource {
    root: Value,
}

impl JsonValueSource {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(serde_json::from_slice(bytes)?))
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (name, indexes) = split_segment(segment).ok()?;
            if !name.is_empty() {
                current = current.get(name)?;
            }
            for index in indexes {
                current = match index {
                    ElementIndex::Position(i) => current.get(i)?,
                    ElementIndex::Key(key) => current.get(key.as_str())?,
                };
            }
        }
        Some(current)
    }
}

impl ValueSource for JsonValueSource {
    fn value(&self, path: &str) -> Option<RawValue> {
        self.lookup(path).map(RawValue::from)
    }
}

/// Split `name[0]["key"]` into its name and element indexes.
fn split_segment(segment: &str) -> Result<(&str, Vec<ElementIndex>)> {
    let invalid = || Error::Codec {
        path: segment.to_string(),
        message: "malformed element index".to_string(),
    };
    let Some(open) = segment.find('[') else {
        return Ok((segment, Vec::new()));
    };

    let name = &segment[..open];
    let mut rest = &segment[open..];
    let mut indexes = Vec::new();
    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix("[\"") {
            let end = quoted.find("\"]").ok_or_else(invalid)?;
            indexes.push(ElementIndex::Key(quoted[..end].to_string()));
            rest = &quoted[end + 2..];
        } else if let Some(numbered) = rest.strip_prefix('[') {
            let end = numbered.find(']').ok_or_else(invalid)?;
            let position = numbered[..end].parse().map_err(|_| invalid())?;
            indexes.push(ElementIndex::Position(position));
            rest = &numbered[end + 1..];
        } else {
            return Err(invalid());
        }
    }
    Ok((name, indexes))
}

/// Values held in a map, keyed by full path.
#[derive(Debug, Clone, Default)]
pub struct StaticValues {
    values: HashMap<String, RawValue>,
}

impl StaticValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: RawValue) -> Self {
        self.values.insert(path.into(), value);
        self
    }
}

impl ValueSource for StaticValues {
    fn value(&self, path: &str) -> Option<RawValue> {
        self.values.get(path).cloned()
    }
}
