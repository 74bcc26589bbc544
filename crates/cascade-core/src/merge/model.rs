//! Persisted merge records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of resolving one artifact, or of a whole merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeState {
    Succeeded,
    Failed,
    #[default]
    Pending,
}

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Long,
    Date,
    Boolean,
    #[default]
    String,
}

/// The merge of every artifact found on one environment branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeResult {
    pub entries: Vec<MergeEntry>,
    pub started: Option<DateTime<Utc>>,
    pub stopped: Option<DateTime<Utc>>,
    pub state: Option<MergeState>,
}

impl MergeResult {
    pub fn entry(&self, entry_id: &str) -> Option<&MergeEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    pub fn entry_mut(&mut self, entry_id: &str) -> Option<&mut MergeEntry> {
        self.entries.iter_mut().find(|e| e.entry_id == entry_id)
    }

    /// Succeeded when every entry succeeded, Pending otherwise.
    ///
    /// Failed entries do not produce a distinct aggregate state.
    pub fn aggregate_state(&self) -> MergeState {
        if self
            .entries
            .iter()
            .all(|e| e.state == MergeState::Succeeded)
        {
            MergeState::Succeeded
        } else {
            MergeState::Pending
        }
    }
}

/// The parameters of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeEntry {
    /// Dotted artifact path, e.g. `shop.services.database`
    pub entry_id: String,
    pub parameters: Vec<MergeParameter>,
    /// Artifact itself changed since the previous merge
    pub changed: bool,
    pub state: MergeState,
    pub log: Option<String>,
    pub error_log: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub comment: Option<String>,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl MergeEntry {
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            ..Self::default()
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&MergeParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut MergeParameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }
}

/// One configurable value of an artifact.
///
/// `raw` is what the artifact currently declares, `current` is the value the
/// environment uses and `previous` is what `current` was in the last merge.
/// Parameters are never dropped from a result; stale ones get `ignore` set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParameter {
    pub name: String,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ParameterType>,
    pub current: Option<String>,
    pub previous: Option<String>,
    pub raw: Option<String>,
    pub optional: bool,
    pub encrypted: bool,
    /// Raw value differs from the one the previous merge saw
    pub changed: bool,
    pub ignore: bool,
    pub priority: i32,
    pub enumeration: Vec<String>,
    /// Condition under which the parameter is shown to an operator
    pub show: Option<String>,
    pub hide: Option<String>,
    pub default_value: Option<String>,
    /// Value is a list joined with `", "`
    pub list: bool,
}

impl MergeParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aggregate_state() {
        let mut result = MergeResult::default();
        assert_eq!(result.aggregate_state(), MergeState::Succeeded);

        let mut ok = MergeEntry::new("a");
        ok.state = MergeState::Succeeded;
        result.entries.push(ok);
        assert_eq!(result.aggregate_state(), MergeState::Succeeded);

        let mut failed = MergeEntry::new("b");
        failed.state = MergeState::Failed;
        result.entries.push(failed);
        assert_eq!(result.aggregate_state(), MergeState::Pending);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut parameter = MergeParameter::new("host");
        parameter.kind = Some(ParameterType::Long);
        let mut entry = MergeEntry::new("shop.db");
        entry.state = MergeState::Failed;
        entry.parameters.push(parameter);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entry_id"], "shop.db");
        assert_eq!(json["state"], "FAILED");
        assert_eq!(json["parameters"][0]["type"], "long");
    }

    #[test]
    fn test_missing_fields_default() {
        let parameter: MergeParameter = serde_json::from_str(r#"{"name":"port"}"#).unwrap();
        assert_eq!(parameter, MergeParameter::new("port"));
    }
}
