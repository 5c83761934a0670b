//! Data model snapshot
//!
//! A read-only view over the runtime data model, addressable by data type
//! plus a dotted field path with array indices (`Group[1].Nested[0].Name`).
//! The engine only ever reads values and array lengths here; writes belong
//! to the external data-model store.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

/// One immutable snapshot of every data model instance, keyed by data type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataModelSnapshot {
    models: BTreeMap<String, JsonValue>,
    revision: u64,
}

impl DataModelSnapshot {
    pub fn new(models: BTreeMap<String, JsonValue>) -> Self {
        Self {
            models,
            revision: 0,
        }
    }

    pub fn with_revision(models: BTreeMap<String, JsonValue>, revision: u64) -> Self {
        Self { models, revision }
    }

    /// Monotonic counter used by the scheduler to discard stale passes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_data_type(&self, data_type: &str) -> bool {
        self.models.contains_key(data_type)
    }

    /// Read the value at a fully resolved field path. Returns None for
    /// unknown data types, malformed paths and absent fields alike.
    pub fn read(&self, data_type: &str, field: &str) -> Option<&JsonValue> {
        navigate(self.models.get(data_type)?, field)
    }

    /// Array length at a resolved path; 0 for absent or non-array values.
    pub fn list_len(&self, data_type: &str, field: &str) -> usize {
        self.read(data_type, field)
            .and_then(JsonValue::as_array)
            .map_or(0, Vec::len)
    }
}

/// Walk a dotted path with optional array indices down a JSON value.
fn navigate<'a>(root: &'a JsonValue, field: &str) -> Option<&'a JsonValue> {
    let mut current = root;
    for segment in field.split('.') {
        let (name, indices) = parse_segment(segment)?;
        current = current.get(name)?;
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Split one path segment into its name and trailing `[n]` indices.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let bracket = match segment.find('[') {
        Some(pos) => pos,
        None => return Some((segment, Vec::new())),
    };

    let name = &segment[..bracket];
    let mut indices = Vec::new();
    let mut rest = &segment[bracket..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let close = rest.find(']')?;
        let index: usize = rest[1..close].parse().ok()?;
        indices.push(index);
        rest = &rest[close + 1..];
    }
    Some((name, indices))
}
