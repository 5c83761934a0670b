//! Data model bindings
//!
//! Maps a logical binding name on a component, plus the row context the
//! component instance lives in, to a concrete data-model address. The
//! resolver only ever produces addresses; reads go through
//! [`crate::datamodel::DataModelSnapshot`] and writes are out of scope.
//!
//! Transposition follows the original row-rewriting rule: a binding declared
//! on a descendant of a repeating group must start with the group's own
//! bound path, and every open row index is substituted outermost first.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::datamodel::DataModelSnapshot;
use crate::diagnostics::DiagnosticKind;
use crate::layout::{ComponentDef, JsonKind};

/* ===================== References ===================== */

/// One concrete scalar/array location in the data model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelReference {
    pub data_type: String,
    pub field: String,
}

impl std::fmt::Display for DataModelReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.data_type, self.field)
    }
}

/* ===================== Row Context ===================== */

/// One level of repeating-group nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEntry {
    /// Base id of the repeating group.
    pub group_id: String,
    pub row_index: usize,
    pub row_uuid: Uuid,
    /// The group's declared, unindexed bound path.
    pub base_field: String,
    /// Data type the group binding points into.
    pub data_type: String,
}

impl RowEntry {
    /// Row UUIDs are derived from the row coordinates so that regenerating
    /// an unchanged tree reproduces them exactly.
    pub fn new(
        page: &str,
        group_id: &str,
        row_index: usize,
        base_field: &str,
        data_type: &str,
    ) -> Self {
        let seed = format!("{}/{}/{}", page, group_id, row_index);
        Self {
            group_id: group_id.to_string(),
            row_index,
            row_uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()),
            base_field: base_field.to_string(),
            data_type: data_type.to_string(),
        }
    }
}

/// The ordered stack of repeating-group rows a node instance lives inside,
/// outermost first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowContext {
    entries: Vec<RowEntry>,
}

impl RowContext {
    pub fn root() -> Self {
        Self::default()
    }

    /// A child context is always the parent plus exactly one entry.
    pub fn child(&self, entry: RowEntry) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entry);
        Self { entries }
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.entries
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_root(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row indices, outermost first.
    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.row_index).collect()
    }

    /// The id suffix for nodes under this context: `-<outer>-...-<inner>`.
    /// Empty at the root. Bijective with the index stack, so a derived id
    /// maps back to (base id, row context).
    pub fn id_suffix(&self) -> String {
        let mut suffix = String::new();
        for entry in &self.entries {
            suffix.push('-');
            suffix.push_str(&entry.row_index.to_string());
        }
        suffix
    }
}

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("binding '{0}' is not declared for this component type")]
    UnknownBinding(String),

    #[error("field '{field}' has type {actual}, accepted: {}", .accepted.iter().map(JsonKind::to_string).collect::<Vec<_>>().join(", "))]
    DataModelMismatch {
        field: String,
        actual: JsonKind,
        accepted: Vec<JsonKind>,
    },

    #[error("binding '{binding}' escapes the group binding '{group}'")]
    BindingEscapesGroup { binding: String, group: String },
}

impl BindingError {
    pub fn into_diagnostic_kind(self) -> DiagnosticKind {
        match self {
            BindingError::UnknownBinding(name) => DiagnosticKind::UnknownBinding(name),
            BindingError::DataModelMismatch {
                field,
                actual,
                accepted,
            } => DiagnosticKind::DataModelMismatch {
                field,
                actual: actual.to_string(),
                accepted: accepted
                    .iter()
                    .map(JsonKind::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            BindingError::BindingEscapesGroup { binding, group } => {
                DiagnosticKind::BindingEscapesGroup { binding, group }
            }
        }
    }
}

/* ===================== Transposition ===================== */

/// Strip `prefix` from `path`, requiring a path-boundary after it.
fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('.') || rest.starts_with('[') {
        Some(rest)
    } else {
        None
    }
}

/// Substitute every open row index in `raw` using the row context,
/// outermost first. Only entries bound into `data_type` participate;
/// a binding into another data model is never inside the group.
pub fn transpose_field(
    raw: &str,
    data_type: &str,
    context: &RowContext,
) -> Result<String, BindingError> {
    // (unindexed path as seen at this level, indexed path) per entry
    let mut chain: Vec<(String, String)> = Vec::new();
    for entry in context.entries() {
        if entry.data_type != data_type {
            continue;
        }
        let mut base = entry.base_field.clone();
        for (from, to) in &chain {
            match strip_path_prefix(&base, from) {
                Some(rest) => base = format!("{}{}", to, rest),
                None => {
                    return Err(BindingError::BindingEscapesGroup {
                        binding: entry.base_field.clone(),
                        group: from.clone(),
                    })
                }
            }
        }
        let indexed = format!("{}[{}]", base, entry.row_index);
        chain.push((base, indexed));
    }

    let mut out = raw.to_string();
    for (from, to) in &chain {
        match strip_path_prefix(&out, from) {
            // An explicit index in the subject path pins that row; deeper
            // levels stay as written.
            Some(rest) if rest.starts_with('[') => break,
            Some(rest) => out = format!("{}{}", to, rest),
            None => {
                return Err(BindingError::BindingEscapesGroup {
                    binding: raw.to_string(),
                    group: from.clone(),
                })
            }
        }
    }
    Ok(out)
}

/* ===================== Resolver ===================== */

/// Resolves logical binding names to concrete data-model references.
#[derive(Debug, Clone, Copy)]
pub struct BindingResolver<'a> {
    pub data: &'a DataModelSnapshot,
    /// Data type used by bindings that do not name one explicitly.
    pub default_data_type: &'a str,
}

impl<'a> BindingResolver<'a> {
    pub fn new(data: &'a DataModelSnapshot, default_data_type: &'a str) -> Self {
        Self {
            data,
            default_data_type,
        }
    }

    /// Resolve one binding on a component instance.
    ///
    /// Fails with `UnknownBinding` when the name is foreign to the
    /// component's type or not declared on the definition, with
    /// `BindingEscapesGroup` when row substitution is impossible, and with
    /// `DataModelMismatch` when the addressed value's type is not accepted.
    pub fn resolve(
        &self,
        name: &str,
        def: &ComponentDef,
        context: &RowContext,
    ) -> Result<DataModelReference, BindingError> {
        let spec = def
            .kind
            .binding_spec(name)
            .ok_or_else(|| BindingError::UnknownBinding(name.to_string()))?;
        let decl = def
            .data_model_bindings
            .get(name)
            .ok_or_else(|| BindingError::UnknownBinding(name.to_string()))?;

        let data_type = decl.data_type().unwrap_or(self.default_data_type);
        let field = transpose_field(decl.field(), data_type, context)?;

        if let Some(value) = self.data.read(data_type, &field) {
            if let Some(actual) = JsonKind::of(value) {
                if !spec.accepts.contains(&actual) {
                    return Err(BindingError::DataModelMismatch {
                        field,
                        actual,
                        accepted: spec.accepts.to_vec(),
                    });
                }
            }
        }

        Ok(DataModelReference {
            data_type: data_type.to_string(),
            field,
        })
    }
}
