//! Data source bundle
//!
//! The pluggable set of sources expressions evaluate against: the form
//! data snapshot, instance metadata, application settings and other
//! components' resolved values. Component lookups go through a trait so
//! the hidden resolver can expose a partially-resolved view while the
//! fixed point is still being computed.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value as JsonValue;

use crate::binding::RowContext;
use crate::datamodel::DataModelSnapshot;
use crate::expression::{ExprError, ExprResult};
use crate::hidden::HiddenState;
use crate::hierarchy::NodeTree;

/* ===================== Bundle ===================== */

/// Instance metadata and application settings, owned by the caller and
/// shared by every pass until they change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientSources {
    pub instance: BTreeMap<String, String>,
    pub settings: BTreeMap<String, JsonValue>,
}

/// Everything expressions may reference.
pub struct DataSources<'a> {
    pub data: &'a DataModelSnapshot,
    pub default_data_type: &'a str,
    /// Instance metadata for the `instanceContext` function.
    pub instance: &'a BTreeMap<String, String>,
    /// Application settings for the `frontendSettings` function.
    pub settings: &'a BTreeMap<String, JsonValue>,
    /// Component value lookup; absent where no tree exists yet.
    pub components: Option<&'a dyn ComponentSource>,
}

/// Resolves another component's value relative to the evaluating node.
pub trait ComponentSource {
    fn component_value(&self, id: &str, from: &RowContext) -> ExprResult;
}

/// Hidden state lookup during and after fixed-point resolution.
pub trait HiddenLookup {
    fn hidden_state(&self, node_id: &str) -> HiddenState;
}

/* ===================== Tree-backed Lookup ===================== */

/// Component lookup backed by a generated node tree.
///
/// Values are memoized per target node for the lifetime of this source,
/// which is scoped to a single pass; nothing is shared across passes.
pub struct TreeComponentSource<'a> {
    tree: &'a NodeTree,
    data: &'a DataModelSnapshot,
    hidden: &'a dyn HiddenLookup,
    cache: RefCell<HashMap<String, JsonValue>>,
}

impl<'a> TreeComponentSource<'a> {
    pub fn new(
        tree: &'a NodeTree,
        data: &'a DataModelSnapshot,
        hidden: &'a dyn HiddenLookup,
    ) -> Self {
        Self {
            tree,
            data,
            hidden,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl ComponentSource for TreeComponentSource<'_> {
    fn component_value(&self, id: &str, from: &RowContext) -> ExprResult {
        let node = self.tree.closest(id, from).ok_or_else(|| {
            ExprError::Invalid(format!("unable to find component with identifier '{}'", id))
        })?;

        match self.hidden.hidden_state(&node.id) {
            HiddenState::Unknown => Err(ExprError::Unresolved(node.id.clone())),
            // Hidden components read as null so stale values never leak
            // into visible parts of the form.
            HiddenState::Hidden => Ok(JsonValue::Null),
            HiddenState::Visible => {
                if let Some(cached) = self.cache.borrow().get(&node.id) {
                    return Ok(cached.clone());
                }
                let reference = node.bindings.get("simpleBinding").ok_or_else(|| {
                    ExprError::Invalid(format!(
                        "component '{}' does not have a simpleBinding",
                        node.id
                    ))
                })?;
                let value = match self.data.read(&reference.data_type, &reference.field) {
                    Some(
                        value @ (JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)),
                    ) => value.clone(),
                    _ => JsonValue::Null,
                };
                self.cache.borrow_mut().insert(node.id.clone(), value.clone());
                Ok(value)
            }
        }
    }
}
