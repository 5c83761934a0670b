//! Node generation
//!
//! Expands the flat component definitions of every page into a concrete
//! tree of nodes: one node per visible component *instance*. A repeating
//! group bound to an array of length N produces N row instances of each
//! child, with derived ids and row-transposed bindings.
//!
//! A tree is built fresh on every pass and never mutated afterwards; the
//! previous tree is discarded wholesale, so nothing can hold a stale node.
//! Structural problems (dangling child references, escaping bindings)
//! flag the offending node and generation continues for the rest.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::binding::{BindingResolver, DataModelReference, RowContext, RowEntry};
use crate::datamodel::DataModelSnapshot;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::layout::{
    ComponentDef, ComponentKind, GridCellDef, LayoutSet, LayoutSettings,
};

/* ===================== Nodes ===================== */

/// One row of a repeating group, with the node indices it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub index: usize,
    pub uuid: Uuid,
    pub members: Vec<usize>,
}

/// One cell of an instantiated grid row.
#[derive(Debug, Clone, PartialEq)]
pub enum GridNodeCell {
    /// Node index of the referenced component instance.
    Component(usize),
    Text(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridNodeRow {
    pub cells: Vec<GridNodeCell>,
}

/// A materialized instance of a component definition under one row context.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Derived id: base id plus the row-context suffix.
    pub id: String,
    pub base_id: String,
    pub kind: ComponentKind,
    pub page: String,
    pub row_context: RowContext,

    /// Bindings with row indices substituted. Bindings that failed to
    /// resolve are absent here and flagged as diagnostics.
    pub bindings: BTreeMap<String, DataModelReference>,

    /// Raw hidden expression (or literal boolean, or null for visible).
    pub hidden: JsonValue,

    /// The definition this node was generated from.
    pub def: ComponentDef,

    pub parent: Option<usize>,
    pub children: Vec<usize>,

    /// Repeating groups only.
    pub rows: Vec<NodeRow>,

    /// Grids only.
    pub grid_rows: Vec<GridNodeRow>,
}

/* ===================== Tree ===================== */

/// The generated tree: a flat, indexed list of nodes plus page grouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTree {
    nodes: Vec<Node>,
    id_index: BTreeMap<String, usize>,
    base_index: BTreeMap<String, Vec<usize>>,
    pages: BTreeMap<String, Vec<usize>>,
    page_order: Vec<String>,
    page_hidden: BTreeMap<String, JsonValue>,
    /// Component ids declared more than once at the same nesting level,
    /// reported by the validation pipeline's schema stage.
    duplicate_ids: Vec<(String, String)>,
}

impl NodeTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Find a node by its derived id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.id_index.get(id).map(|&i| &self.nodes[i])
    }

    /// All instances generated from one base id, in document order.
    pub fn by_base(&self, base_id: &str) -> Vec<&Node> {
        self.base_index
            .get(base_id)
            .map(|indices| indices.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    /// Pages in generation order.
    pub fn page_order(&self) -> &[String] {
        &self.page_order
    }

    pub fn page_nodes(&self, page: &str) -> &[usize] {
        self.pages.get(page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn page_hidden_expr(&self, page: &str) -> &JsonValue {
        self.page_hidden.get(page).unwrap_or(&JsonValue::Null)
    }

    pub fn duplicate_ids(&self) -> &[(String, String)] {
        &self.duplicate_ids
    }

    /// Find the instance of `id` closest to the given row context: an exact
    /// derived-id match wins, otherwise the instance of the base id sharing
    /// the longest common row prefix, ties broken by document order.
    pub fn closest(&self, id: &str, from: &RowContext) -> Option<&Node> {
        if let Some(node) = self.get(id) {
            return Some(node);
        }

        let candidates = self.base_index.get(id)?;
        let mut best: Option<(&Node, usize)> = None;
        for &index in candidates {
            let node = &self.nodes[index];
            let score = common_row_prefix(from, &node.row_context);
            let better = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };
            if better {
                best = Some((node, score));
            }
        }
        best.map(|(node, _)| node)
    }
}

fn common_row_prefix(a: &RowContext, b: &RowContext) -> usize {
    a.entries()
        .iter()
        .zip(b.entries())
        .take_while(|(x, y)| x.group_id == y.group_id && x.row_index == y.row_index)
        .count()
}

/* ===================== Generation ===================== */

/// Expand every page into nodes. Pure: same inputs, same tree.
pub fn generate(
    layouts: &LayoutSet,
    settings: &LayoutSettings,
    data: &DataModelSnapshot,
    default_data_type: &str,
    diagnostics: &mut DiagnosticSink,
) -> NodeTree {
    let resolver = BindingResolver::new(data, default_data_type);
    let mut tree = NodeTree::default();

    for page_name in settings.ordered_pages(layouts) {
        let page = match layouts.pages.get(page_name) {
            Some(page) => page,
            None => continue,
        };
        tree.page_order.push(page_name.to_string());
        tree.pages.insert(page_name.to_string(), Vec::new());
        tree.page_hidden
            .insert(page_name.to_string(), page.hidden.clone());

        let mut generator = PageGenerator {
            tree: &mut tree,
            resolver,
            data,
            page: page_name,
            definitions: BTreeMap::new(),
            diagnostics,
        };
        generator.run(page);
    }

    tree
}

struct PageGenerator<'a, 'b> {
    tree: &'a mut NodeTree,
    resolver: BindingResolver<'b>,
    data: &'b DataModelSnapshot,
    page: &'a str,
    definitions: BTreeMap<String, ComponentDef>,
    diagnostics: &'a mut DiagnosticSink,
}

impl PageGenerator<'_, '_> {
    fn run(&mut self, page: &crate::layout::LayoutPageDef) {
        // Index definitions by id; later duplicates are ignored here and
        // surfaced by the schema validation stage.
        let mut roots: Vec<String> = Vec::new();
        for def in &page.components {
            if self.definitions.contains_key(&def.id) {
                self.tree
                    .duplicate_ids
                    .push((self.page.to_string(), def.id.clone()));
                continue;
            }
            self.definitions.insert(def.id.clone(), def.clone());
            roots.push(def.id.clone());
        }

        // Components referenced as children are not roots.
        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for def in self.definitions.values() {
            for child in &def.children {
                referenced.insert(child.clone());
            }
            for row in &def.rows {
                for cell in &row.cells {
                    if let GridCellDef::Component { component } = cell {
                        referenced.insert(component.clone());
                    }
                }
            }
        }

        for id in roots {
            if referenced.contains(&id) {
                continue;
            }
            let def = self.definitions[&id].clone();
            self.instantiate(&def, None, &RowContext::root());
        }
    }

    /// Create the node for one definition under one row context, then
    /// recurse into children. Returns the node index.
    fn instantiate(
        &mut self,
        def: &ComponentDef,
        parent: Option<usize>,
        context: &RowContext,
    ) -> usize {
        let id = format!("{}{}", def.id, context.id_suffix());

        let mut bindings = BTreeMap::new();
        for name in def.data_model_bindings.keys() {
            match self.resolver.resolve(name, def, context) {
                Ok(reference) => {
                    bindings.insert(name.clone(), reference);
                }
                Err(err) => {
                    self.diagnostics
                        .report(Some(&id), err.into_diagnostic_kind());
                }
            }
        }

        let index = self.tree.nodes.len();
        self.tree.nodes.push(Node {
            id: id.clone(),
            base_id: def.id.clone(),
            kind: def.kind,
            page: self.page.to_string(),
            row_context: context.clone(),
            bindings,
            hidden: def.hidden.clone(),
            def: def.clone(),
            parent,
            children: Vec::new(),
            rows: Vec::new(),
            grid_rows: Vec::new(),
        });
        self.tree.id_index.insert(id.clone(), index);
        self.tree
            .base_index
            .entry(def.id.clone())
            .or_default()
            .push(index);
        if let Some(page_nodes) = self.tree.pages.get_mut(self.page) {
            page_nodes.push(index);
        }

        if def.is_repeating() {
            self.expand_rows(def, index, context);
        } else if def.kind == ComponentKind::Grid {
            self.expand_grid(def, index, context);
        } else if def.kind.capabilities().is_container {
            for child_id in &def.children {
                if let Some(child_index) = self.instantiate_child(child_id, index, context) {
                    self.tree.nodes[index].children.push(child_index);
                }
            }
        }

        index
    }

    /// One row instance per data-model array entry, ascending.
    fn expand_rows(&mut self, def: &ComponentDef, group_index: usize, context: &RowContext) {
        let group_reference = match self.tree.nodes[group_index].bindings.get("group") {
            Some(reference) => reference.clone(),
            // Unresolvable group binding was already flagged; no rows.
            None => return,
        };
        let base_field = match def.data_model_bindings.get("group") {
            Some(declared) => declared.field().to_string(),
            None => return,
        };
        let data_type = group_reference.data_type.clone();
        let row_count = self
            .data
            .list_len(&group_reference.data_type, &group_reference.field);

        for row_index in 0..row_count {
            let entry = RowEntry::new(self.page, &def.id, row_index, &base_field, &data_type);
            let row_uuid = entry.row_uuid;
            let child_context = context.child(entry);

            let mut members = Vec::new();
            for child_id in &def.children {
                if let Some(child_index) =
                    self.instantiate_child(child_id, group_index, &child_context)
                {
                    members.push(child_index);
                    self.tree.nodes[group_index].children.push(child_index);
                }
            }
            self.tree.nodes[group_index].rows.push(NodeRow {
                index: row_index,
                uuid: row_uuid,
                members,
            });
        }
    }

    fn expand_grid(&mut self, def: &ComponentDef, grid_index: usize, context: &RowContext) {
        for row in &def.rows {
            let mut cells = Vec::new();
            for cell in &row.cells {
                match cell {
                    GridCellDef::Component { component } => {
                        match self.instantiate_child(component, grid_index, context) {
                            Some(child_index) => {
                                self.tree.nodes[grid_index].children.push(child_index);
                                cells.push(GridNodeCell::Component(child_index));
                            }
                            None => cells.push(GridNodeCell::Empty),
                        }
                    }
                    GridCellDef::Text { text } => cells.push(GridNodeCell::Text(text.clone())),
                    GridCellDef::Empty {} => cells.push(GridNodeCell::Empty),
                }
            }
            self.tree.nodes[grid_index].grid_rows.push(GridNodeRow { cells });
        }
    }

    /// Look up and instantiate one declared child. A missing definition is
    /// a dangling reference: the container is flagged and generation moves
    /// on to its remaining children.
    fn instantiate_child(
        &mut self,
        child_id: &str,
        parent_index: usize,
        context: &RowContext,
    ) -> Option<usize> {
        let def = match self.definitions.get(child_id) {
            Some(def) => def.clone(),
            None => {
                let parent_id = self.tree.nodes[parent_index].id.clone();
                self.diagnostics.report(
                    Some(&parent_id),
                    DiagnosticKind::DanglingChildReference {
                        child: child_id.to_string(),
                    },
                );
                return None;
            }
        };
        Some(self.instantiate(&def, Some(parent_index), context))
    }
}

#[cfg(test)]
mod tests;
