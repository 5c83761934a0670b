//! Hidden-state resolution
//!
//! Evaluates every node's and page's hidden expression to a stable
//! assignment. Hidden expressions may reference other components' values,
//! and a component's value reads as null while it is hidden, so hidden
//! states depend on each other. Resolution is an iterative fixed point
//! over a tri-state map: a node is evaluated once all of its dependencies
//! are known, and the loop runs until nothing changes or a bounded number
//! of rounds is exhausted.
//!
//! Nodes still unresolved at that point are part of a dependency cycle.
//! They fail open to visible: hiding data a user needs is worse than
//! showing a slightly wrong form.

use std::collections::BTreeMap;

use crate::binding::RowContext;
use crate::config::EngineConfig;
use crate::datamodel::DataModelSnapshot;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::expression::{self, ExprContext, ExprError};
use crate::hierarchy::{GridNodeCell, Node, NodeTree};
use crate::sources::{AmbientSources, DataSources, HiddenLookup, TreeComponentSource};

/* ===================== States ===================== */

/// Tri-state hidden assignment used while the fixed point is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenState {
    Unknown,
    Hidden,
    Visible,
}

impl HiddenState {
    pub fn is_known(self) -> bool {
        self != HiddenState::Unknown
    }
}

/// The stable result: effective hidden flags for every node, page and row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HiddenMap {
    nodes: BTreeMap<String, bool>,
    pages: BTreeMap<String, bool>,
    /// Per-row collapse state, keyed by the owning group/grid node id.
    rows: BTreeMap<String, Vec<bool>>,
}

impl HiddenMap {
    pub fn is_hidden(&self, node_id: &str) -> bool {
        self.nodes.get(node_id).copied().unwrap_or(false)
    }

    pub fn page_hidden(&self, page: &str) -> bool {
        self.pages.get(page).copied().unwrap_or(false)
    }

    pub fn row_hidden(&self, owner_id: &str, row: usize) -> bool {
        self.rows
            .get(owner_id)
            .and_then(|rows| rows.get(row))
            .copied()
            .unwrap_or(false)
    }

    pub fn nodes(&self) -> &BTreeMap<String, bool> {
        &self.nodes
    }
}

impl HiddenLookup for HiddenMap {
    fn hidden_state(&self, node_id: &str) -> HiddenState {
        if self.is_hidden(node_id) {
            HiddenState::Hidden
        } else {
            HiddenState::Visible
        }
    }
}

#[derive(Default)]
struct WorkingStates {
    nodes: BTreeMap<String, HiddenState>,
    pages: BTreeMap<String, HiddenState>,
}

impl WorkingStates {
    fn node(&self, id: &str) -> HiddenState {
        self.nodes
            .get(id)
            .copied()
            .unwrap_or(HiddenState::Unknown)
    }

    fn page(&self, name: &str) -> HiddenState {
        self.pages
            .get(name)
            .copied()
            .unwrap_or(HiddenState::Unknown)
    }
}

impl HiddenLookup for WorkingStates {
    fn hidden_state(&self, node_id: &str) -> HiddenState {
        self.node(node_id)
    }
}

/* ===================== Resolution ===================== */

enum OwnHidden {
    Known(bool),
    /// Depends on a node whose hidden state is still unknown.
    Pending,
}

/// Resolve hidden state for the whole tree.
pub fn resolve_hidden(
    tree: &NodeTree,
    data: &DataModelSnapshot,
    default_data_type: &str,
    ambient: &AmbientSources,
    config: &EngineConfig,
    diagnostics: &mut DiagnosticSink,
) -> HiddenMap {
    let mut states = WorkingStates::default();
    let cap = config.hidden_cap_for(tree.len());
    let mut rounds = 0;

    loop {
        let unresolved = count_unresolved(tree, &states);
        if unresolved == 0 || rounds >= cap {
            break;
        }
        rounds += 1;

        let mut page_changes: Vec<(String, HiddenState)> = Vec::new();
        let mut node_changes: Vec<(String, HiddenState)> = Vec::new();
        {
            let components = TreeComponentSource::new(tree, data, &states);
            let sources = DataSources {
                data,
                default_data_type,
                instance: &ambient.instance,
                settings: &ambient.settings,
                components: Some(&components),
            };

            for page in tree.page_order() {
                if states.page(page).is_known() {
                    continue;
                }
                let page_ref = format!("page:{}", page);
                let own = evaluate_own(
                    tree.page_hidden_expr(page),
                    &sources,
                    &RowContext::root(),
                    Some(&page_ref),
                    config,
                    diagnostics,
                );
                if let OwnHidden::Known(hidden) = own {
                    page_changes.push((page.clone(), to_state(hidden)));
                }
            }

            for node in tree.nodes() {
                if states.node(&node.id).is_known() {
                    continue;
                }
                let own = evaluate_own(
                    &node.hidden,
                    &sources,
                    &node.row_context,
                    Some(&node.id),
                    config,
                    diagnostics,
                );
                let own = match own {
                    OwnHidden::Known(own) => own,
                    OwnHidden::Pending => continue,
                };
                // A node hidden in its own right needs no ancestor answer.
                if own {
                    node_changes.push((node.id.clone(), HiddenState::Hidden));
                    continue;
                }
                match ancestor_state(tree, node, &states) {
                    HiddenState::Unknown => {}
                    ancestor => node_changes.push((node.id.clone(), ancestor)),
                }
            }
        }

        if page_changes.is_empty() && node_changes.is_empty() {
            // No progress possible: the remaining nodes form cycles.
            break;
        }
        for (page, state) in page_changes {
            states.pages.insert(page, state);
        }
        for (id, state) in node_changes {
            states.nodes.insert(id, state);
        }
    }

    fail_open_unresolved(tree, &mut states, diagnostics);
    build_map(tree, &states)
}

fn count_unresolved(tree: &NodeTree, states: &WorkingStates) -> usize {
    let pages = tree
        .page_order()
        .iter()
        .filter(|p| !states.page(p).is_known())
        .count();
    let nodes = tree
        .nodes()
        .iter()
        .filter(|n| !states.node(&n.id).is_known())
        .count();
    pages + nodes
}

fn to_state(hidden: bool) -> HiddenState {
    if hidden {
        HiddenState::Hidden
    } else {
        HiddenState::Visible
    }
}

/// The effective state contributed by the parent chain: the parent node's
/// resolved state, or the page's for root nodes.
fn ancestor_state(tree: &NodeTree, node: &Node, states: &WorkingStates) -> HiddenState {
    match node.parent {
        Some(parent) => states.node(&tree.node(parent).id),
        None => states.page(&node.page),
    }
}

/// Evaluate one hidden expression. Hard failures are reported and fail
/// open to visible; unresolved component references defer the node.
fn evaluate_own(
    expr: &serde_json::Value,
    sources: &DataSources,
    row_context: &RowContext,
    node_id: Option<&str>,
    config: &EngineConfig,
    diagnostics: &mut DiagnosticSink,
) -> OwnHidden {
    match expr {
        serde_json::Value::Null => OwnHidden::Known(false),
        serde_json::Value::Bool(b) => OwnHidden::Known(*b),
        other => {
            let ctx = ExprContext {
                sources,
                row_context,
                max_depth: config.max_expression_depth,
            };
            match expression::evaluate_bool(other, &ctx, false) {
                Ok(hidden) => OwnHidden::Known(hidden),
                Err(ExprError::Unresolved(_)) => OwnHidden::Pending,
                Err(err) => {
                    diagnostics.report(node_id, err.into_diagnostic_kind());
                    OwnHidden::Known(false)
                }
            }
        }
    }
}

/// Remaining unknowns are cyclic: default them to visible and record one
/// diagnostic naming all of them.
fn fail_open_unresolved(
    tree: &NodeTree,
    states: &mut WorkingStates,
    diagnostics: &mut DiagnosticSink,
) {
    let mut cyclic: Vec<String> = Vec::new();
    for page in tree.page_order() {
        if !states.page(page).is_known() {
            cyclic.push(format!("page:{}", page));
            states.pages.insert(page.clone(), HiddenState::Visible);
        }
    }
    for node in tree.nodes() {
        if !states.node(&node.id).is_known() {
            cyclic.push(node.id.clone());
            states
                .nodes
                .insert(node.id.clone(), HiddenState::Visible);
        }
    }
    if !cyclic.is_empty() {
        cyclic.sort();
        diagnostics.report(None, DiagnosticKind::HiddenCycleDetected { nodes: cyclic });
    }
}

/// Freeze the working states into the published map and compute row
/// collapse: a row hides when it has at least one component-bearing cell
/// and every such cell is hidden. Rows without component cells never
/// auto-hide.
fn build_map(tree: &NodeTree, states: &WorkingStates) -> HiddenMap {
    let mut map = HiddenMap::default();
    for page in tree.page_order() {
        map.pages
            .insert(page.clone(), states.page(page) == HiddenState::Hidden);
    }
    for node in tree.nodes() {
        map.nodes
            .insert(node.id.clone(), states.node(&node.id) == HiddenState::Hidden);
    }

    for node in tree.nodes() {
        if !node.rows.is_empty() {
            let row_states: Vec<bool> = node
                .rows
                .iter()
                .map(|row| {
                    let cells: Vec<&Node> = row
                        .members
                        .iter()
                        .map(|&i| tree.node(i))
                        .filter(|n| n.kind.capabilities().renders_in_table)
                        .collect();
                    !cells.is_empty() && cells.iter().all(|n| map.is_hidden(&n.id))
                })
                .collect();
            map.rows.insert(node.id.clone(), row_states);
        }
        if !node.grid_rows.is_empty() {
            let row_states: Vec<bool> = node
                .grid_rows
                .iter()
                .map(|row| {
                    let cells: Vec<&Node> = row
                        .cells
                        .iter()
                        .filter_map(|cell| match cell {
                            GridNodeCell::Component(i) => Some(tree.node(*i)),
                            _ => None,
                        })
                        .filter(|n| n.kind.capabilities().renders_in_table)
                        .collect();
                    !cells.is_empty() && cells.iter().all(|n| map.is_hidden(&n.id))
                })
                .collect();
            map.rows.insert(node.id.clone(), row_states);
        }
    }

    map
}
