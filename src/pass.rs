//! One resolution pass
//!
//! A pass is the pure, synchronous pipeline over one data snapshot:
//! generate the node tree, resolve hidden state to a fixed point, then run
//! validation. The same input always produces the same output; all
//! scheduling and mutation lives outside, in [`crate::scheduler`].

use crate::config::EngineConfig;
use crate::datamodel::DataModelSnapshot;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::hidden::{self, HiddenMap};
use crate::hierarchy::{self, NodeTree};
use crate::layout::{LayoutSet, LayoutSettings};
use crate::sources::AmbientSources;
use crate::validation::{self, ValidationOutcome};

/// Everything one pass reads.
#[derive(Debug, Clone, Default)]
pub struct PassInput {
    pub layouts: LayoutSet,
    pub settings: LayoutSettings,
    pub data: DataModelSnapshot,
    /// Data type used by bindings that do not name one explicitly.
    pub default_data_type: String,
    pub ambient: AmbientSources,
}

/// Everything one pass produces.
#[derive(Debug, Clone)]
pub struct PassOutput {
    /// Revision of the data snapshot this output was computed from.
    pub revision: u64,
    pub tree: NodeTree,
    pub hidden: HiddenMap,
    pub validation: ValidationOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

impl PassOutput {
    /// Nodes that should actually render: effectively visible, in page and
    /// document order.
    pub fn visible_node_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for page in self.tree.page_order() {
            if self.hidden.page_hidden(page) {
                continue;
            }
            for &index in self.tree.page_nodes(page) {
                let node = self.tree.node(index);
                if !self.hidden.is_hidden(&node.id) {
                    out.push(node.id.as_str());
                }
            }
        }
        out
    }
}

/// Run one full pass.
pub fn run_pass(input: &PassInput, config: &EngineConfig) -> PassOutput {
    let mut diagnostics = DiagnosticSink::new();

    let tree = hierarchy::generate(
        &input.layouts,
        &input.settings,
        &input.data,
        &input.default_data_type,
        &mut diagnostics,
    );
    let hidden = hidden::resolve_hidden(
        &tree,
        &input.data,
        &input.default_data_type,
        &input.ambient,
        config,
        &mut diagnostics,
    );
    let validation = validation::validate_tree(
        &tree,
        &hidden,
        &input.data,
        &input.default_data_type,
        &input.ambient,
        config,
        &diagnostics,
    );

    tracing::debug!(
        target: "formtree::pass",
        revision = input.data.revision(),
        nodes = tree.len(),
        findings = validation.findings.len(),
        diagnostics = diagnostics.len(),
        "pass complete"
    );

    PassOutput {
        revision: input.data.revision(),
        tree,
        hidden,
        validation,
        diagnostics: diagnostics.into_vec(),
    }
}
