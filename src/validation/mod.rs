//! Staged validation pipeline
//!
//! Validation runs per node through an ordered set of stages, each stage
//! implementing one aspect:
//!
//! 1. **Schema** - the static definition is structurally sound
//! 2. **Binding** - declared bindings resolve against the data model
//! 3. **Expression** - author-declared validation conditions
//!
//! Stages run independently of each other's findings; the node's final
//! [`Stage`] records the first checkpoint where an error-severity finding
//! appeared, or `Done` when none did. Hidden nodes are still
//! validated so their state is warm when they become visible, but their
//! findings are suppressed and must not be shown to the user.
//!
//! # Adding a New Stage
//!
//! 1. Create a new file in `validation/stages/`
//! 2. Implement [`ValidationStage`] for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod stages;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::datamodel::DataModelSnapshot;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::hidden::HiddenMap;
use crate::hierarchy::{Node, NodeTree};
use crate::layout::ComponentKind;
use crate::sources::{AmbientSources, DataSources, TreeComponentSource};

/* ===================== Findings ===================== */

/// Severity of a user-facing finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Success,
}

impl Severity {
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

/// One user-facing validation result, attached to a node instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub node_id: String,
    /// The binding name the finding is about, if any.
    pub field: Option<String>,
    pub severity: Severity,
    /// Message key, resolved to display text by a presentation collaborator.
    pub message: String,
    pub params: Vec<String>,
    /// True when the node is effectively hidden. Suppressed findings are
    /// kept for state but never shown.
    pub suppressed: bool,
}

impl Finding {
    pub fn new(node_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            field: None,
            severity,
            message: message.into(),
            params: Vec::new(),
            suppressed: false,
        }
    }

    pub fn error(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(node_id, Severity::Error, message)
    }

    pub fn warning(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(node_id, Severity::Warning, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.node_id,
            self.field.as_deref().unwrap_or(""),
            self.message,
            self.params.join(",")
        )
    }
}

/// Convert a user-facing diagnostic into the finding shown for it. Both
/// the stages and the diagnostic merge go through here so duplicates
/// collapse to one finding.
fn finding_from_diagnostic(node_id: &str, kind: &DiagnosticKind) -> Finding {
    Finding::error(node_id, kind.message_key()).with_params(vec![kind.to_string()])
}

/* ===================== Stage Progress ===================== */

/// How far a node got through the pipeline error-free. The checkpoint of
/// the first stage with an error-severity finding, or `Done` when every
/// applicable stage passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotValidated,
    SchemaChecked,
    BindingChecked,
    ExpressionChecked,
    Done,
}

/* ===================== ValidationStage Trait ===================== */

/// Read-only context shared by every stage.
pub struct StageContext<'a> {
    pub tree: &'a NodeTree,
    pub hidden: &'a HiddenMap,
    pub data: &'a DataModelSnapshot,
    pub default_data_type: &'a str,
    pub sources: &'a DataSources<'a>,
    pub config: &'a EngineConfig,
}

/// Trait that all validation stages implement.
///
/// Stages are independent of each other's findings and must not mutate
/// anything; each checks one aspect of one node.
pub trait ValidationStage: Send + Sync {
    /// Unique identifier for this stage (e.g. "binding")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this stage checks
    fn description(&self) -> &'static str;

    /// The checkpoint a node reaches once this stage has run.
    fn checkpoint(&self) -> Stage;

    /// Whether this stage applies to nodes of the given kind.
    fn applies_to(&self, kind: ComponentKind) -> bool;

    /// Check one node. Empty vector means no issues found.
    fn validate(&self, node: &Node, ctx: &StageContext) -> Vec<Finding>;
}

/* ===================== Validator ===================== */

/// Runs all stages over every node of a tree, in order.
pub struct Validator {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl Validator {
    /// Create a validator with all built-in stages, in pipeline order.
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(stages::SchemaStage),
                Box::new(stages::BindingStage),
                Box::new(stages::ExpressionStage),
            ],
        }
    }

    /// Registered stages, in order (useful for documentation).
    pub fn stages(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.stages.iter().map(|s| (s.id(), s.description()))
    }

    /// Run the pipeline for one node. Returns the node's findings and the
    /// highest checkpoint it reached error-free. Every applicable stage
    /// runs regardless of earlier findings; an inapplicable stage is
    /// skipped, not failed.
    fn validate_node(&self, node: &Node, ctx: &StageContext) -> (Vec<Finding>, Stage) {
        let mut findings = Vec::new();
        let mut reached = Stage::Done;
        let mut clean = true;

        for stage in &self.stages {
            if stage.applies_to(node.kind) {
                let stage_findings = stage.validate(node, ctx);
                let failed = stage_findings.iter().any(|f| f.severity.is_error());
                findings.extend(stage_findings);
                if failed && clean {
                    reached = stage.checkpoint();
                    clean = false;
                }
            }
        }

        (findings, reached)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/* ===================== Public API ===================== */

/// Everything one validation run produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub findings: Vec<Finding>,
    /// Pipeline progress per node id.
    pub stages: BTreeMap<String, Stage>,
}

impl ValidationOutcome {
    /// Findings that should actually be shown.
    pub fn visible_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.suppressed)
    }

    pub fn has_blocking_errors(&self) -> bool {
        self.visible_findings().any(|f| f.severity.is_error())
    }
}

/// Validate a whole tree against the resolved hidden map.
///
/// Hidden nodes run the full pipeline with their findings suppressed.
/// User-facing diagnostics recorded during generation and hidden
/// resolution are merged in as error findings.
pub fn validate_tree(
    tree: &NodeTree,
    hidden: &HiddenMap,
    data: &DataModelSnapshot,
    default_data_type: &str,
    ambient: &AmbientSources,
    config: &EngineConfig,
    diagnostics: &DiagnosticSink,
) -> ValidationOutcome {
    let components = TreeComponentSource::new(tree, data, hidden);
    let sources = DataSources {
        data,
        default_data_type,
        instance: &ambient.instance,
        settings: &ambient.settings,
        components: Some(&components),
    };
    let ctx = StageContext {
        tree,
        hidden,
        data,
        default_data_type,
        sources: &sources,
        config,
    };

    let validator = Validator::new();
    let mut outcome = ValidationOutcome::default();

    // Redeclared ids never generate a second node, so this finding is
    // tree-level rather than a stage of some node.
    for (page, id) in tree.duplicate_ids() {
        outcome.findings.push(
            Finding::error(id.clone(), "duplicate_component_id")
                .with_params(vec![page.clone()]),
        );
    }

    for node in tree.nodes() {
        let (mut findings, reached) = validator.validate_node(node, &ctx);
        if hidden.is_hidden(&node.id) {
            for finding in &mut findings {
                finding.suppressed = true;
            }
        }
        outcome.findings.extend(findings);
        outcome.stages.insert(node.id.clone(), reached);
    }

    for diagnostic in diagnostics.iter() {
        if !diagnostic.kind.is_user_facing() {
            continue;
        }
        if let Some(node_id) = &diagnostic.node_id {
            let mut finding = finding_from_diagnostic(node_id, &diagnostic.kind);
            finding.suppressed = hidden.is_hidden(node_id);
            outcome.findings.push(finding);
        }
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    outcome
        .findings
        .retain(|finding| seen.insert(finding.fingerprint()));

    outcome
}
