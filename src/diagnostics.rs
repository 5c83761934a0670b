//! Node-scoped diagnostics
//!
//! Every failure in this crate is a diagnostic attached to the node (or page)
//! that caused it. A diagnostic never aborts a pass: generation, hidden
//! resolution and validation all continue for unaffected nodes.
//!
//! Diagnostics are deduplicated per sink and logged once per distinct cause,
//! so rapid regeneration does not flood the log with the same authoring bug.

use std::collections::HashSet;

use thiserror::Error;

/* ===================== Diagnostic Kinds ===================== */

/// Everything that can go wrong while resolving a layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosticKind {
    /// An expression was malformed or a function rejected its arguments.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// An expression nested deeper than the configured depth cap.
    #[error("expression exceeded the evaluation depth limit")]
    ExpressionTooDeep,

    /// A binding name is not declared for the component's type.
    #[error("unknown binding '{0}' for this component type")]
    UnknownBinding(String),

    /// The data model field's type is not accepted by the component.
    #[error("data model field '{field}' has type {actual}, component accepts one of: {accepted}")]
    DataModelMismatch {
        field: String,
        actual: String,
        accepted: String,
    },

    /// A binding on a repeating-group descendant does not start with the
    /// group's own bound path, so row indices cannot be substituted.
    #[error("binding '{binding}' escapes the repeating group binding '{group}'")]
    BindingEscapesGroup { binding: String, group: String },

    /// A container lists a child id that is not declared in the layout.
    #[error("child '{child}' is not declared in this layout")]
    DanglingChildReference { child: String },

    /// Hidden resolution hit the iteration cap with these nodes unresolved.
    /// The nodes default to visible.
    #[error("hidden state never stabilized for: {}", nodes.join(", "))]
    HiddenCycleDetected { nodes: Vec<String> },
}

impl DiagnosticKind {
    /// Whether this diagnostic should also surface as a user-facing finding.
    ///
    /// Structural errors in the static layout definition are authoring bugs
    /// and stay developer-facing. Cycle detection fails open, so the user
    /// sees the data and needs no message.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::InvalidExpression(_)
                | DiagnosticKind::ExpressionTooDeep
                | DiagnosticKind::UnknownBinding(_)
                | DiagnosticKind::DataModelMismatch { .. }
        )
    }

    /// Stable message key for user-facing findings.
    pub fn message_key(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidExpression(_) => "invalid_expression",
            DiagnosticKind::ExpressionTooDeep => "expression_too_deep",
            DiagnosticKind::UnknownBinding(_) => "unknown_binding",
            DiagnosticKind::DataModelMismatch { .. } => "data_model_mismatch",
            DiagnosticKind::BindingEscapesGroup { .. } => "binding_escapes_group",
            DiagnosticKind::DanglingChildReference { .. } => "dangling_child_reference",
            DiagnosticKind::HiddenCycleDetected { .. } => "hidden_cycle_detected",
        }
    }
}

/* ===================== Diagnostic ===================== */

/// One diagnostic, attached to the node that caused it (or to no node for
/// page/layout-level problems).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub node_id: Option<String>,
    pub kind: DiagnosticKind,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{}] {}", id, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/* ===================== Sink ===================== */

/// Collects diagnostics for one pass.
///
/// Duplicate causes (same node, same kind, same message) are recorded and
/// logged only once.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    seen: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Returns true if it was new for this sink.
    pub fn report(&mut self, node_id: Option<&str>, kind: DiagnosticKind) -> bool {
        let fingerprint = format!("{}|{}", node_id.unwrap_or(""), kind);
        if !self.seen.insert(fingerprint) {
            return false;
        }

        let diagnostic = Diagnostic {
            node_id: node_id.map(str::to_string),
            kind,
        };
        tracing::warn!(target: "formtree::diagnostics", "{}", diagnostic);
        self.diagnostics.push(diagnostic);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_deduplicates_same_cause() {
        let mut sink = DiagnosticSink::new();
        assert!(sink.report(
            Some("a"),
            DiagnosticKind::UnknownBinding("simpleBinding".into())
        ));
        assert!(!sink.report(
            Some("a"),
            DiagnosticKind::UnknownBinding("simpleBinding".into())
        ));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_report_keeps_distinct_nodes_apart() {
        let mut sink = DiagnosticSink::new();
        sink.report(Some("a"), DiagnosticKind::ExpressionTooDeep);
        sink.report(Some("b"), DiagnosticKind::ExpressionTooDeep);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_structural_kinds_are_developer_facing() {
        assert!(!DiagnosticKind::DanglingChildReference {
            child: "x".into()
        }
        .is_user_facing());
        assert!(!DiagnosticKind::BindingEscapesGroup {
            binding: "A.B".into(),
            group: "A.G".into()
        }
        .is_user_facing());
        assert!(DiagnosticKind::ExpressionTooDeep.is_user_facing());
    }
}
