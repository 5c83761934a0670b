//! Stage: Binding
//!
//! Checks that every binding the component's kind requires is declared and
//! that declared bindings resolve against the current data model. The
//! resolver is the same one generation uses, so a binding that was flagged
//! while the tree was built collapses into the same finding here.

use crate::binding::BindingResolver;
use crate::hierarchy::Node;
use crate::layout::ComponentKind;

use super::super::{finding_from_diagnostic, Finding, Stage, StageContext, ValidationStage};

pub struct BindingStage;

impl ValidationStage for BindingStage {
    fn id(&self) -> &'static str {
        "binding"
    }

    fn description(&self) -> &'static str {
        "declared bindings resolve against the data model"
    }

    fn checkpoint(&self) -> Stage {
        Stage::BindingChecked
    }

    fn applies_to(&self, kind: ComponentKind) -> bool {
        kind.capabilities().validates_data_binding
    }

    fn validate(&self, node: &Node, ctx: &StageContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let resolver = BindingResolver::new(ctx.data, ctx.default_data_type);

        for spec in node.kind.capabilities().bindings {
            let declared = node.def.data_model_bindings.contains_key(spec.name);
            if spec.required && !declared {
                findings.push(
                    Finding::error(&node.id, "required_binding_missing").with_field(spec.name),
                );
                continue;
            }
            if !declared {
                continue;
            }
            if let Err(err) = resolver.resolve(spec.name, &node.def, &node.row_context) {
                findings.push(finding_from_diagnostic(&node.id, &err.into_diagnostic_kind()));
            }
        }

        findings
    }
}
