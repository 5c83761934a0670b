//! Stage: Expression
//!
//! Runs author-declared validation conditions. A condition that evaluates
//! to true fires its finding at the declared severity; a condition that
//! fails to evaluate is itself an authoring error.

use crate::expression::{self, ExprContext};
use crate::hierarchy::Node;
use crate::layout::ComponentKind;

use super::super::{finding_from_diagnostic, Finding, Stage, StageContext, ValidationStage};

pub struct ExpressionStage;

impl ValidationStage for ExpressionStage {
    fn id(&self) -> &'static str {
        "expression"
    }

    fn description(&self) -> &'static str {
        "author-declared validation conditions"
    }

    fn checkpoint(&self) -> Stage {
        Stage::ExpressionChecked
    }

    fn applies_to(&self, _kind: ComponentKind) -> bool {
        true
    }

    fn validate(&self, node: &Node, ctx: &StageContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let expr_ctx = ExprContext {
            sources: ctx.sources,
            row_context: &node.row_context,
            max_depth: ctx.config.max_expression_depth,
        };

        for rule in &node.def.validations {
            match expression::evaluate_bool(&rule.condition, &expr_ctx, false) {
                Ok(true) => {
                    findings.push(
                        Finding::new(&node.id, rule.severity, &rule.message)
                            .with_params(rule.params.clone()),
                    );
                }
                Ok(false) => {}
                Err(err) => {
                    findings.push(finding_from_diagnostic(&node.id, &err.into_diagnostic_kind()));
                }
            }
        }

        findings
    }
}
