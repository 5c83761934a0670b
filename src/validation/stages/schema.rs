//! Stage: Schema
//!
//! Structural checks on the static definition: container shape, repeat
//! configuration and row limits. Everything here is knowable without
//! touching the data model, so this stage runs first and gates the rest.

use crate::hierarchy::Node;
use crate::layout::ComponentKind;

use super::super::{Finding, Stage, StageContext, ValidationStage};

pub struct SchemaStage;

impl ValidationStage for SchemaStage {
    fn id(&self) -> &'static str {
        "schema"
    }

    fn description(&self) -> &'static str {
        "the component definition is structurally sound"
    }

    fn checkpoint(&self) -> Stage {
        Stage::SchemaChecked
    }

    fn applies_to(&self, _kind: ComponentKind) -> bool {
        true
    }

    fn validate(&self, node: &Node, _ctx: &StageContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let caps = node.kind.capabilities();
        let def = &node.def;

        if !caps.is_container && !def.children.is_empty() {
            findings.push(
                Finding::warning(&node.id, "children_ignored")
                    .with_params(def.children.clone()),
            );
        }

        if !caps.supports_repeat && def.max_count.is_some() {
            findings.push(Finding::warning(&node.id, "max_count_ignored"));
        }

        if caps.supports_repeat {
            let wants_repeat = def.max_count.map_or(false, |n| n > 1);
            if wants_repeat && !def.data_model_bindings.contains_key("group") {
                findings.push(Finding::error(
                    &node.id,
                    "repeating_group_without_binding",
                ));
            }
            if wants_repeat && def.children.is_empty() {
                findings.push(Finding::warning(&node.id, "repeating_group_without_children"));
            }
        }

        // Row count comes from the data model and may outgrow the declared
        // limit; extra rows still render but the author should know.
        if let Some(max) = def.max_count {
            if node.rows.len() > max as usize {
                findings.push(
                    Finding::warning(&node.id, "row_limit_exceeded")
                        .with_params(vec![node.rows.len().to_string(), max.to_string()]),
                );
            }
        }

        findings
    }
}
