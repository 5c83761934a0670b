//! Expression evaluation
//!
//! Interprets the layout expression language: an expression is either a
//! literal scalar, or a JSON array whose first element is a function name
//! and whose remaining elements are sub-expressions. Expressions arrive
//! pre-structured inside layout JSON and are interpreted directly as
//! `serde_json::Value`, no parsing step.
//!
//! Evaluation is recursive descent with a hard depth cap. Functions are
//! pure; the same expression against the same data-source snapshot always
//! yields the same result. Failures are values attached to the originating
//! node, never aborts.

pub mod functions;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::binding::RowContext;
use crate::diagnostics::DiagnosticKind;
use crate::sources::DataSources;

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Malformed expression or a function rejecting its arguments.
    #[error("{0}")]
    Invalid(String),

    /// Nesting exceeded the configured depth cap.
    #[error("expression exceeded the evaluation depth limit")]
    TooDeep,

    /// A `component` lookup hit a node whose hidden state is still unknown.
    /// Only the hidden resolver sees this; it re-queues the expression.
    #[error("dependency on '{0}' is not resolved yet")]
    Unresolved(String),
}

impl ExprError {
    pub fn into_diagnostic_kind(self) -> DiagnosticKind {
        match self {
            ExprError::Invalid(message) => DiagnosticKind::InvalidExpression(message),
            ExprError::TooDeep => DiagnosticKind::ExpressionTooDeep,
            // Unresolved never escapes the hidden resolver; if it does,
            // surface it as an expression failure.
            ExprError::Unresolved(id) => {
                DiagnosticKind::InvalidExpression(format!("unresolved reference to '{}'", id))
            }
        }
    }
}

pub type ExprResult = Result<JsonValue, ExprError>;

/* ===================== Context ===================== */

/// Everything an expression may look at during evaluation.
pub struct ExprContext<'a> {
    pub sources: &'a DataSources<'a>,
    /// Row context of the node the expression is attached to. Root for
    /// page-level expressions.
    pub row_context: &'a RowContext,
    pub max_depth: usize,
}

/* ===================== Evaluation ===================== */

/// Evaluate an expression to a literal scalar (string, number, boolean or
/// null).
pub fn evaluate(expr: &JsonValue, ctx: &ExprContext) -> ExprResult {
    evaluate_at(expr, ctx, 0)
}

fn evaluate_at(expr: &JsonValue, ctx: &ExprContext, depth: usize) -> ExprResult {
    if depth > ctx.max_depth {
        return Err(ExprError::TooDeep);
    }

    match expr {
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_) => {
            Ok(expr.clone())
        }

        JsonValue::Array(items) => {
            let name = items
                .first()
                .and_then(JsonValue::as_str)
                .ok_or_else(|| {
                    ExprError::Invalid("expression must start with a function name".to_string())
                })?;
            let func = functions::lookup(name)
                .ok_or_else(|| ExprError::Invalid(format!("unknown function '{}'", name)))?;

            let mut args = Vec::with_capacity(items.len() - 1);
            for item in &items[1..] {
                args.push(evaluate_at(item, ctx, depth + 1)?);
            }

            functions::call(func, &args, ctx)
        }

        JsonValue::Object(_) => Err(ExprError::Invalid(
            "objects are not valid expressions".to_string(),
        )),
    }
}

/// Evaluate an expression expected to produce a boolean, as used by hidden
/// fields and validation conditions. Null means `default`.
pub fn evaluate_bool(expr: &JsonValue, ctx: &ExprContext, default: bool) -> Result<bool, ExprError> {
    match evaluate(expr, ctx)? {
        JsonValue::Null => Ok(default),
        JsonValue::Bool(b) => Ok(b),
        JsonValue::String(s) if s == "true" => Ok(true),
        JsonValue::String(s) if s == "false" => Ok(false),
        other => Err(ExprError::Invalid(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests;
