//! Expression function implementations
//!
//! The closed set of functions the expression language knows, dispatched
//! through a lookup table keyed by name. Every function validates its own
//! argument count and types and fails with a descriptive message; the
//! evaluator attaches that failure to the originating node.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value as JsonValue};

use super::{ExprContext, ExprError, ExprResult};
use crate::binding::transpose_field;

/* ===================== Function Set ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprFunction {
    Equals,
    NotEquals,
    Not,
    And,
    Or,
    If,
    GreaterThan,
    GreaterThanEq,
    LessThan,
    LessThanEq,
    Concat,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    StringLength,
    CommaContains,
    LowerCase,
    UpperCase,
    Round,
    FormatDate,
    DataModel,
    Component,
    InstanceContext,
    FrontendSettings,
}

/// Look up a function by its expression-language name.
pub fn lookup(name: &str) -> Option<ExprFunction> {
    let func = match name {
        "equals" => ExprFunction::Equals,
        "notEquals" => ExprFunction::NotEquals,
        "not" => ExprFunction::Not,
        "and" => ExprFunction::And,
        "or" => ExprFunction::Or,
        "if" => ExprFunction::If,
        "greaterThan" => ExprFunction::GreaterThan,
        "greaterThanEq" => ExprFunction::GreaterThanEq,
        "lessThan" => ExprFunction::LessThan,
        "lessThanEq" => ExprFunction::LessThanEq,
        "concat" => ExprFunction::Concat,
        "contains" => ExprFunction::Contains,
        "notContains" => ExprFunction::NotContains,
        "startsWith" => ExprFunction::StartsWith,
        "endsWith" => ExprFunction::EndsWith,
        "stringLength" => ExprFunction::StringLength,
        "commaContains" => ExprFunction::CommaContains,
        "lowerCase" => ExprFunction::LowerCase,
        "upperCase" => ExprFunction::UpperCase,
        "round" => ExprFunction::Round,
        "formatDate" => ExprFunction::FormatDate,
        "dataModel" => ExprFunction::DataModel,
        "component" => ExprFunction::Component,
        "instanceContext" => ExprFunction::InstanceContext,
        "frontendSettings" => ExprFunction::FrontendSettings,
        _ => return None,
    };
    Some(func)
}

/// Dispatch a call with already-evaluated arguments.
pub fn call(func: ExprFunction, args: &[JsonValue], ctx: &ExprContext) -> ExprResult {
    match func {
        ExprFunction::Equals => {
            expect_args("equals", args, 2, 2)?;
            Ok(json!(arg_string("equals", args, 0)? == arg_string("equals", args, 1)?))
        }
        ExprFunction::NotEquals => {
            expect_args("notEquals", args, 2, 2)?;
            Ok(json!(
                arg_string("notEquals", args, 0)? != arg_string("notEquals", args, 1)?
            ))
        }
        ExprFunction::Not => {
            expect_args("not", args, 1, 1)?;
            Ok(json!(!arg_bool("not", args, 0)?.unwrap_or(false)))
        }
        ExprFunction::And => {
            expect_args("and", args, 1, usize::MAX)?;
            let mut out = true;
            for i in 0..args.len() {
                out = out && arg_bool("and", args, i)?.unwrap_or(false);
            }
            Ok(json!(out))
        }
        ExprFunction::Or => {
            expect_args("or", args, 1, usize::MAX)?;
            let mut out = false;
            for i in 0..args.len() {
                out = out || arg_bool("or", args, i)?.unwrap_or(false);
            }
            Ok(json!(out))
        }
        ExprFunction::If => call_if(args),
        ExprFunction::GreaterThan => compare("greaterThan", args, |a, b| a > b),
        ExprFunction::GreaterThanEq => compare("greaterThanEq", args, |a, b| a >= b),
        ExprFunction::LessThan => compare("lessThan", args, |a, b| a < b),
        ExprFunction::LessThanEq => compare("lessThanEq", args, |a, b| a <= b),
        ExprFunction::Concat => {
            let mut out = String::new();
            for i in 0..args.len() {
                if let Some(part) = arg_string("concat", args, i)? {
                    out.push_str(&part);
                }
            }
            Ok(json!(out))
        }
        ExprFunction::Contains => {
            expect_args("contains", args, 2, 2)?;
            match (arg_string("contains", args, 0)?, arg_string("contains", args, 1)?) {
                (Some(haystack), Some(needle)) => Ok(json!(haystack.contains(&needle))),
                _ => Ok(json!(false)),
            }
        }
        ExprFunction::NotContains => {
            expect_args("notContains", args, 2, 2)?;
            match (
                arg_string("notContains", args, 0)?,
                arg_string("notContains", args, 1)?,
            ) {
                (Some(haystack), Some(needle)) => Ok(json!(!haystack.contains(&needle))),
                _ => Ok(json!(true)),
            }
        }
        ExprFunction::StartsWith => {
            expect_args("startsWith", args, 2, 2)?;
            match (
                arg_string("startsWith", args, 0)?,
                arg_string("startsWith", args, 1)?,
            ) {
                (Some(s), Some(prefix)) => Ok(json!(s.starts_with(&prefix))),
                _ => Ok(json!(false)),
            }
        }
        ExprFunction::EndsWith => {
            expect_args("endsWith", args, 2, 2)?;
            match (
                arg_string("endsWith", args, 0)?,
                arg_string("endsWith", args, 1)?,
            ) {
                (Some(s), Some(suffix)) => Ok(json!(s.ends_with(&suffix))),
                _ => Ok(json!(false)),
            }
        }
        ExprFunction::StringLength => {
            expect_args("stringLength", args, 1, 1)?;
            let length = arg_string("stringLength", args, 0)?
                .map_or(0, |s| s.chars().count());
            Ok(json!(length))
        }
        ExprFunction::CommaContains => {
            expect_args("commaContains", args, 2, 2)?;
            match (
                arg_string("commaContains", args, 0)?,
                arg_string("commaContains", args, 1)?,
            ) {
                (Some(list), Some(needle)) => {
                    let found = list.split(',').any(|part| part.trim() == needle);
                    Ok(json!(found))
                }
                _ => Ok(json!(false)),
            }
        }
        ExprFunction::LowerCase => {
            expect_args("lowerCase", args, 1, 1)?;
            Ok(arg_string("lowerCase", args, 0)?
                .map_or(JsonValue::Null, |s| json!(s.to_lowercase())))
        }
        ExprFunction::UpperCase => {
            expect_args("upperCase", args, 1, 1)?;
            Ok(arg_string("upperCase", args, 0)?
                .map_or(JsonValue::Null, |s| json!(s.to_uppercase())))
        }
        ExprFunction::Round => {
            expect_args("round", args, 1, 2)?;
            let number = arg_number("round", args, 0)?.unwrap_or(0.0);
            let decimals = if args.len() > 1 {
                arg_number("round", args, 1)?.unwrap_or(0.0) as usize
            } else {
                0
            };
            Ok(json!(format!("{:.*}", decimals, number)))
        }
        ExprFunction::FormatDate => call_format_date(args),
        ExprFunction::DataModel => call_data_model(args, ctx),
        ExprFunction::Component => {
            expect_args("component", args, 1, 1)?;
            let id = arg_string("component", args, 0)?
                .ok_or_else(|| ExprError::Invalid("cannot look up component null".to_string()))?;
            let components = ctx.sources.components.ok_or_else(|| {
                ExprError::Invalid("component lookups are not available here".to_string())
            })?;
            components.component_value(&id, ctx.row_context)
        }
        ExprFunction::InstanceContext => {
            expect_args("instanceContext", args, 1, 1)?;
            let key = arg_string("instanceContext", args, 0)?.ok_or_else(|| {
                ExprError::Invalid("unknown instance context property null".to_string())
            })?;
            const KNOWN: &[&str] = &[
                "instanceId",
                "appId",
                "instanceOwnerPartyId",
                "instanceOwnerPartyType",
            ];
            if !KNOWN.contains(&key.as_str()) {
                return Err(ExprError::Invalid(format!(
                    "unknown instance context property '{}'",
                    key
                )));
            }
            Ok(ctx
                .sources
                .instance
                .get(&key)
                .map_or(JsonValue::Null, |v| json!(v)))
        }
        ExprFunction::FrontendSettings => {
            expect_args("frontendSettings", args, 1, 1)?;
            let key = arg_string("frontendSettings", args, 0)?
                .ok_or_else(|| ExprError::Invalid("settings key cannot be null".to_string()))?;
            Ok(ctx
                .sources
                .settings
                .get(&key)
                .cloned()
                .unwrap_or(JsonValue::Null))
        }
    }
}

/* ===================== Individual Functions ===================== */

/// `if` takes either 2 arguments, or 4 where the third must be the literal
/// string "else".
fn call_if(args: &[JsonValue]) -> ExprResult {
    match args.len() {
        2 => {
            let condition = arg_bool("if", args, 0)?.unwrap_or(false);
            Ok(if condition { args[1].clone() } else { JsonValue::Null })
        }
        4 => {
            if args[2].as_str() != Some("else") {
                return Err(ExprError::Invalid(
                    "expected third argument to 'if' to be \"else\"".to_string(),
                ));
            }
            let condition = arg_bool("if", args, 0)?.unwrap_or(false);
            Ok(if condition { args[1].clone() } else { args[3].clone() })
        }
        n => Err(ExprError::Invalid(format!(
            "expected either 2 arguments (if) or 4 (if + else), got {}",
            n
        ))),
    }
}

fn call_format_date(args: &[JsonValue]) -> ExprResult {
    expect_args("formatDate", args, 1, 2)?;
    let raw = match arg_string("formatDate", args, 0)? {
        Some(s) => s,
        None => return Ok(JsonValue::Null),
    };
    let format = if args.len() > 1 {
        arg_string("formatDate", args, 1)?.unwrap_or_else(|| "dd.MM.yyyy".to_string())
    } else {
        "dd.MM.yyyy".to_string()
    };
    let strftime = translate_date_format(&format)?;

    let formatted = if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S") {
        dt.format(&strftime).to_string()
    } else if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        date.format(&strftime).to_string()
    } else {
        return Err(ExprError::Invalid(format!("unable to parse date '{}'", raw)));
    };
    Ok(json!(formatted))
}

/// Translate the supported subset of Unicode date tokens to strftime.
fn translate_date_format(format: &str) -> Result<String, ExprError> {
    let mut out = String::new();
    let mut rest = format;
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = after;
                continue 'outer;
            }
        }
        let ch = match rest.chars().next() {
            Some(ch) => ch,
            None => break,
        };
        if ch.is_ascii_alphabetic() {
            return Err(ExprError::Invalid(format!(
                "unsupported date format token in '{}'",
                format
            )));
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}

/// `dataModel` reads a scalar at a path, transposed to the evaluating
/// node's rows. Transposition here is lenient: a path outside the current
/// groups is read as declared.
fn call_data_model(args: &[JsonValue], ctx: &ExprContext) -> ExprResult {
    expect_args("dataModel", args, 1, 2)?;
    let path = arg_string("dataModel", args, 0)?
        .ok_or_else(|| ExprError::Invalid("cannot look up dataModel null".to_string()))?;
    let data_type = if args.len() > 1 {
        arg_string("dataModel", args, 1)?
            .unwrap_or_else(|| ctx.sources.default_data_type.to_string())
    } else {
        ctx.sources.default_data_type.to_string()
    };

    if !ctx.sources.data.has_data_type(&data_type) {
        return Err(ExprError::Invalid(format!(
            "data model with type '{}' not found",
            data_type
        )));
    }

    let field =
        transpose_field(&path, &data_type, ctx.row_context).unwrap_or_else(|_| path.clone());
    Ok(pick_simple_value(ctx, &data_type, &field))
}

/// Scalars come through as-is, everything else (objects, arrays, absent
/// fields) reads as null.
fn pick_simple_value(ctx: &ExprContext, data_type: &str, field: &str) -> JsonValue {
    match ctx.sources.data.read(data_type, field) {
        Some(value @ (JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_))) => {
            value.clone()
        }
        _ => JsonValue::Null,
    }
}

fn compare(name: &str, args: &[JsonValue], op: fn(f64, f64) -> bool) -> ExprResult {
    expect_args(name, args, 2, 2)?;
    match (arg_number(name, args, 0)?, arg_number(name, args, 1)?) {
        (Some(a), Some(b)) => Ok(json!(op(a, b))),
        _ => Ok(json!(false)),
    }
}

/* ===================== Argument Coercion ===================== */

fn expect_args(name: &str, args: &[JsonValue], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        return Err(ExprError::Invalid(format!(
            "'{}' expects between {} and {} arguments, got {}",
            name,
            min,
            if max == usize::MAX {
                "any".to_string()
            } else {
                max.to_string()
            },
            args.len()
        )));
    }
    Ok(())
}

fn arg_string(name: &str, args: &[JsonValue], index: usize) -> Result<Option<String>, ExprError> {
    match args.get(index).unwrap_or(&JsonValue::Null) {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s.clone())),
        JsonValue::Number(n) => Ok(Some(n.to_string())),
        JsonValue::Bool(b) => Ok(Some(b.to_string())),
        other => Err(ExprError::Invalid(format!(
            "'{}' argument {} cannot be cast to a string: {}",
            name,
            index + 1,
            other
        ))),
    }
}

fn arg_number(name: &str, args: &[JsonValue], index: usize) -> Result<Option<f64>, ExprError> {
    match args.get(index).unwrap_or(&JsonValue::Null) {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => Ok(n.as_f64()),
        JsonValue::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => Err(ExprError::Invalid(format!(
                "'{}' argument {} is not a number: '{}'",
                name,
                index + 1,
                s
            ))),
        },
        other => Err(ExprError::Invalid(format!(
            "'{}' argument {} cannot be cast to a number: {}",
            name,
            index + 1,
            other
        ))),
    }
}

fn arg_bool(name: &str, args: &[JsonValue], index: usize) -> Result<Option<bool>, ExprError> {
    match args.get(index).unwrap_or(&JsonValue::Null) {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(b) => Ok(Some(*b)),
        JsonValue::String(s) if s == "true" => Ok(Some(true)),
        JsonValue::String(s) if s == "false" => Ok(Some(false)),
        JsonValue::Number(n) if n.as_f64() == Some(1.0) => Ok(Some(true)),
        JsonValue::Number(n) if n.as_f64() == Some(0.0) => Ok(Some(false)),
        other => Err(ExprError::Invalid(format!(
            "'{}' argument {} cannot be cast to a boolean: {}",
            name,
            index + 1,
            other
        ))),
    }
}
