//! Tests for the expression evaluator and its function set

use maplit::btreemap;
use serde_json::json;

use super::*;
use crate::binding::RowEntry;
use crate::datamodel::DataModelSnapshot;

fn snapshot() -> DataModelSnapshot {
    DataModelSnapshot::new(btreemap! {
        "Model".to_string() => json!({
            "Name": "Ada",
            "Age": 36,
            "Meta": { "Version": 2 },
            "Birthdate": "1990-05-17",
            "People": [
                { "Name": "Grace", "Age": 47 },
                { "Name": "Alan", "Age": 41 },
            ],
        }),
    })
}

fn eval_in(expr: serde_json::Value, row_context: &RowContext) -> ExprResult {
    let data = snapshot();
    let instance = btreemap! {
        "appId".to_string() => "org/app".to_string(),
        "instanceOwnerPartyId".to_string() => "512345".to_string(),
    };
    let settings = btreemap! {
        "theme".to_string() => json!("dark"),
    };
    let sources = DataSources {
        data: &data,
        default_data_type: "Model",
        instance: &instance,
        settings: &settings,
        components: None,
    };
    let ctx = ExprContext {
        sources: &sources,
        row_context,
        max_depth: 64,
    };
    evaluate(&expr, &ctx)
}

fn eval(expr: serde_json::Value) -> ExprResult {
    eval_in(expr, &RowContext::root())
}

#[test]
fn test_literals_pass_through() {
    assert_eq!(eval(json!(null)), Ok(json!(null)));
    assert_eq!(eval(json!(true)), Ok(json!(true)));
    assert_eq!(eval(json!(42)), Ok(json!(42)));
    assert_eq!(eval(json!("plain string")), Ok(json!("plain string")));
}

#[test]
fn test_objects_are_not_expressions() {
    assert!(matches!(eval(json!({ "a": 1 })), Err(ExprError::Invalid(_))));
}

#[test]
fn test_unknown_function_is_invalid() {
    assert!(matches!(
        eval(json!(["noSuchFunction", 1])),
        Err(ExprError::Invalid(_))
    ));
    assert!(matches!(eval(json!([1, 2])), Err(ExprError::Invalid(_))));
}

#[test]
fn test_equals_coerces_scalars_to_strings() {
    assert_eq!(eval(json!(["equals", "a", "a"])), Ok(json!(true)));
    assert_eq!(eval(json!(["equals", 2, "2"])), Ok(json!(true)));
    assert_eq!(eval(json!(["equals", true, "true"])), Ok(json!(true)));
    assert_eq!(eval(json!(["equals", null, null])), Ok(json!(true)));
    assert_eq!(eval(json!(["equals", null, "a"])), Ok(json!(false)));
    assert_eq!(eval(json!(["notEquals", "a", "b"])), Ok(json!(true)));
}

#[test]
fn test_boolean_connectives_treat_null_as_false() {
    assert_eq!(eval(json!(["not", true])), Ok(json!(false)));
    assert_eq!(eval(json!(["not", null])), Ok(json!(true)));
    assert_eq!(eval(json!(["and", true, true, true])), Ok(json!(true)));
    assert_eq!(eval(json!(["and", true, null])), Ok(json!(false)));
    assert_eq!(eval(json!(["or", false, null, true])), Ok(json!(true)));
    assert_eq!(eval(json!(["or", false, null])), Ok(json!(false)));
}

#[test]
fn test_if_with_and_without_else() {
    assert_eq!(eval(json!(["if", true, "yes"])), Ok(json!("yes")));
    assert_eq!(eval(json!(["if", false, "yes"])), Ok(json!(null)));
    assert_eq!(
        eval(json!(["if", false, "yes", "else", "no"])),
        Ok(json!("no"))
    );
    assert!(matches!(
        eval(json!(["if", true, "yes", "otherwise", "no"])),
        Err(ExprError::Invalid(_))
    ));
}

#[test]
fn test_comparisons_parse_numeric_strings() {
    assert_eq!(eval(json!(["greaterThan", 3, 2])), Ok(json!(true)));
    assert_eq!(eval(json!(["greaterThan", "3", " 2 "])), Ok(json!(true)));
    assert_eq!(eval(json!(["lessThanEq", 2, 2])), Ok(json!(true)));
    // A null operand makes any comparison false.
    assert_eq!(eval(json!(["lessThan", null, 2])), Ok(json!(false)));
    assert!(matches!(
        eval(json!(["greaterThan", "abc", 2])),
        Err(ExprError::Invalid(_))
    ));
}

#[test]
fn test_string_functions() {
    assert_eq!(eval(json!(["concat", "a", null, "b", 3])), Ok(json!("ab3")));
    assert_eq!(eval(json!(["contains", "haystack", "ays"])), Ok(json!(true)));
    assert_eq!(eval(json!(["contains", null, "x"])), Ok(json!(false)));
    assert_eq!(eval(json!(["notContains", "abc", "z"])), Ok(json!(true)));
    assert_eq!(eval(json!(["startsWith", "abc", "ab"])), Ok(json!(true)));
    assert_eq!(eval(json!(["endsWith", "abc", "bc"])), Ok(json!(true)));
    assert_eq!(eval(json!(["stringLength", "abc"])), Ok(json!(3)));
    assert_eq!(eval(json!(["stringLength", null])), Ok(json!(0)));
    assert_eq!(
        eval(json!(["commaContains", "a, b ,c", "b"])),
        Ok(json!(true))
    );
    assert_eq!(eval(json!(["lowerCase", "AbC"])), Ok(json!("abc")));
    assert_eq!(eval(json!(["upperCase", "abc"])), Ok(json!("ABC")));
    assert_eq!(eval(json!(["lowerCase", null])), Ok(json!(null)));
}

#[test]
fn test_round_formats_to_decimal_places() {
    assert_eq!(eval(json!(["round", 1.2345, 2])), Ok(json!("1.23")));
    assert_eq!(eval(json!(["round", 1.5])), Ok(json!("2")));
    assert_eq!(eval(json!(["round", null])), Ok(json!("0")));
}

#[test]
fn test_format_date() {
    assert_eq!(
        eval(json!(["formatDate", "1990-05-17"])),
        Ok(json!("17.05.1990"))
    );
    assert_eq!(
        eval(json!(["formatDate", "1990-05-17T13:45:30", "yyyy-MM-dd HH:mm"])),
        Ok(json!("1990-05-17 13:45"))
    );
    assert!(matches!(
        eval(json!(["formatDate", "1990-05-17", "QQQQ"])),
        Err(ExprError::Invalid(_))
    ));
    assert!(matches!(
        eval(json!(["formatDate", "not a date"])),
        Err(ExprError::Invalid(_))
    ));
    assert_eq!(eval(json!(["formatDate", null])), Ok(json!(null)));
}

#[test]
fn test_data_model_reads_scalars_only() {
    assert_eq!(eval(json!(["dataModel", "Name"])), Ok(json!("Ada")));
    assert_eq!(eval(json!(["dataModel", "Age"])), Ok(json!(36)));
    // Objects, arrays and absent fields read as null.
    assert_eq!(eval(json!(["dataModel", "Meta"])), Ok(json!(null)));
    assert_eq!(eval(json!(["dataModel", "People"])), Ok(json!(null)));
    assert_eq!(eval(json!(["dataModel", "Nope"])), Ok(json!(null)));
    assert!(matches!(
        eval(json!(["dataModel", "Name", "OtherType"])),
        Err(ExprError::Invalid(_))
    ));
}

#[test]
fn test_data_model_transposes_to_row_context() {
    let context = RowContext::root().child(RowEntry::new("page", "g", 1, "People", "Model"));
    assert_eq!(
        eval_in(json!(["dataModel", "People.Name"]), &context),
        Ok(json!("Alan"))
    );
    // Paths outside the group are read as declared.
    assert_eq!(eval_in(json!(["dataModel", "Name"]), &context), Ok(json!("Ada")));
}

#[test]
fn test_instance_context_and_settings() {
    assert_eq!(
        eval(json!(["instanceContext", "appId"])),
        Ok(json!("org/app"))
    );
    assert_eq!(eval(json!(["instanceContext", "instanceId"])), Ok(json!(null)));
    assert!(matches!(
        eval(json!(["instanceContext", "somethingElse"])),
        Err(ExprError::Invalid(_))
    ));
    assert_eq!(eval(json!(["frontendSettings", "theme"])), Ok(json!("dark")));
    assert_eq!(eval(json!(["frontendSettings", "missing"])), Ok(json!(null)));
}

#[test]
fn test_component_lookup_requires_a_source() {
    assert!(matches!(
        eval(json!(["component", "name"])),
        Err(ExprError::Invalid(_))
    ));
}

#[test]
fn test_nested_expressions_compose() {
    assert_eq!(
        eval(json!(["if", ["greaterThan", ["dataModel", "Age"], 18], "adult", "else", "minor"])),
        Ok(json!("adult"))
    );
}

#[test]
fn test_depth_cap_stops_runaway_nesting() {
    let mut expr = json!("x");
    for _ in 0..80 {
        expr = json!(["concat", expr]);
    }
    let data = snapshot();
    let instance = Default::default();
    let settings = Default::default();
    let sources = DataSources {
        data: &data,
        default_data_type: "Model",
        instance: &instance,
        settings: &settings,
        components: None,
    };
    let root = RowContext::root();
    let ctx = ExprContext {
        sources: &sources,
        row_context: &root,
        max_depth: 64,
    };
    assert_eq!(evaluate(&expr, &ctx), Err(ExprError::TooDeep));
}

#[test]
fn test_evaluate_bool_semantics() {
    let data = snapshot();
    let instance = Default::default();
    let settings = Default::default();
    let sources = DataSources {
        data: &data,
        default_data_type: "Model",
        instance: &instance,
        settings: &settings,
        components: None,
    };
    let root = RowContext::root();
    let ctx = ExprContext {
        sources: &sources,
        row_context: &root,
        max_depth: 64,
    };
    assert_eq!(evaluate_bool(&json!(null), &ctx, true), Ok(true));
    assert_eq!(evaluate_bool(&json!(null), &ctx, false), Ok(false));
    assert_eq!(evaluate_bool(&json!("true"), &ctx, false), Ok(true));
    assert_eq!(evaluate_bool(&json!(["not", false]), &ctx, false), Ok(true));
    assert!(evaluate_bool(&json!(42), &ctx, false).is_err());
}
