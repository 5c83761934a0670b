//! Tests for node generation: repeat expansion, derived ids, grids and
//! closest-instance lookup

use maplit::btreemap;
use serde_json::json;

use super::*;
use crate::layout::LayoutPageDef;

fn layouts(pages: &[(&str, serde_json::Value)]) -> (LayoutSet, LayoutSettings) {
    let mut set = LayoutSet::default();
    let mut order = Vec::new();
    for (name, page) in pages {
        let page: LayoutPageDef = serde_json::from_value(page.clone()).unwrap();
        set.pages.insert(name.to_string(), page);
        order.push(name.to_string());
    }
    let settings = LayoutSettings {
        page_order: order,
        ..Default::default()
    };
    (set, settings)
}

fn generate_tree(
    pages: &[(&str, serde_json::Value)],
    data: serde_json::Value,
) -> (NodeTree, DiagnosticSink) {
    let (set, settings) = layouts(pages);
    let snapshot = DataModelSnapshot::new(btreemap! {
        "Model".to_string() => data,
    });
    let mut diagnostics = DiagnosticSink::new();
    let tree = generate(&set, &settings, &snapshot, "Model", &mut diagnostics);
    (tree, diagnostics)
}

fn people_page() -> serde_json::Value {
    json!({
        "components": [
            { "id": "g", "type": "Group", "maxCount": 10,
              "children": ["age"],
              "dataModelBindings": { "group": "People" } },
            { "id": "age", "type": "Input",
              "dataModelBindings": { "simpleBinding": "People.Age" } },
        ],
    })
}

#[test]
fn test_group_expands_one_row_per_array_entry() {
    let (tree, diagnostics) = generate_tree(
        &[("form", people_page())],
        json!({ "People": [{ "Age": 1 }, { "Age": 2 }, { "Age": 3 }] }),
    );

    let ids: Vec<&str> = tree.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["g", "age-0", "age-1", "age-2"]);

    let group = tree.get("g").unwrap();
    assert_eq!(group.rows.len(), 3);
    for (i, row) in group.rows.iter().enumerate() {
        assert_eq!(row.index, i);
        assert_eq!(row.members.len(), 1);
    }
    assert!(diagnostics.is_empty());
}

#[test]
fn test_row_contexts_are_distinct_and_uuids_stable() {
    let data = json!({ "People": [{ "Age": 1 }, { "Age": 2 }] });
    let (first, _) = generate_tree(&[("form", people_page())], data.clone());
    let (second, _) = generate_tree(&[("form", people_page())], data);

    let rows_a = &first.get("g").unwrap().rows;
    let rows_b = &second.get("g").unwrap().rows;
    assert_ne!(rows_a[0].uuid, rows_a[1].uuid);
    assert_eq!(rows_a[0].uuid, rows_b[0].uuid);
    assert_ne!(
        first.get("age-0").unwrap().row_context,
        first.get("age-1").unwrap().row_context
    );
}

#[test]
fn test_generation_is_idempotent() {
    let data = json!({ "People": [{ "Age": 1 }, { "Age": 2 }] });
    let (first, _) = generate_tree(&[("form", people_page())], data.clone());
    let (second, _) = generate_tree(&[("form", people_page())], data);
    assert_eq!(first, second);
}

#[test]
fn test_nested_groups_substitute_every_row_index() {
    let page = json!({
        "components": [
            { "id": "outer", "type": "Group", "maxCount": 10,
              "children": ["inner"],
              "dataModelBindings": { "group": "Group" } },
            { "id": "inner", "type": "Group", "maxCount": 10,
              "children": ["city"],
              "dataModelBindings": { "group": "Group.Nested" } },
            { "id": "city", "type": "Input",
              "dataModelBindings": { "simpleBinding": "Group.Nested.City" } },
        ],
    });
    let data = json!({
        "Group": [
            { "Nested": [{ "City": "Oslo" }] },
            { "Nested": [{ "City": "Bergen" }, { "City": "Tromso" }] },
        ],
    });
    let (tree, diagnostics) = generate_tree(&[("form", page)], data);
    assert!(diagnostics.is_empty());

    let city = tree.get("city-1-0").unwrap();
    assert_eq!(city.row_context.indices(), vec![1, 0]);
    assert_eq!(
        city.bindings.get("simpleBinding").map(|r| r.field.as_str()),
        Some("Group[1].Nested[0].City")
    );

    let deep = tree.get("city-1-1").unwrap();
    assert_eq!(
        deep.bindings.get("simpleBinding").map(|r| r.field.as_str()),
        Some("Group[1].Nested[1].City")
    );
    assert!(tree.get("city-0-1").is_none());
}

#[test]
fn test_escaping_binding_is_flagged_and_omitted() {
    let page = json!({
        "components": [
            { "id": "g", "type": "Group", "maxCount": 10,
              "children": ["name"],
              "dataModelBindings": { "group": "People" } },
            { "id": "name", "type": "Input",
              "dataModelBindings": { "simpleBinding": "Unrelated.Path" } },
        ],
    });
    let (tree, diagnostics) = generate_tree(
        &[("form", page)],
        json!({ "People": [{ "Age": 1 }], "Unrelated": { "Path": "x" } }),
    );

    let name = tree.get("name-0").unwrap();
    assert!(name.bindings.get("simpleBinding").is_none());
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::BindingEscapesGroup { .. })));
}

#[test]
fn test_dangling_child_is_flagged_and_skipped() {
    let page = json!({
        "components": [
            { "id": "g", "type": "Group", "maxCount": 1, "children": ["ghost", "name"] },
            { "id": "name", "type": "Input",
              "dataModelBindings": { "simpleBinding": "Name" } },
        ],
    });
    let (tree, diagnostics) = generate_tree(&[("form", page)], json!({ "Name": "Ada" }));

    assert!(tree.get("ghost").is_none());
    assert!(tree.get("name").is_some());
    assert!(diagnostics.iter().any(|d| {
        d.node_id.as_deref() == Some("g")
            && matches!(&d.kind, DiagnosticKind::DanglingChildReference { child } if child == "ghost")
    }));
}

#[test]
fn test_duplicate_definition_is_recorded_and_ignored() {
    let page = json!({
        "components": [
            { "id": "name", "type": "Input",
              "dataModelBindings": { "simpleBinding": "Name" } },
            { "id": "name", "type": "Header" },
        ],
    });
    let (tree, _) = generate_tree(&[("form", page)], json!({ "Name": "Ada" }));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get("name").unwrap().kind, ComponentKind::Input);
    assert_eq!(
        tree.duplicate_ids(),
        &[("form".to_string(), "name".to_string())]
    );
}

#[test]
fn test_grid_cells_keep_their_shape() {
    let page = json!({
        "components": [
            { "id": "grid", "type": "Grid",
              "rows": [
                  { "cells": [{ "text": "Label" }, { "component": "name" }, {}] },
                  { "cells": [{ "component": "ghost" }] },
              ] },
            { "id": "name", "type": "Input",
              "dataModelBindings": { "simpleBinding": "Name" } },
        ],
    });
    let (tree, diagnostics) = generate_tree(&[("form", page)], json!({ "Name": "Ada" }));

    let grid = tree.get("grid").unwrap();
    assert_eq!(grid.grid_rows.len(), 2);
    assert_eq!(grid.grid_rows[0].cells[0], GridNodeCell::Text("Label".to_string()));
    assert!(matches!(grid.grid_rows[0].cells[1], GridNodeCell::Component(_)));
    assert_eq!(grid.grid_rows[0].cells[2], GridNodeCell::Empty);
    // A cell naming an undeclared component falls back to empty.
    assert_eq!(grid.grid_rows[1].cells[0], GridNodeCell::Empty);
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d.kind, DiagnosticKind::DanglingChildReference { .. })));
}

#[test]
fn test_pages_follow_declared_order() {
    let page_a = json!({ "components": [
        { "id": "a", "type": "Header" },
    ]});
    let page_b = json!({ "components": [
        { "id": "b", "type": "Header" },
    ]});
    let (tree, _) = generate_tree(&[("second", page_b), ("first", page_a)], json!({}));
    assert_eq!(tree.page_order(), &["second".to_string(), "first".to_string()]);
    assert_eq!(tree.page_nodes("second").len(), 1);
}

#[test]
fn test_pages_missing_from_order_are_not_generated() {
    let (set, _) = layouts(&[
        ("shown", json!({ "components": [{ "id": "a", "type": "Header" }] })),
        ("ignored", json!({ "components": [{ "id": "b", "type": "Header" }] })),
    ]);
    let settings = LayoutSettings {
        page_order: vec!["shown".to_string()],
        ..Default::default()
    };
    let snapshot = DataModelSnapshot::new(btreemap! {
        "Model".to_string() => json!({}),
    });
    let mut diagnostics = DiagnosticSink::new();
    let tree = generate(&set, &settings, &snapshot, "Model", &mut diagnostics);
    assert!(tree.get("a").is_some());
    assert!(tree.get("b").is_none());
}

#[test]
fn test_closest_prefers_exact_then_shared_rows() {
    let (tree, _) = generate_tree(
        &[("form", people_page())],
        json!({ "People": [{ "Age": 1 }, { "Age": 2 }] }),
    );

    // Exact derived id always wins.
    let exact = tree.closest("age-1", &RowContext::root()).unwrap();
    assert_eq!(exact.id, "age-1");

    // From inside row 1, the base id resolves to that row's instance.
    let from = tree.get("age-1").unwrap().row_context.clone();
    let sibling = tree.closest("age", &from).unwrap();
    assert_eq!(sibling.id, "age-1");

    // From the root there is nothing to share; document order breaks the tie.
    let first = tree.closest("age", &RowContext::root()).unwrap();
    assert_eq!(first.id, "age-0");

    assert!(tree.closest("missing", &RowContext::root()).is_none());
}
