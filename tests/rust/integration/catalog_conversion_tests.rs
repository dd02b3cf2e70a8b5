//! Conversions driven by a YAML provider catalog loaded from disk

use querydesigner::converter::{QueryConverter, RecordingBackend, StatementEvent};
use querydesigner::join_identifier::{ConditionType, JoinType};
use querydesigner::providers::{builtin_functions, CatalogError, ProviderCatalog};
use querydesigner::ConvertError;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

const CATALOG: &str = r#"
virtual_fields:
  Order:
    total:
      select: { expr: "entity.price * entity.qty", return_type: money }
    customerCity:
      select: { expr: "COALESCE(a.city, c.city)" }
      join:
        inner:
          - { join: entity.customer, alias: c }
        left:
          - { join: Address, alias: a, conditionType: WITH, condition: "a.owner = c" }
    broken:
      select: { expr: "x.id" }
      join:
        left:
          - { join: Address, alias: x, conditionType: WITH, condition: "x.id = y.id" }
          - { join: Brand, alias: y, conditionType: WITH, condition: "y.id = x.id" }
virtual_relations:
  Order:
    primaryAddress:
      join:
        left:
          - { join: Address, alias: a, conditionType: WITH, condition: "a.owner = entity AND a.primary = true" }
functions:
  - group_name: aggregates
    group_type: number
    functions:
      - { name: Count, expr: "COUNT($column)", return_type: integer }
      - { name: CountDistinct, expr: "@count_distinct", return_type: integer }
  - group_name: enum
    group_type: enum
    functions:
      - { name: Name, expr: "@enum_name" }
"#;

fn load_converter() -> QueryConverter {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();
    let catalog = ProviderCatalog::load(file.path()).unwrap();
    QueryConverter::from_catalog(Arc::new(catalog))
}

fn convert(definition: Value) -> (Result<querydesigner::ConversionSummary, ConvertError>, RecordingBackend) {
    let mut backend = RecordingBackend::new();
    let result = load_converter().convert_value(&definition, Some("Order"), &mut backend);
    (result, backend)
}

fn selects(backend: &RecordingBackend) -> Vec<(String, Option<String>)> {
    backend
        .events()
        .iter()
        .filter_map(|event| match event {
            StatementEvent::Select {
                expression,
                function,
                ..
            } => Some((expression.clone(), function.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_virtual_field_from_catalog() {
    let (result, backend) = convert(json!({
        "columns": [{"name": "total", "sorting": "desc"}],
        "filters": [{"columnName": "total", "criterion": {"filter": "number", "data": {"type": ">", "value": 10}}}]
    }));
    let summary = result.unwrap();

    assert_eq!(selects(&backend), vec![("t1.price * t1.qty".to_string(), None)]);
    assert_eq!(backend.joins().count(), 0);
    assert_eq!(
        summary.virtual_column_expressions.get("Order::total").map(String::as_str),
        Some("t1.price * t1.qty")
    );
}

#[test]
fn test_virtual_field_with_recipe_joins() {
    let (result, backend) = convert(json!({"columns": [{"name": "customerCity"}]}));
    result.unwrap();

    let joins: Vec<_> = backend.joins().collect();
    assert_eq!(joins.len(), 2);
    assert_eq!(
        (joins[0].join.as_str(), joins[0].alias.as_str(), joins[0].join_type),
        ("t1.customer", "t2", Some(JoinType::Inner))
    );
    assert_eq!(
        (joins[1].join.as_str(), joins[1].alias.as_str(), joins[1].join_type),
        ("Address", "t3", Some(JoinType::Left))
    );
    assert_eq!(joins[1].condition.as_deref(), Some("t3.owner = t2"));
    assert_eq!(selects(&backend)[0].0, "COALESCE(t3.city, t2.city)");
}

#[test]
fn test_virtual_relation_from_catalog() {
    let (result, backend) = convert(json!({
        "columns": [
            {"name": "primaryAddress+Address::street"},
            {"name": "Order::primaryAddress+Address::city"}
        ]
    }));
    let summary = result.unwrap();

    let joins: Vec<_> = backend.joins().collect();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].join, "Address");
    assert_eq!(joins[0].condition_type, Some(ConditionType::With));
    assert_eq!(
        joins[0].condition.as_deref(),
        Some("t2.owner = t1 AND t2.primary = true")
    );
    assert_eq!(
        selects(&backend)
            .into_iter()
            .map(|(expression, _)| expression)
            .collect::<Vec<_>>(),
        vec!["t2.street", "t2.city"]
    );
    assert!(summary
        .table_aliases
        .contains_key("Address|left|WITH|t2.owner = t1 AND t2.primary = true"));
}

#[test]
fn test_catalog_functions() {
    let (result, backend) = convert(json!({
        "columns": [
            {"name": "id", "func": {"name": "CountDistinct", "group_name": "aggregates", "group_type": "number"}},
            {"name": "status", "func": {"name": "Name", "group_name": "enum", "group_type": "enum"}}
        ]
    }));
    let summary = result.unwrap();

    let selected = selects(&backend);
    assert_eq!(selected[0].1.as_deref(), Some("COUNT(DISTINCT t1.id)"));
    assert_eq!(selected[1].1.as_deref(), Some("t2.name"));
    assert_eq!(summary.column_aliases.len(), 2);

    match &backend.events()[0] {
        StatementEvent::Select {
            function_return_type,
            ..
        } => assert_eq!(function_return_type.as_deref(), Some("integer")),
        other => panic!("expected SELECT, got {other:?}"),
    }
}

#[test]
fn test_filter_function_join_is_emitted() {
    let (result, backend) = convert(json!({
        "columns": [{"name": "id"}],
        "filters": [{
            "columnName": "status",
            "criterion": {"filter": "string", "data": {"value": "Open"}},
            "func": {"name": "Name", "group_name": "enum", "group_type": "enum"}
        }]
    }));
    let summary = result.unwrap();

    let joins: Vec<_> = backend.joins().collect();
    assert_eq!(joins.len(), 1);
    assert_eq!(
        (joins[0].join.as_str(), joins[0].alias.as_str(), joins[0].join_type),
        ("t1.status", "t2", Some(JoinType::Left))
    );
    assert_eq!(
        backend.event_names(),
        vec![
            "select",
            "from",
            "join",
            "begin_group",
            "condition",
            "end_group",
            "table_aliases",
            "column_aliases"
        ]
    );
    let functions: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|event| match event {
            StatementEvent::Condition { function, .. } => Some(function.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(functions, vec![Some("t2.name".to_string())]);
    assert_eq!(summary.table_aliases.get("t1.status|left"), Some("t2"));
}

#[test]
fn test_unorderable_recipe_fails() {
    let (result, _) = convert(json!({"columns": [{"name": "broken"}]}));
    assert!(matches!(
        result,
        Err(ConvertError::JoinOrderingFailure { .. })
    ));
}

#[test]
fn test_invalid_catalogs_are_rejected() {
    let relation_without_joins = r#"
virtual_relations:
  Order:
    ghost: { target_join_alias: g }
"#;
    assert!(ProviderCatalog::from_yaml_str(relation_without_joins, builtin_functions()).is_err());

    let unknown_expression = r#"
functions:
  - group_name: misc
    group_type: string
    functions:
      - { name: Magic, expr: "@magic" }
"#;
    assert!(ProviderCatalog::from_yaml_str(unknown_expression, builtin_functions()).is_err());

    let missing = ProviderCatalog::load("/nonexistent/catalog.yaml").unwrap_err();
    assert!(matches!(missing, CatalogError::Io { .. }));
}
