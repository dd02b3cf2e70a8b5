//! Ordering and alias guarantees every backend can rely on

use querydesigner::config::ConverterConfig;
use querydesigner::converter::{QueryConverter, RecordingBackend, StatementEvent};
use querydesigner::providers::ProviderCatalog;
use querydesigner::{ConvertError, QueryDefinition};
use serde_json::json;
use std::sync::Arc;

fn plain_converter() -> QueryConverter {
    QueryConverter::from_catalog(Arc::new(ProviderCatalog::new()))
}

#[test]
fn test_statement_order() {
    let definition = json!({
        "entity": "Order",
        "columns": [
            {"name": "status", "sorting": "ASC"},
            {"name": "customer+Customer::name"}
        ],
        "filters": [
            {"columnName": "id", "criterion": {"filter": "number", "data": {"value": 1}}},
            "AND",
            [{"columnName": "items+Item::sku", "criterion": {"filter": "string", "data": {"value": "x"}}}]
        ],
        "grouping_columns": [{"name": "status"}, {"name": "customer+Customer::name"}]
    });
    let mut backend = RecordingBackend::new();
    plain_converter()
        .convert_value(&definition, None, &mut backend)
        .unwrap();

    assert_eq!(
        backend.event_names(),
        vec![
            "select",
            "select",
            "from",
            "join",
            "join",
            "begin_group",
            "condition",
            "operator",
            "begin_group",
            "condition",
            "end_group",
            "end_group",
            "group_by",
            "group_by",
            "order_by",
            "table_aliases",
            "column_aliases",
        ]
    );

    // filter paths are registered before SELECT paths
    let joins: Vec<_> = backend
        .joins()
        .map(|join| (join.join.as_str(), join.alias.as_str()))
        .collect();
    assert_eq!(joins, vec![("t1.items", "t2"), ("t1.customer", "t3")]);
}

#[test]
fn test_aliases_are_shared_between_sections() {
    let definition = json!({
        "columns": [{"name": "Order::customer+Customer::name"}],
        "filters": [{"columnName": "customer+Customer::name", "criterion": {"filter": "string", "data": {"value": "a"}}}],
        "grouping_columns": [{"name": "Order::customer+Customer::name"}]
    });
    let mut backend = RecordingBackend::new();
    let summary = plain_converter()
        .convert_value(&definition, Some("Order"), &mut backend)
        .unwrap();

    assert_eq!(summary.table_aliases.len(), 2);
    assert_eq!(summary.column_aliases.len(), 1);
    let condition_alias = backend.events().iter().find_map(|event| match event {
        StatementEvent::Condition { table_alias, .. } => Some(table_alias.clone()),
        _ => None,
    });
    assert_eq!(condition_alias.as_deref(), Some("t2"));
}

#[test]
fn test_grouping_column_must_be_selected() {
    let definition = json!({
        "columns": [{"name": "id"}],
        "grouping_columns": [{"name": "status"}]
    });
    let mut backend = RecordingBackend::new();
    let err = plain_converter()
        .convert_value(&definition, Some("Order"), &mut backend)
        .unwrap_err();

    assert_eq!(err, ConvertError::UngroupedSelectColumn("status".to_string()));
    assert_eq!(
        err.to_string(),
        "The grouping column \"status\" must be declared in SELECT clause."
    );
}

#[test]
fn test_conversions_do_not_share_state() {
    let converter = plain_converter();
    let first = QueryDefinition::from_value(
        &json!({"columns": [{"name": "customer+Customer::name"}]}),
        Some("Order"),
    )
    .unwrap();
    let second = QueryDefinition::from_value(&json!({"columns": [{"name": "sku"}]}), Some("Item"))
        .unwrap();

    let a = converter.convert(&first, &mut RecordingBackend::new()).unwrap();
    let b = converter.convert(&second, &mut RecordingBackend::new()).unwrap();
    let again = converter.convert(&first, &mut RecordingBackend::new()).unwrap();

    assert_eq!(a, again);
    assert_eq!(b.table_aliases.get(""), Some("t1"));
    assert_eq!(b.column_aliases.len(), 1);
}

#[test]
fn test_configured_alias_prefixes() {
    let config = ConverterConfig {
        table_alias_prefix: "tbl".to_string(),
        column_alias_prefix: "col".to_string(),
        ..ConverterConfig::default()
    };
    let converter = plain_converter().with_config(config);

    let mut backend = RecordingBackend::new();
    let summary = converter
        .convert_value(
            &json!({"columns": [{"name": "id"}, {"name": "customer+Customer::name"}]}),
            Some("Order"),
            &mut backend,
        )
        .unwrap();

    assert_eq!(summary.table_aliases.values().collect::<Vec<_>>(), vec!["tbl1", "tbl2"]);
    assert_eq!(summary.column_aliases.values().collect::<Vec<_>>(), vec!["col1", "col2"]);
}

#[test]
fn test_definition_errors_surface() {
    let mut backend = RecordingBackend::new();
    let converter = plain_converter();

    assert!(converter
        .convert_value(&json!({"filters": []}), Some("Order"), &mut backend)
        .is_err());
    assert!(converter
        .convert_value(&json!({"columns": [{"name": "id"}]}), None, &mut backend)
        .is_err());
    assert!(backend.events().is_empty());
}
