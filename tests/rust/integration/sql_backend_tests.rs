use querydesigner::converter::QueryConverter;
use querydesigner::providers::{builtin_functions, ProviderCatalog};
use querydesigner::sql_generator::{SqlQueryBackend, ToSql};
use serde_json::json;
use std::sync::Arc;

const CATALOG: &str = r#"
virtual_fields:
  Order:
    total:
      select: { expr: "entity.price * entity.qty" }
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
      - { name: Sum, expr: "SUM($column)" }
"#;

fn converter() -> QueryConverter {
    let catalog = ProviderCatalog::from_yaml_str(CATALOG, builtin_functions()).unwrap();
    QueryConverter::from_catalog(Arc::new(catalog))
}

#[test]
fn test_report_query() {
    let definition = json!({
        "columns": [
            {"name": "primaryAddress+Address::city", "label": "City", "sorting": "ASC"},
            {"name": "total", "func": {"name": "Sum", "group_name": "aggregates", "group_type": "number"}}
        ],
        "filters": [
            {"columnName": "status", "criterion": {"filter": "string", "data": {"type": "in", "value": ["open", "paid"]}}},
            "AND",
            [
                {"columnName": "created", "criterion": {"filter": "date", "data": {"type": "between", "value": "2024-01-01", "value_end": "2024-12-31"}}},
                "OR",
                {"columnName": "customer+Customer::vip", "criterion": {"filter": "boolean", "data": {"value": true}}}
            ]
        ],
        "grouping_columns": [{"name": "primaryAddress+Address::city"}]
    });

    let mut backend = SqlQueryBackend::new();
    converter()
        .convert_value(&definition, Some("Order"), &mut backend)
        .unwrap();

    assert_eq!(
        backend.sql().unwrap(),
        "SELECT t3.city AS c1, SUM(t1.price * t1.qty) AS c2\n\
         FROM Order t1\n\
         LEFT JOIN t1.customer t2\n\
         LEFT JOIN Address t3 WITH t3.owner = t1 AND t3.primary = true\n\
         WHERE t1.status IN (:p1) AND (t1.created BETWEEN :p2 AND :p3 OR t2.vip = :p4)\n\
         GROUP BY c1\n\
         ORDER BY c1 ASC\n"
    );

    let query = backend.into_query();
    assert_eq!(query.parameters.len(), 4);
    assert_eq!(query.parameters.get("p1"), Some(&json!(["open", "paid"])));
    assert_eq!(query.parameters.get(":p4"), Some(&json!(true)));
    assert_eq!(query.column_aliases.get("primaryAddress+Address::city"), Some("c1"));
    assert_eq!(query.to_sql(), query.clone().to_sql());
}

#[test]
fn test_parameters_serialize_as_object() {
    let mut backend = SqlQueryBackend::new();
    converter()
        .convert_value(
            &json!({
                "columns": [{"name": "id"}],
                "filters": [{"columnName": "id", "criterion": {"filter": "number", "data": {"type": "<", "value": 3}}}]
            }),
            Some("Order"),
            &mut backend,
        )
        .unwrap();

    assert_eq!(
        serde_json::to_value(&backend.query().parameters).unwrap(),
        json!({"p1": 3})
    );
}
