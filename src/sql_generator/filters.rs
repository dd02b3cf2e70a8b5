//! Rendering of filter criteria into SQL conditions.
//!
//! A criterion is a filter name (`string`, `number`, ...) plus free-form data:
//!
//! ```json
//! {"type": "contains", "value": "Bob"}
//! {"type": "between", "value": 10, "value_end": 20}
//! ```
//!
//! Values never end up in the SQL text; they are bound as named parameters.
//!
//! Value coercion (splitting `in` lists, reading boolean flags, comparison
//! names) is a choice of this backend. The converter hands filter data over
//! untouched, and other backends interpret it their own way.

use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::SqlGeneratorError;

/// Named query parameters in binding order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters {
    values: Map<String, Value>,
}

impl Parameters {
    /// Binds `value` and returns its placeholder (`:p1`, `:p2`, ...)
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.values.len() + 1);
        self.values.insert(name.clone(), value);
        format!(":{name}")
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name.trim_start_matches(':'))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn comparison_kind(data: &Value) -> Option<String> {
    match data.get("type") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_ascii_lowercase()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn value_of<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key).filter(|value| !value.is_null())
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// List values may be given as an array or a comma separated string
fn list_of(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        other => Value::Array(vec![other.clone()]),
    }
}

struct Criterion<'a> {
    filter: &'a str,
    kind: String,
    data: &'a Value,
}

impl Criterion<'_> {
    fn value(&self, key: &str) -> Result<&Value, SqlGeneratorError> {
        value_of(self.data, key).ok_or_else(|| SqlGeneratorError::MissingFilterValue {
            filter: self.filter.to_string(),
            kind: self.kind.clone(),
        })
    }

    fn unsupported(&self) -> SqlGeneratorError {
        SqlGeneratorError::UnsupportedComparison {
            filter: self.filter.to_string(),
            kind: self.kind.clone(),
        }
    }
}

/// SQL condition testing `column` against the criterion `filter`/`data`
pub fn render_condition(
    column: &str,
    filter: &str,
    data: &Value,
    params: &mut Parameters,
) -> Result<String, SqlGeneratorError> {
    match filter {
        "string" => render_string(
            column,
            &Criterion {
                filter,
                kind: comparison_kind(data).unwrap_or_else(|| "contains".to_string()),
                data,
            },
            params,
        ),
        "number" | "integer" | "decimal" | "percent" | "currency" | "date" | "datetime" => {
            render_comparison(
                column,
                &Criterion {
                    filter,
                    kind: comparison_kind(data).unwrap_or_else(|| "=".to_string()),
                    data,
                },
                params,
            )
        }
        "boolean" => {
            let criterion = Criterion {
                filter,
                kind: "=".to_string(),
                data,
            };
            let flag = match criterion.value("value")? {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_i64() == Some(1),
                Value::String(s) => matches!(s.as_str(), "1" | "true" | "yes"),
                _ => return Err(criterion.unsupported()),
            };
            Ok(format!("{column} = {}", params.bind(Value::Bool(flag))))
        }
        other => Err(SqlGeneratorError::UnsupportedFilter(other.to_string())),
    }
}

fn render_string(
    column: &str,
    criterion: &Criterion<'_>,
    params: &mut Parameters,
) -> Result<String, SqlGeneratorError> {
    let like = |pattern: String, negate: bool, params: &mut Parameters| {
        let keyword = if negate { "NOT LIKE" } else { "LIKE" };
        format!("{column} {keyword} {}", params.bind(Value::String(pattern)))
    };

    let sql = match criterion.kind.as_str() {
        "empty" => format!("({column} IS NULL OR {column} = '')"),
        "not_empty" => format!("({column} IS NOT NULL AND {column} <> '')"),
        "contains" => like(format!("%{}%", text_of(criterion.value("value")?)), false, params),
        "not_contains" => like(format!("%{}%", text_of(criterion.value("value")?)), true, params),
        "starts_with" => like(format!("{}%", text_of(criterion.value("value")?)), false, params),
        "ends_with" => like(format!("%{}", text_of(criterion.value("value")?)), false, params),
        "equal" | "=" => format!("{column} = {}", params.bind(criterion.value("value")?.clone())),
        "not_equal" | "!=" | "<>" => {
            format!("{column} <> {}", params.bind(criterion.value("value")?.clone()))
        }
        "in" => format!("{column} IN ({})", params.bind(list_of(criterion.value("value")?))),
        "not_in" => format!("{column} NOT IN ({})", params.bind(list_of(criterion.value("value")?))),
        _ => return Err(criterion.unsupported()),
    };
    Ok(sql)
}

fn render_comparison(
    column: &str,
    criterion: &Criterion<'_>,
    params: &mut Parameters,
) -> Result<String, SqlGeneratorError> {
    let operator = match criterion.kind.as_str() {
        "=" | "equal" => "=",
        "!=" | "<>" | "not_equal" => "<>",
        ">" | "greater_than" => ">",
        ">=" | "greater_equal" => ">=",
        "<" | "less_than" => "<",
        "<=" | "less_equal" => "<=",
        "between" | "not_between" => {
            let start = params.bind(criterion.value("value")?.clone());
            let end = params.bind(criterion.value("value_end")?.clone());
            let keyword = if criterion.kind == "between" {
                "BETWEEN"
            } else {
                "NOT BETWEEN"
            };
            return Ok(format!("{column} {keyword} {start} AND {end}"));
        }
        "in" => {
            return Ok(format!(
                "{column} IN ({})",
                params.bind(list_of(criterion.value("value")?))
            ))
        }
        "not_in" => {
            return Ok(format!(
                "{column} NOT IN ({})",
                params.bind(list_of(criterion.value("value")?))
            ))
        }
        "empty" => return Ok(format!("{column} IS NULL")),
        "not_empty" => return Ok(format!("{column} IS NOT NULL")),
        _ => return Err(criterion.unsupported()),
    };
    Ok(format!(
        "{column} {operator} {}",
        params.bind(criterion.value("value")?.clone())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("string", json!({"type": "contains", "value": "Bob"}), "t2.name LIKE :p1", json!("%Bob%"); "contains")]
    #[test_case("string", json!({"value": "Bob"}), "t2.name LIKE :p1", json!("%Bob%"); "contains by default")]
    #[test_case("string", json!({"type": "starts_with", "value": "B"}), "t2.name LIKE :p1", json!("B%"); "starts with")]
    #[test_case("string", json!({"type": "not_contains", "value": "x"}), "t2.name NOT LIKE :p1", json!("%x%"); "not contains")]
    #[test_case("string", json!({"type": "in", "value": "a, b"}), "t2.name IN (:p1)", json!(["a", "b"]); "in from text")]
    #[test_case("number", json!({"type": ">=", "value": 5}), "t2.name >= :p1", json!(5); "greater equal")]
    #[test_case("number", json!({"value": 5}), "t2.name = :p1", json!(5); "equal by default")]
    #[test_case("boolean", json!({"value": "1"}), "t2.name = :p1", json!(true); "boolean flag")]
    fn test_render_condition(filter: &str, data: Value, expected: &str, bound: Value) {
        let mut params = Parameters::default();
        let sql = render_condition("t2.name", filter, &data, &mut params).unwrap();
        assert_eq!(sql, expected);
        assert_eq!(params.get(":p1"), Some(&bound));
    }

    #[test]
    fn test_between() {
        let mut params = Parameters::default();
        let sql = render_condition(
            "t1.created",
            "datetime",
            &json!({"type": "between", "value": "2024-01-01", "value_end": "2024-02-01"}),
            &mut params,
        )
        .unwrap();
        assert_eq!(sql, "t1.created BETWEEN :p1 AND :p2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_checks_bind_nothing() {
        let mut params = Parameters::default();
        let sql = render_condition("t1.note", "string", &json!({"type": "empty"}), &mut params)
            .unwrap();
        assert_eq!(sql, "(t1.note IS NULL OR t1.note = '')");
        assert!(params.is_empty());
    }

    #[test_case("geo", json!({"value": 1}); "unknown filter")]
    #[test_case("number", json!({"type": "like", "value": 1}); "unknown comparison")]
    #[test_case("number", json!({"type": ">"}); "missing value")]
    fn test_render_condition_rejects(filter: &str, data: Value) {
        let mut params = Parameters::default();
        assert!(render_condition("t1.id", filter, &data, &mut params).is_err());
    }
}
