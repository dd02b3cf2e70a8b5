//! Filter tree of a query definition.
//!
//! Shape checks happen here (what kind of token each JSON value is). Ordering
//! rules between tokens are enforced by the filter-group parser.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::errors::DefinitionError;
use super::ColumnFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(LogicalOperator::And),
            "OR" => Ok(LogicalOperator::Or),
            _ => Err(DefinitionError::InvalidFilterGrammar {
                reason: "unknown operator, expected AND or OR".to_string(),
                token: Value::String(s.to_string()).to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub filter: String,
    #[serde(default)]
    pub data: Value,
}

/// Leaf condition of the filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(rename = "columnName")]
    pub column_name: String,
    pub criterion: Criterion,
    #[serde(
        default,
        deserialize_with = "super::deserialize_function",
        skip_serializing_if = "Option::is_none"
    )]
    pub func: Option<ColumnFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterNode {
    Operator(LogicalOperator),
    Condition(FilterCondition),
    Group(Vec<FilterNode>),
}

impl FilterNode {
    /// JSON text of the token, used in grammar error messages
    pub fn token_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Column names referenced by this node and its descendants, in tree order
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_column_names(&mut names);
        names
    }

    fn collect_column_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            FilterNode::Operator(_) => {}
            FilterNode::Condition(condition) => names.push(&condition.column_name),
            FilterNode::Group(children) => {
                for child in children {
                    child.collect_column_names(names);
                }
            }
        }
    }
}

impl TryFrom<&Value> for FilterNode {
    type Error = DefinitionError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(op) => Ok(FilterNode::Operator(op.parse()?)),
            Value::Object(map) if map.contains_key("columnName") => {
                serde_json::from_value(value.clone())
                    .map(FilterNode::Condition)
                    .map_err(|e| DefinitionError::InvalidFilterGrammar {
                        reason: format!("invalid filter condition ({e})"),
                        token: value.to_string(),
                    })
            }
            Value::Array(items) => items
                .iter()
                .map(FilterNode::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(FilterNode::Group),
            _ => Err(DefinitionError::InvalidFilterGrammar {
                reason: "a token must be an operator, a filter or a group".to_string(),
                token: value.to_string(),
            }),
        }
    }
}
