//! Query Definition
//!
//! Typed, read-only view of a query designer definition:
//!
//! ```json
//! {
//!   "entity": "Order",
//!   "columns": [
//!     {"name": "Order::id", "label": "Id", "sorting": "DESC"},
//!     {"name": "Order::customer+Customer::name", "func": {"name": "Count", "group_name": "aggregates", "group_type": "number"}}
//!   ],
//!   "filters": [{"columnName": "Order::id", "criterion": {"filter": "number", "data": {"value": 5}}}],
//!   "grouping_columns": [{"name": "Order::id"}]
//! }
//! ```
//!
//! Only the envelope is checked here. Column paths are parsed into join
//! identifiers by the converter, filter ordering rules are enforced by the
//! filter-group parser.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod errors;
pub mod filter;

pub use errors::DefinitionError;
pub use filter::{Criterion, FilterCondition, FilterNode, LogicalOperator};

pub type DefinitionResult<T> = Result<T, DefinitionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sorting direction `{other}`")),
        }
    }
}

/// Function applied to a column: `name` within a function group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnFunction {
    pub name: String,
    pub group_name: String,
    pub group_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_sorting",
        skip_serializing_if = "Option::is_none"
    )]
    pub sorting: Option<SortDirection>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub distinct: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_function",
        skip_serializing_if = "Option::is_none"
    )]
    pub func: Option<ColumnFunction>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            sorting: None,
            distinct: false,
            func: None,
        }
    }

    pub fn alias_key(&self) -> String {
        column_alias_key(&self.name, self.func.as_ref())
    }
}

/// Grouping column reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_function",
        skip_serializing_if = "Option::is_none"
    )]
    pub func: Option<ColumnFunction>,
}

impl ColumnRef {
    pub fn alias_key(&self) -> String {
        column_alias_key(&self.name, self.func.as_ref())
    }
}

/// Key of the column alias table: `name` or `name(func,group_name,group_type)`
pub fn column_alias_key(name: &str, func: Option<&ColumnFunction>) -> String {
    match func {
        Some(f) => format!("{}({},{},{})", name, f.name, f.group_name, f.group_type),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDefinition {
    pub root_entity: String,
    pub columns: Vec<ColumnSpec>,
    /// Top-level filter group, `None` when the definition has no filters
    pub filters: Option<Vec<FilterNode>>,
    pub grouping_columns: Vec<ColumnRef>,
}

impl QueryDefinition {
    pub fn new(root_entity: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            root_entity: root_entity.into(),
            columns,
            filters: None,
            grouping_columns: Vec::new(),
        }
    }

    pub fn from_json(text: &str, root_entity: Option<&str>) -> DefinitionResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DefinitionError::InvalidJson(e.to_string()))?;
        Self::from_value(&value, root_entity)
    }

    /// Builds a definition from its JSON tree. An explicit `root_entity` wins
    /// over the `entity` key of the tree.
    pub fn from_value(value: &Value, root_entity: Option<&str>) -> DefinitionResult<Self> {
        let root_entity = root_entity
            .or_else(|| value.get("entity").and_then(Value::as_str))
            .map(str::trim)
            .filter(|entity| !entity.is_empty())
            .ok_or(DefinitionError::MissingRootEntity)?
            .to_string();

        let columns = match value.get("columns") {
            None | Some(Value::Null) => return Err(DefinitionError::MissingColumnsDefinition),
            Some(columns) => parse_columns(columns)?,
        };

        let filters = match value.get("filters") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(FilterNode::try_from)
                    .collect::<DefinitionResult<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(DefinitionError::invalid_section(
                    "filters",
                    "expected a list of filter tokens",
                ))
            }
        };

        let grouping_columns = match value.get("grouping_columns") {
            None | Some(Value::Null) => Vec::new(),
            Some(grouping) => serde_json::from_value(grouping.clone())
                .map_err(|e| DefinitionError::invalid_section("grouping_columns", e.to_string()))?,
        };

        Ok(Self {
            root_entity,
            columns,
            filters,
            grouping_columns,
        })
    }

    pub fn with_filters(mut self, filters: Vec<FilterNode>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_grouping_columns(mut self, grouping_columns: Vec<ColumnRef>) -> Self {
        self.grouping_columns = grouping_columns;
        self
    }

    /// Whether a WHERE clause has to be emitted
    pub fn has_filters(&self) -> bool {
        self.filters.as_ref().is_some_and(|f| !f.is_empty())
    }
}

fn parse_columns(value: &Value) -> DefinitionResult<Vec<ColumnSpec>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) if map.is_empty() => return Err(DefinitionError::EmptyColumnsDefinition),
        _ => {
            return Err(DefinitionError::invalid_section(
                "columns",
                "expected a list of columns",
            ))
        }
    };
    if items.is_empty() {
        return Err(DefinitionError::EmptyColumnsDefinition);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let column: ColumnSpec = serde_json::from_value(item.clone())
                .map_err(|e| DefinitionError::InvalidColumn {
                    index,
                    reason: e.to_string(),
                })?;
            if column.name.trim().is_empty() {
                return Err(DefinitionError::InvalidColumn {
                    index,
                    reason: "column name must not be empty".to_string(),
                });
            }
            Ok(column)
        })
        .collect()
}

/// `null`, `""`, `[]`, `{}`, `false`, `0` and `"0"` all count as "not set"
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

pub(crate) fn deserialize_function<'de, D>(deserializer: D) -> Result<Option<ColumnFunction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_blank(&value) {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn deserialize_sorting<'de, D>(deserializer: D) -> Result<Option<SortDirection>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => {
            s.parse().map(Some).map_err(serde::de::Error::custom)
        }
        value if is_blank(&value) || value.is_string() => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "sorting must be a string, got {other}"
        ))),
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| !is_blank(&value))
}
