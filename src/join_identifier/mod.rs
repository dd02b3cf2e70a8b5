//! Join Identifier Model
//!
//! A join identifier names one table join of the query by the path of relation
//! traversals that leads to it from the root entity. Identifiers are
//! structured values ([`JoinSegment`], [`JoinPath`]) and are interned in a
//! [`JoinGraph`] arena, so the rest of the engine compares integer handles and
//! never re-parses delimited text.
//!
//! The text form is kept as a display/debug format and as the input format of
//! column names in query definitions:
//!
//! ```text
//! Order::customer+Customer::addresses|left|WITH|t3.primary = true
//! └─ segment 1 ─┘ └──────────────── segment 2 ───────────────────┘
//! ```
//!
//! Segment targets:
//! - `Entity::field` - relation `field` declared on `Entity`
//! - `Owner::Target::field` - unidirectional relation, `Target.field` points to the parent
//! - `alias.field` - join through an already known table alias
//! - `Entity` - entity joined with an explicit condition
//!
//! The root identifier is the empty path (text `""`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod arena;
pub mod errors;

pub use arena::{JoinGraph, JoinHandle};
pub use errors::JoinIdentifierError;

/// Result type for join identifier operations
pub type JoinIdentifierResult<T> = Result<T, JoinIdentifierError>;

pub const SEGMENT_DELIMITER: char = '+';
pub const METADATA_DELIMITER: char = '|';
pub const FIELD_DELIMITER: &str = "::";
pub const ALIAS_FIELD_DELIMITER: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    #[serde(rename = "inner", alias = "INNER")]
    Inner,
    #[serde(rename = "left", alias = "LEFT")]
    Left,
}

impl JoinType {
    /// Lowercase form used inside identifiers and recipes
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
        }
    }

    /// Keyword form handed to backends
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for JoinType {
    type Err = JoinIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            _ => Err(JoinIdentifierError::InvalidJoinType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    #[serde(rename = "WITH", alias = "with")]
    With,
    #[serde(rename = "ON", alias = "on")]
    On,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::With => "WITH",
            ConditionType::On => "ON",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = JoinIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WITH" => Ok(ConditionType::With),
            "ON" => Ok(ConditionType::On),
            _ => Err(JoinIdentifierError::InvalidConditionType(s.to_string())),
        }
    }
}

/// What a single join segment joins
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinTarget {
    /// `Entity::field`
    Relation { entity: String, field: String },
    /// `Owner::Target::field`
    Unidirectional {
        owner: String,
        target: String,
        field: String,
    },
    /// `alias.field`
    AliasField { alias: String, field: String },
    /// `Entity`
    Entity { entity: String },
}

impl JoinTarget {
    /// The entity class addressed by this target, if the text names one
    pub fn entity_class(&self) -> Option<&str> {
        match self {
            JoinTarget::Relation { entity, .. } => Some(entity),
            JoinTarget::Unidirectional { target, .. } => Some(target),
            JoinTarget::AliasField { .. } => None,
            JoinTarget::Entity { entity } => Some(entity),
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            JoinTarget::Relation { field, .. }
            | JoinTarget::Unidirectional { field, .. }
            | JoinTarget::AliasField { field, .. } => Some(field),
            JoinTarget::Entity { .. } => None,
        }
    }
}

impl fmt::Display for JoinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinTarget::Relation { entity, field } => write!(f, "{entity}{FIELD_DELIMITER}{field}"),
            JoinTarget::Unidirectional {
                owner,
                target,
                field,
            } => write!(
                f,
                "{owner}{FIELD_DELIMITER}{target}{FIELD_DELIMITER}{field}"
            ),
            JoinTarget::AliasField { alias, field } => {
                write!(f, "{alias}{ALIAS_FIELD_DELIMITER}{field}")
            }
            JoinTarget::Entity { entity } => f.write_str(entity),
        }
    }
}

impl FromStr for JoinTarget {
    type Err = JoinIdentifierError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(JoinIdentifierError::invalid_segment(
                text,
                "empty join expression",
            ));
        }

        if text.contains(FIELD_DELIMITER) {
            let parts: Vec<&str> = text.split(FIELD_DELIMITER).map(str::trim).collect();
            if parts.iter().any(|part| part.is_empty()) {
                return Err(JoinIdentifierError::invalid_segment(
                    text,
                    "empty entity class or field name",
                ));
            }
            return match parts.as_slice() {
                [entity, field] => Ok(JoinTarget::Relation {
                    entity: entity.to_string(),
                    field: field.to_string(),
                }),
                [owner, target, field] => Ok(JoinTarget::Unidirectional {
                    owner: owner.to_string(),
                    target: target.to_string(),
                    field: field.to_string(),
                }),
                _ => Err(JoinIdentifierError::invalid_segment(
                    text,
                    "too many `::` separators",
                )),
            };
        }

        if let Some((alias, field)) = text.split_once(ALIAS_FIELD_DELIMITER) {
            let (alias, field) = (alias.trim(), field.trim());
            if alias.is_empty() || field.is_empty() {
                return Err(JoinIdentifierError::invalid_segment(
                    text,
                    "expected `alias.field`",
                ));
            }
            return Ok(JoinTarget::AliasField {
                alias: alias.to_string(),
                field: field.to_string(),
            });
        }

        Ok(JoinTarget::Entity {
            entity: text.to_string(),
        })
    }
}

/// One step of a join path plus its optional join metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinSegment {
    pub target: JoinTarget,
    pub join_type: Option<JoinType>,
    pub condition_type: Option<ConditionType>,
    pub condition: Option<String>,
}

impl JoinSegment {
    pub fn new(target: JoinTarget) -> Self {
        Self {
            target,
            join_type: None,
            condition_type: None,
            condition: None,
        }
    }

    pub fn relation(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(JoinTarget::Relation {
            entity: entity.into(),
            field: field.into(),
        })
    }

    pub fn alias_field(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(JoinTarget::AliasField {
            alias: alias.into(),
            field: field.into(),
        })
    }

    pub fn with_join_type(mut self, join_type: Option<JoinType>) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn with_condition(
        mut self,
        condition_type: Option<ConditionType>,
        condition: Option<String>,
    ) -> Self {
        self.condition_type = condition_type;
        self.condition = condition;
        self
    }

    pub fn entity_class(&self) -> Option<&str> {
        self.target.entity_class()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.target.field_name()
    }

    /// Join expression as written in the identifier (`Entity::field`, `t2.items`, `Entity`)
    pub fn join_expr(&self) -> String {
        self.target.to_string()
    }

    pub fn is_unidirectional(&self) -> bool {
        matches!(self.target, JoinTarget::Unidirectional { .. })
    }

    pub fn is_unidirectional_with_condition(&self) -> bool {
        matches!(self.target, JoinTarget::Entity { .. })
    }

    /// Segment joining `field` next to this one: same owner, no join metadata.
    pub fn sibling(&self, field: &str) -> JoinSegment {
        let target = match &self.target {
            JoinTarget::Relation { entity, .. } | JoinTarget::Entity { entity } => {
                JoinTarget::Relation {
                    entity: entity.clone(),
                    field: field.to_string(),
                }
            }
            JoinTarget::Unidirectional { owner, target, .. } => JoinTarget::Unidirectional {
                owner: owner.clone(),
                target: target.clone(),
                field: field.to_string(),
            },
            JoinTarget::AliasField { alias, .. } => JoinTarget::AliasField {
                alias: alias.clone(),
                field: field.to_string(),
            },
        };
        JoinSegment::new(target)
    }
}

impl fmt::Display for JoinSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        let has_condition = self.condition_type.is_some() || self.condition.is_some();
        if self.join_type.is_some() || has_condition {
            write!(
                f,
                "{METADATA_DELIMITER}{}",
                self.join_type.map(|t| t.as_str()).unwrap_or_default()
            )?;
        }
        if has_condition {
            write!(
                f,
                "{METADATA_DELIMITER}{}{METADATA_DELIMITER}{}",
                self.condition_type.map(|t| t.as_str()).unwrap_or_default(),
                self.condition.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

impl FromStr for JoinSegment {
    type Err = JoinIdentifierError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parts = text.splitn(4, METADATA_DELIMITER);
        let target: JoinTarget = parts.next().unwrap_or_default().parse()?;

        let join_type = match parts.next().map(str::trim) {
            Some(t) if !t.is_empty() => Some(t.parse()?),
            _ => None,
        };
        let condition_type = match parts.next().map(str::trim) {
            Some(t) if !t.is_empty() => Some(t.parse()?),
            _ => None,
        };
        let condition = parts
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(JoinSegment {
            target,
            join_type,
            condition_type,
            condition,
        })
    }
}

/// A root-to-node path of join segments. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JoinPath {
    segments: Vec<JoinSegment>,
}

impl JoinPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<JoinSegment>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[JoinSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&JoinSegment> {
        self.segments.last()
    }

    /// Strips the last segment.
    ///
    /// Fails with `MalformedIdentifier` for the root, which has no parent.
    pub fn parent(&self) -> JoinIdentifierResult<JoinPath> {
        match self.segments.split_last() {
            Some((_, rest)) => Ok(JoinPath {
                segments: rest.to_vec(),
            }),
            None => Err(JoinIdentifierError::MalformedIdentifier(self.to_string())),
        }
    }

    pub fn child(&self, segment: JoinSegment) -> JoinPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        JoinPath { segments }
    }

    /// Builds the identifier of `join_expr` joined below `parent`.
    pub fn build(
        join_expr: &str,
        parent: &JoinPath,
        join_type: Option<JoinType>,
        condition_type: Option<ConditionType>,
        condition: Option<&str>,
    ) -> JoinIdentifierResult<JoinPath> {
        let segment = JoinSegment::new(join_expr.parse()?)
            .with_join_type(join_type)
            .with_condition(condition_type, condition.map(str::to_string));
        Ok(parent.child(segment))
    }

    /// All non-root identifiers on this path, root-first, ending with the path itself
    pub fn explode(&self) -> Vec<JoinPath> {
        (1..=self.segments.len())
            .map(|len| JoinPath {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    pub fn entity_class(&self) -> Option<&str> {
        self.last().and_then(JoinSegment::entity_class)
    }

    pub fn field_name(&self) -> Option<&str> {
        self.last().and_then(JoinSegment::field_name)
    }

    pub fn join_expr(&self) -> Option<String> {
        self.last().map(JoinSegment::join_expr)
    }

    pub fn join_type(&self) -> Option<JoinType> {
        self.last().and_then(|s| s.join_type)
    }

    pub fn condition_type(&self) -> Option<ConditionType> {
        self.last().and_then(|s| s.condition_type)
    }

    pub fn condition(&self) -> Option<&str> {
        self.last().and_then(|s| s.condition.as_deref())
    }

    pub fn is_unidirectional(&self) -> bool {
        self.last().is_some_and(JoinSegment::is_unidirectional)
    }

    pub fn is_unidirectional_with_condition(&self) -> bool {
        self.last()
            .is_some_and(JoinSegment::is_unidirectional_with_condition)
    }

    /// Parses a column name of a query definition into the identifier of the column.
    ///
    /// Column names may be absolute (`Order::customer+Customer::name`) or relative
    /// to the root entity (`customer+Customer::name`).
    pub fn parse_column(root_entity: &str, column_name: &str) -> JoinIdentifierResult<JoinPath> {
        let column_name = column_name.trim();
        if column_name.is_empty() {
            return Err(JoinIdentifierError::invalid_segment(
                column_name,
                "empty column name",
            ));
        }

        let first_segment = column_name
            .split(SEGMENT_DELIMITER)
            .next()
            .and_then(|s| s.split(METADATA_DELIMITER).next())
            .unwrap_or_default();

        if first_segment.contains(FIELD_DELIMITER) {
            column_name.parse()
        } else {
            format!("{root_entity}{FIELD_DELIMITER}{column_name}").parse()
        }
    }
}

impl fmt::Display for JoinPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEGMENT_DELIMITER}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for JoinPath {
    type Err = JoinIdentifierError;

    /// Conditions inside the text must not contain the segment delimiter.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.trim().is_empty() {
            return Ok(JoinPath::root());
        }
        let segments = text
            .split(SEGMENT_DELIMITER)
            .map(str::parse)
            .collect::<JoinIdentifierResult<Vec<JoinSegment>>>()?;
        Ok(JoinPath { segments })
    }
}

/// The join identifiers a column depends on, root-first, excluding the root.
///
/// For `Order::customer+Customer::address+Address::city` this yields
/// `Order::customer` and `Order::customer+Customer::address`.
pub fn explode_column_name(
    root_entity: &str,
    column_name: &str,
) -> JoinIdentifierResult<Vec<JoinPath>> {
    let column = JoinPath::parse_column(root_entity, column_name)?;
    Ok(column.parent()?.explode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relation_path() {
        let path: JoinPath = "Order::customer+Customer::name".parse().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.entity_class(), Some("Customer"));
        assert_eq!(path.field_name(), Some("name"));
        assert_eq!(path.to_string(), "Order::customer+Customer::name");
    }

    #[test]
    fn test_parent_of_root_is_malformed() {
        let root = JoinPath::root();
        assert_eq!(
            root.parent(),
            Err(JoinIdentifierError::MalformedIdentifier(String::new()))
        );
    }

    #[test]
    fn test_parent_strips_last_segment() {
        let path: JoinPath = "Order::customer+Customer::address".parse().unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "Order::customer");
        assert!(path.parent().unwrap().parent().unwrap().is_root());
    }

    #[test]
    fn test_build_round_trips_metadata() {
        let parent: JoinPath = "Order::customer".parse().unwrap();
        let id = JoinPath::build(
            "Acme\\Entity\\Address",
            &parent,
            Some(JoinType::Left),
            Some(ConditionType::With),
            Some("t3.owner = t2 AND t3.primary = true"),
        )
        .unwrap();

        assert!(id.is_unidirectional_with_condition());
        assert_eq!(id.entity_class(), Some("Acme\\Entity\\Address"));
        assert_eq!(id.join_type(), Some(JoinType::Left));
        assert_eq!(id.condition_type(), Some(ConditionType::With));
        assert_eq!(id.condition(), Some("t3.owner = t2 AND t3.primary = true"));

        let reparsed: JoinPath = id.to_string().parse().unwrap();
        assert_eq!(reparsed, id);
    }

    #[test]
    fn test_unidirectional_segment() {
        let path: JoinPath = "Account::Call::account".parse().unwrap();
        assert!(path.is_unidirectional());
        assert_eq!(path.entity_class(), Some("Call"));
        assert_eq!(path.field_name(), Some("account"));
    }

    #[test]
    fn test_alias_field_segment_has_no_entity() {
        let segment: JoinSegment = "t2.items|inner".parse().unwrap();
        assert_eq!(segment.entity_class(), None);
        assert_eq!(segment.field_name(), Some("items"));
        assert_eq!(segment.join_type, Some(JoinType::Inner));
        assert_eq!(segment.to_string(), "t2.items|inner");
    }

    #[test]
    fn test_explode_is_root_first() {
        let path: JoinPath = "A::b+B::c+C::d".parse().unwrap();
        let exploded: Vec<String> = path.explode().iter().map(|p| p.to_string()).collect();
        assert_eq!(exploded, vec!["A::b", "A::b+B::c", "A::b+B::c+C::d"]);
    }

    #[test]
    fn test_explode_column_name() {
        let ids = explode_column_name("Order", "Order::customer+Customer::address+Address::city")
            .unwrap();
        let ids: Vec<String> = ids.iter().map(|p| p.to_string()).collect();
        assert_eq!(ids, vec!["Order::customer", "Order::customer+Customer::address"]);

        assert!(explode_column_name("Order", "Order::id").unwrap().is_empty());
    }

    #[test]
    fn test_relative_column_name_gets_root_prefix() {
        let path = JoinPath::parse_column("Order", "customer+Customer::name").unwrap();
        assert_eq!(path.to_string(), "Order::customer+Customer::name");
    }

    #[test]
    fn test_sibling_keeps_owner() {
        let segment = JoinSegment::relation("Product", "category");
        assert_eq!(segment.sibling("status"), JoinSegment::relation("Product", "status"));
    }

    #[test]
    fn test_invalid_segments() {
        assert!("".parse::<JoinTarget>().is_err());
        assert!("A::".parse::<JoinTarget>().is_err());
        assert!("A::B::C::D".parse::<JoinTarget>().is_err());
        assert!("t1.".parse::<JoinTarget>().is_err());
        assert!("A::b|sideways".parse::<JoinSegment>().is_err());
    }
}
