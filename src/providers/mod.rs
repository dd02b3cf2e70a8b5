//! Provider interfaces
//!
//! The converter asks three collaborators about the entity model:
//!
//! - [`VirtualFieldProvider`]: fields backed by an expression (and possibly extra joins)
//! - [`VirtualRelationProvider`]: relations backed by a join recipe
//! - [`FunctionProvider`]: functions that can wrap a column
//!
//! Recipes use local aliases (`entity` for the owning table by default) which
//! the converter rewrites to real table aliases.
//!
//! [`catalog::ProviderCatalog`] implements all three from a YAML catalog.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::join_identifier::{ConditionType, JoinType};

pub mod catalog;
pub mod errors;
pub mod function;

pub use catalog::{CatalogConfig, ProviderCatalog};
pub use errors::{CatalogError, ProviderError};
pub use function::{
    builtin_functions, FunctionArgs, FunctionDefinition, FunctionExpr, FunctionExpression,
    FunctionRegistry,
};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One join of a recipe, written with local aliases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VirtualJoin {
    /// `alias.field` or an entity class
    #[validate(length(min = 1, message = "join must not be empty"))]
    pub join: String,

    #[validate(length(min = 1, message = "join alias must not be empty"))]
    pub alias: String,

    #[serde(
        rename = "conditionType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub condition_type: Option<ConditionType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl VirtualJoin {
    pub fn new(join: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            join: join.into(),
            alias: alias.into(),
            condition_type: None,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition_type: ConditionType, condition: impl Into<String>) -> Self {
        self.condition_type = Some(condition_type);
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VirtualJoins {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub inner: Vec<VirtualJoin>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub left: Vec<VirtualJoin>,
}

impl VirtualJoins {
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty() && self.left.is_empty()
    }

    /// All entries, INNER first then LEFT, each in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (JoinType, &VirtualJoin)> {
        self.inner
            .iter()
            .map(|join| (JoinType::Inner, join))
            .chain(self.left.iter().map(|join| (JoinType::Left, join)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSelect {
    #[serde(default)]
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Recipe of a virtual field or a virtual relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct VirtualQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_alias: Option<String>,

    #[serde(default)]
    pub select: VirtualSelect,

    #[serde(default, skip_serializing_if = "VirtualJoins::is_empty")]
    #[validate(nested)]
    pub join: VirtualJoins,

    /// Relations only: local alias the relation's target fields live on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_join_alias: Option<String>,
}

impl VirtualQuery {
    pub fn with_expr(expr: impl Into<String>) -> Self {
        Self {
            select: VirtualSelect {
                expr: expr.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn root_alias_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.root_alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(default)
    }

    /// Local alias target fields of a relation are read from: the declared
    /// `target_join_alias`, else the alias of the last declared join.
    pub fn default_target_alias(&self) -> Option<&str> {
        self.target_join_alias.as_deref().or_else(|| {
            self.join
                .left
                .last()
                .or_else(|| self.join.inner.last())
                .map(|join| join.alias.as_str())
        })
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait VirtualFieldProvider: Send + Sync {
    fn is_virtual_field(&self, entity_class: &str, field_name: &str) -> bool;

    fn virtual_field_query(
        &self,
        entity_class: &str,
        field_name: &str,
    ) -> ProviderResult<VirtualQuery>;
}

#[cfg_attr(test, mockall::automock)]
pub trait VirtualRelationProvider: Send + Sync {
    fn is_virtual_relation(&self, entity_class: &str, field_name: &str) -> bool;

    fn virtual_relation_query(
        &self,
        entity_class: &str,
        field_name: &str,
    ) -> ProviderResult<VirtualQuery>;

    /// Local alias of the recipe that holds `target_field`
    fn target_join_alias(
        &self,
        entity_class: &str,
        field_name: &str,
        target_field: &str,
    ) -> ProviderResult<String>;
}

#[cfg_attr(test, mockall::automock)]
pub trait FunctionProvider: Send + Sync {
    fn function(
        &self,
        name: &str,
        group_name: &str,
        group_type: &str,
    ) -> ProviderResult<FunctionDefinition>;
}
