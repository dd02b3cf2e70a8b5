//! YAML provider catalog
//!
//! Declares virtual fields, virtual relations and function groups in one file:
//!
//! ```yaml
//! virtual_fields:
//!   Order:
//!     total:
//!       select: { expr: "entity.price * entity.qty", return_type: money }
//! virtual_relations:
//!   Order:
//!     primaryAddress:
//!       join:
//!         left:
//!           - { join: Address, alias: a, conditionType: WITH, condition: "a.owner = entity AND a.primary = true" }
//!       target_join_alias: a
//! functions:
//!   - group_name: aggregates
//!     group_type: number
//!     functions:
//!       - { name: Count, expr: "COUNT($column)", return_type: integer }
//!       - { name: CountDistinct, expr: "@count_distinct", return_type: integer }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use validator::Validate;

use super::errors::{CatalogError, ProviderError};
use super::function::{builtin_functions, FunctionDefinition, FunctionRegistry};
use super::{
    FunctionProvider, ProviderResult, VirtualFieldProvider, VirtualQuery, VirtualRelationProvider,
};
use crate::config::DEFAULT_ROOT_ALIAS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FunctionConfig {
    #[validate(length(min = 1, message = "function name must not be empty"))]
    pub name: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FunctionGroupConfig {
    #[validate(length(min = 1, message = "function group name must not be empty"))]
    pub group_name: String,
    #[validate(length(min = 1, message = "function group type must not be empty"))]
    pub group_type: String,
    #[serde(default)]
    #[validate(nested)]
    pub functions: Vec<FunctionConfig>,
}

/// Raw catalog file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CatalogConfig {
    #[serde(default)]
    pub virtual_fields: BTreeMap<String, BTreeMap<String, VirtualQuery>>,
    #[serde(default)]
    pub virtual_relations: BTreeMap<String, BTreeMap<String, VirtualQuery>>,
    #[serde(default)]
    #[validate(nested)]
    pub functions: Vec<FunctionGroupConfig>,
}

type RecipeTable = HashMap<String, HashMap<String, VirtualQuery>>;

#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    virtual_fields: RecipeTable,
    virtual_relations: RecipeTable,
    functions: HashMap<String, FunctionDefinition>,
}

fn function_key(name: &str, group_name: &str, group_type: &str) -> String {
    format!("{group_type}/{group_name}/{name}")
}

fn recipe_key(entity_class: &str, field_name: &str) -> String {
    format!("{entity_class}::{field_name}")
}

fn check_recipe(key: &str, query: &VirtualQuery) -> Result<(), CatalogError> {
    query.validate()?;
    for (_, join) in query.join.entries() {
        if join.condition_type.is_some() && join.condition.is_none() {
            return Err(ProviderError::InvalidRecipe {
                key: key.to_string(),
                reason: format!("join `{}` declares a condition type but no condition", join.alias),
            }
            .into());
        }
    }
    Ok(())
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(
        config: CatalogConfig,
        registry: &FunctionRegistry,
    ) -> Result<Self, CatalogError> {
        config.validate()?;
        let mut catalog = Self::new();

        for (entity_class, fields) in config.virtual_fields {
            for (field_name, query) in fields {
                let key = recipe_key(&entity_class, &field_name);
                check_recipe(&key, &query)?;
                if query.select.expr.trim().is_empty() {
                    return Err(ProviderError::InvalidRecipe {
                        key,
                        reason: "a virtual field needs a select expression".to_string(),
                    }
                    .into());
                }
                catalog = catalog.with_virtual_field(&entity_class, &field_name, query);
            }
        }

        for (entity_class, relations) in config.virtual_relations {
            for (field_name, query) in relations {
                let key = recipe_key(&entity_class, &field_name);
                check_recipe(&key, &query)?;
                if query.join.is_empty() {
                    return Err(ProviderError::InvalidRecipe {
                        key,
                        reason: "a virtual relation needs at least one join".to_string(),
                    }
                    .into());
                }
                catalog = catalog.with_virtual_relation(&entity_class, &field_name, query);
            }
        }

        for group in config.functions {
            for function in group.functions {
                let definition = FunctionDefinition {
                    expr: registry.resolve(&function.expr)?,
                    return_type: function.return_type,
                };
                catalog = catalog.with_function(
                    &function.name,
                    &group.group_name,
                    &group.group_type,
                    definition,
                );
            }
        }

        log::info!(
            "Loaded provider catalog: {} virtual fields, {} virtual relations, {} functions",
            catalog.virtual_fields.values().map(HashMap::len).sum::<usize>(),
            catalog.virtual_relations.values().map(HashMap::len).sum::<usize>(),
            catalog.functions.len()
        );

        Ok(catalog)
    }

    pub fn from_yaml_str(content: &str, registry: &FunctionRegistry) -> Result<Self, CatalogError> {
        let config: CatalogConfig = serde_yaml::from_str(content)?;
        Self::from_config(config, registry)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(
        path: P,
        registry: &FunctionRegistry,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        log::debug!("Reading provider catalog from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content, registry)
    }

    /// Loads a catalog file with the built-in function expressions available
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        Self::from_yaml_file(path, builtin_functions())
    }

    pub fn with_virtual_field(mut self, entity_class: &str, field_name: &str, query: VirtualQuery) -> Self {
        self.virtual_fields
            .entry(entity_class.to_string())
            .or_default()
            .insert(field_name.to_string(), query);
        self
    }

    pub fn with_virtual_relation(
        mut self,
        entity_class: &str,
        field_name: &str,
        query: VirtualQuery,
    ) -> Self {
        self.virtual_relations
            .entry(entity_class.to_string())
            .or_default()
            .insert(field_name.to_string(), query);
        self
    }

    pub fn with_function(
        mut self,
        name: &str,
        group_name: &str,
        group_type: &str,
        definition: FunctionDefinition,
    ) -> Self {
        self.functions
            .insert(function_key(name, group_name, group_type), definition);
        self
    }

    pub fn has_virtual_relations(&self) -> bool {
        !self.virtual_relations.is_empty()
    }

    fn recipe<'a>(table: &'a RecipeTable, entity_class: &str, field_name: &str) -> Option<&'a VirtualQuery> {
        table.get(entity_class).and_then(|fields| fields.get(field_name))
    }
}

impl VirtualFieldProvider for ProviderCatalog {
    fn is_virtual_field(&self, entity_class: &str, field_name: &str) -> bool {
        Self::recipe(&self.virtual_fields, entity_class, field_name).is_some()
    }

    fn virtual_field_query(&self, entity_class: &str, field_name: &str) -> ProviderResult<VirtualQuery> {
        Self::recipe(&self.virtual_fields, entity_class, field_name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownVirtualField {
                entity_class: entity_class.to_string(),
                field_name: field_name.to_string(),
            })
    }
}

impl VirtualRelationProvider for ProviderCatalog {
    fn is_virtual_relation(&self, entity_class: &str, field_name: &str) -> bool {
        Self::recipe(&self.virtual_relations, entity_class, field_name).is_some()
    }

    fn virtual_relation_query(
        &self,
        entity_class: &str,
        field_name: &str,
    ) -> ProviderResult<VirtualQuery> {
        Self::recipe(&self.virtual_relations, entity_class, field_name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownVirtualRelation {
                entity_class: entity_class.to_string(),
                field_name: field_name.to_string(),
            })
    }

    fn target_join_alias(
        &self,
        entity_class: &str,
        field_name: &str,
        _target_field: &str,
    ) -> ProviderResult<String> {
        let query = Self::recipe(&self.virtual_relations, entity_class, field_name).ok_or_else(
            || ProviderError::UnknownVirtualRelation {
                entity_class: entity_class.to_string(),
                field_name: field_name.to_string(),
            },
        )?;
        Ok(query
            .default_target_alias()
            .unwrap_or_else(|| query.root_alias_or(DEFAULT_ROOT_ALIAS))
            .to_string())
    }
}

impl FunctionProvider for ProviderCatalog {
    fn function(
        &self,
        name: &str,
        group_name: &str,
        group_type: &str,
    ) -> ProviderResult<FunctionDefinition> {
        self.functions
            .get(&function_key(name, group_name, group_type))
            .cloned()
            .ok_or_else(|| ProviderError::UnknownFunction {
                name: name.to_string(),
                group_name: group_name.to_string(),
                group_type: group_type.to_string(),
            })
    }
}
