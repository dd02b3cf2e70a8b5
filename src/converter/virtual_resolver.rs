//! Virtual field and relation resolution.
//!
//! Column paths are registered segment by segment. A segment naming a virtual
//! relation is replaced by the joins of the relation's recipe; the expansion
//! is cached per (parent join, entity, field) so the recipe is fetched and
//! materialized once per conversion. A column naming a virtual field gets the
//! recipe's select expression, rewritten onto real table aliases and cached
//! under the column path.

use crate::join_identifier::{JoinHandle, JoinPath, JoinSegment, JoinTarget};
use crate::providers::ProviderError;

use super::alias_rewriter::{self, AliasScope};
use super::context::{ColumnBinding, ConversionContext, RelationExpansion, RelationKey, VirtualColumnOptions};
use super::errors::ConvertError;
use super::virtual_joins::RecipeAnchor;
use super::ConvertResult;

impl ConversionContext<'_> {
    /// Registers every join `column_name` depends on and binds the column to its table.
    ///
    /// Idempotent: a column is resolved once per conversion.
    pub fn ensure_column_joined(&mut self, column_name: &str) -> ConvertResult<ColumnBinding> {
        if let Some(binding) = self.columns.get(column_name) {
            return Ok(binding.clone());
        }

        let column = JoinPath::parse_column(&self.root_entity, column_name)?;
        let field_name = column
            .field_name()
            .ok_or_else(|| ConvertError::MalformedIdentifier(column.to_string()))?
            .to_string();
        let parent = self.register_path(&column.parent()?)?;
        let table_alias = self.parent_table_alias(parent, &field_name)?;

        let expression = match self.resolve_virtual_field(&column, parent, &table_alias)? {
            Some(expression) => expression,
            None => {
                let expression = format!("{table_alias}.{field_name}");
                if self.relation_expansions.contains_key(&parent) {
                    self.virtual_column_expressions
                        .insert(column.to_string(), expression.clone());
                }
                expression
            }
        };

        let binding = ColumnBinding {
            column,
            parent,
            table_alias,
            expression,
        };
        self.columns.insert(column_name.to_string(), binding.clone());
        Ok(binding)
    }

    /// Table alias that fields below `parent` are read from.
    ///
    /// For a virtual relation expansion that is the alias its provider names
    /// for `field_name`, otherwise the alias of `parent` itself.
    pub(crate) fn parent_table_alias(
        &self,
        parent: JoinHandle,
        field_name: &str,
    ) -> ConvertResult<String> {
        if let (Some(expansion), Some(provider)) =
            (self.relation_expansions.get(&parent), self.virtual_relations)
        {
            let local = provider.target_join_alias(
                &expansion.entity_class,
                &expansion.field_name,
                field_name,
            )?;
            return expansion
                .scope
                .get(&local)
                .map(str::to_string)
                .ok_or(ConvertError::UnknownTableAlias(local));
        }
        self.required_alias(parent)
    }

    pub(crate) fn register_path(&mut self, path: &JoinPath) -> ConvertResult<JoinHandle> {
        self.ensure_root_joined();
        let mut current = JoinHandle::ROOT;
        for segment in path.segments() {
            current = self.register_segment(current, segment)?;
        }
        Ok(current)
    }

    /// Registers one segment below `parent`, expanding it when it is a virtual relation
    pub(crate) fn register_segment(
        &mut self,
        parent: JoinHandle,
        segment: &JoinSegment,
    ) -> ConvertResult<JoinHandle> {
        if let JoinTarget::Relation { entity, field } = &segment.target {
            if let Some(expansion) = self.expand_virtual_relation(parent, entity, field)? {
                return Ok(expansion);
            }
        }

        let handle = self.graph.intern_child(parent, segment.clone());
        self.register_alias(handle, None);
        Ok(handle)
    }

    fn expand_virtual_relation(
        &mut self,
        parent: JoinHandle,
        entity_class: &str,
        field_name: &str,
    ) -> ConvertResult<Option<JoinHandle>> {
        let Some(provider) = self.virtual_relations else {
            return Ok(None);
        };

        let key = RelationKey {
            parent,
            entity_class: entity_class.to_string(),
            field_name: field_name.to_string(),
        };
        if let Some(handle) = self.virtual_relation_joins.get(&key) {
            return Ok(Some(*handle));
        }
        if !provider.is_virtual_relation(entity_class, field_name) {
            return Ok(None);
        }

        let query = provider.virtual_relation_query(entity_class, field_name)?;
        let owner_alias = self.parent_table_alias(parent, field_name)?;
        let mut scope = AliasScope::seeded(
            query.root_alias_or(&self.config.default_root_alias),
            &owner_alias,
        );

        let joins =
            self.materialize_recipe_joins(&query.join, &mut scope, RecipeAnchor::Chained(parent))?;
        let Some(last) = joins.last().map(|join| join.handle) else {
            return Err(ProviderError::InvalidRecipe {
                key: format!("{entity_class}::{field_name}"),
                reason: "a virtual relation needs at least one join".to_string(),
            }
            .into());
        };

        log::debug!(
            "Expanded virtual relation {}::{} into `{}`",
            entity_class,
            field_name,
            self.graph.path(last)
        );
        self.virtual_relation_joins.insert(key, last);
        self.relation_expansions.insert(
            last,
            RelationExpansion {
                entity_class: entity_class.to_string(),
                field_name: field_name.to_string(),
                scope,
            },
        );
        Ok(Some(last))
    }

    /// Expression of `column` when its field is virtual, `None` for a physical field
    fn resolve_virtual_field(
        &mut self,
        column: &JoinPath,
        parent: JoinHandle,
        table_alias: &str,
    ) -> ConvertResult<Option<String>> {
        let key = column.to_string();
        if let Some(expression) = self.virtual_column_expressions.get(&key) {
            return Ok(Some(expression.clone()));
        }

        let (Some(entity_class), Some(field_name)) = (column.entity_class(), column.field_name())
        else {
            return Ok(None);
        };
        if !self.virtual_fields.is_virtual_field(entity_class, field_name) {
            return Ok(None);
        }

        let query = self
            .virtual_fields
            .virtual_field_query(entity_class, field_name)?;
        let mut scope = AliasScope::seeded(
            query.root_alias_or(&self.config.default_root_alias),
            table_alias,
        );
        if !query.join.is_empty() {
            self.materialize_recipe_joins(&query.join, &mut scope, RecipeAnchor::Main(parent))?;
        }

        let expression = alias_rewriter::rewrite(&query.select.expr, &scope);
        log::debug!("Virtual column `{}` resolved to `{}`", key, expression);

        self.virtual_column_expressions
            .insert(key, expression.clone());
        self.virtual_column_options
            .entry(format!("{entity_class}::{field_name}"))
            .or_insert_with(|| VirtualColumnOptions {
                return_type: query.select.return_type.clone(),
                label: query.select.label.clone(),
            });
        Ok(Some(expression))
    }
}
