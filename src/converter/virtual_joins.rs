//! Fixed-point join builder.
//!
//! A recipe lists INNER and LEFT joins with local aliases, and a join's
//! condition may mention the alias of any other entry. Entries are admitted
//! pass after pass (INNER entries first, then LEFT) once every alias they
//! reference is bound; an admitted entry gets its table alias right away, so
//! its dependants can be rewritten in a later pass.
//!
//! A pass that admits nothing can never make progress and fails with
//! [`ConvertError::JoinOrderingFailure`], as does exceeding the configured
//! iteration ceiling.

use std::collections::HashSet;

use crate::join_identifier::{JoinHandle, JoinSegment, JoinTarget, JoinType};
use crate::providers::{VirtualJoin, VirtualJoins};

use super::alias_rewriter::{self, AliasScope};
use super::context::{ConversionContext, RecipeJoinKey};
use super::errors::ConvertError;
use super::ConvertResult;

/// Where entity-form recipe joins (`Address|left|WITH|...`) are attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecipeAnchor {
    /// Virtual fields: every entity join hangs off the owning join
    Main(JoinHandle),
    /// Virtual relations: each entity join follows the previously admitted one
    Chained(JoinHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedJoin {
    pub local_alias: String,
    pub table_alias: String,
    pub join_type: JoinType,
    pub handle: JoinHandle,
}

/// Aliases `join` needs bound before it can be admitted
fn pending_aliases(join: &VirtualJoin, scope: &AliasScope, recipe_aliases: &HashSet<&str>) -> Vec<String> {
    let is_candidate = |alias: &str| recipe_aliases.contains(alias) || scope.contains(alias);

    let mut referenced = Vec::new();
    if let Ok(JoinTarget::AliasField { alias, .. }) = join.join.parse::<JoinTarget>() {
        if is_candidate(alias.as_str()) {
            referenced.push(alias);
        }
    }
    if let Some(condition) = &join.condition {
        for alias in alias_rewriter::referenced_aliases(condition, is_candidate) {
            if !referenced.contains(&alias) {
                referenced.push(alias);
            }
        }
    }

    referenced
        .into_iter()
        .filter(|alias| alias != &join.alias && !scope.contains(alias))
        .collect()
}

impl ConversionContext<'_> {
    /// Orders the joins of a recipe by their alias dependencies and registers them.
    ///
    /// `scope` must hold the recipe root alias; it receives a binding for every
    /// admitted entry.
    pub(crate) fn materialize_recipe_joins(
        &mut self,
        joins: &VirtualJoins,
        scope: &mut AliasScope,
        anchor: RecipeAnchor,
    ) -> ConvertResult<Vec<MaterializedJoin>> {
        let entries: Vec<(JoinType, &VirtualJoin)> = joins.entries().collect();
        let recipe_aliases: HashSet<&str> = entries.iter().map(|(_, j)| j.alias.as_str()).collect();
        let max_iterations = self.config.max_join_iterations;

        let mut processed = vec![false; entries.len()];
        let mut materialized = Vec::with_capacity(entries.len());
        let mut previous = match anchor {
            RecipeAnchor::Main(handle) | RecipeAnchor::Chained(handle) => handle,
        };
        let mut iterations = 0u32;

        while processed.contains(&false) {
            if iterations >= max_iterations {
                return Err(ordering_failure(iterations, &entries, &processed));
            }
            iterations += 1;

            let mut admitted = 0;
            for (index, (join_type, join)) in entries.iter().enumerate() {
                if processed[index] || !pending_aliases(join, scope, &recipe_aliases).is_empty() {
                    continue;
                }

                let parent = match anchor {
                    RecipeAnchor::Main(handle) => handle,
                    RecipeAnchor::Chained(_) => previous,
                };
                let admitted_join = self.materialize_join(*join_type, join, scope, parent)?;
                previous = admitted_join.handle;
                materialized.push(admitted_join);
                processed[index] = true;
                admitted += 1;
            }

            if admitted == 0 {
                return Err(ordering_failure(iterations, &entries, &processed));
            }
        }

        log::debug!(
            "Ordered {} recipe joins in {} passes: [{}]",
            materialized.len(),
            iterations,
            materialized
                .iter()
                .map(|j| format!("{}={}", j.local_alias, j.table_alias))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(materialized)
    }

    fn materialize_join(
        &mut self,
        join_type: JoinType,
        join: &VirtualJoin,
        scope: &mut AliasScope,
        default_parent: JoinHandle,
    ) -> ConvertResult<MaterializedJoin> {
        let (target, parent) = match join.join.parse::<JoinTarget>()? {
            JoinTarget::AliasField { alias, field } => {
                let real = scope
                    .get(&alias)
                    .ok_or(ConvertError::UnknownTableAlias(alias))?
                    .to_string();
                let owner = self.join_for_alias(&real)?;
                (JoinTarget::AliasField { alias: real, field }, owner)
            }
            other => (other, default_parent),
        };

        let local_alias = join.alias.as_str();
        let mut new_key = None;
        let table_alias = match scope.get(local_alias) {
            Some(real) => real.to_string(),
            None => {
                let key = RecipeJoinKey {
                    parent,
                    join_type,
                    target: target.clone(),
                    condition_type: join.condition_type,
                    local_alias: local_alias.to_string(),
                    condition: join
                        .condition
                        .as_deref()
                        .map(|c| alias_rewriter::rewrite(c, scope)),
                };
                let known = self
                    .recipe_joins
                    .get(&key)
                    .and_then(|handle| self.alias_of(*handle))
                    .map(str::to_string);
                new_key = Some(key);
                // Only claimed once the segment turns out to be new.
                match known {
                    Some(alias) => alias,
                    None => self.peek_table_alias(),
                }
            }
        };
        scope.bind(local_alias, &table_alias);

        let condition = join
            .condition
            .as_deref()
            .map(|c| alias_rewriter::rewrite(c, scope));
        let segment = JoinSegment::new(target)
            .with_join_type(Some(join_type))
            .with_condition(join.condition_type, condition);
        let handle = self.graph.intern_child(parent, segment);

        let registered = self.register_alias(handle, Some(table_alias.clone()));
        if registered != table_alias {
            scope.bind(local_alias, &registered);
        }
        if let Some(key) = new_key {
            self.recipe_joins.entry(key).or_insert(handle);
        }

        Ok(MaterializedJoin {
            local_alias: local_alias.to_string(),
            table_alias: registered,
            join_type,
            handle,
        })
    }
}

fn ordering_failure(iterations: u32, entries: &[(JoinType, &VirtualJoin)], processed: &[bool]) -> ConvertError {
    let unresolved: Vec<String> = entries
        .iter()
        .zip(processed)
        .filter(|(_, done)| !**done)
        .map(|((_, join), _)| join.alias.clone())
        .collect();
    log::warn!(
        "Could not order recipe joins after {} iterations, unresolved aliases: {:?}",
        iterations,
        unresolved
    );
    ConvertError::JoinOrderingFailure {
        iterations,
        unresolved,
    }
}
